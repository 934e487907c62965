use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::EmployerId;
use crate::store::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    pub employer_id: EmployerId,
    pub reason: String,
    pub suspended_at: DateTime<Utc>,
}

/// Employer account standing. The engine can suspend but never reinstate.
pub trait AccountDirectory: Send + Sync {
    fn suspension(&self, employer_id: &EmployerId) -> Result<Option<Suspension>, RepositoryError>;

    /// Suspending an already suspended account keeps the original record.
    fn suspend(
        &self,
        employer_id: &EmployerId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Suspension, RepositoryError>;

    fn is_suspended(&self, employer_id: &EmployerId) -> Result<bool, RepositoryError> {
        Ok(self.suspension(employer_id)?.is_some())
    }
}
