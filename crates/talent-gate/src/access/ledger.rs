use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::domain::{AccessGrant, GrantKey};
use crate::clock::Clock;
use crate::store::RepositoryError;

/// Conditional attempts before a write gives up under contention.
const MAX_WRITE_ATTEMPTS: usize = 8;

/// Storage abstraction for access grants, keyed by (employer, candidate).
pub trait GrantRepository: Send + Sync {
    fn fetch(&self, key: &GrantKey) -> Result<Option<AccessGrant>, RepositoryError>;

    /// Store `grant` only when the stored version equals `expected` (`None` means the key
    /// must not exist yet). Returns the grant as stored, with its version bumped.
    fn compare_and_set(
        &self,
        expected: Option<u64>,
        grant: AccessGrant,
    ) -> Result<AccessGrant, RepositoryError>;

    fn list(&self) -> Result<Vec<AccessGrant>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("gave up updating grant {key} after {attempts} conflicting writes")]
    Contention { key: String, attempts: usize },
}

/// Per-pair trust ledger. Every mutation goes through [`AccessLedger::update`].
pub struct AccessLedger {
    repository: Arc<dyn GrantRepository>,
    clock: Arc<dyn Clock>,
}

impl AccessLedger {
    pub fn new(repository: Arc<dyn GrantRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub fn get(&self, key: &GrantKey) -> Result<Option<AccessGrant>, LedgerError> {
        Ok(self.repository.fetch(key)?)
    }

    /// The stored grant, or an unsaved level-1 grant when none exists yet.
    pub fn get_or_default(&self, key: &GrantKey) -> Result<AccessGrant, LedgerError> {
        Ok(self
            .repository
            .fetch(key)?
            .unwrap_or_else(|| AccessGrant::new(key.clone(), self.clock.now())))
    }

    pub fn list(&self) -> Result<Vec<AccessGrant>, LedgerError> {
        Ok(self.repository.list()?)
    }

    /// Read-modify-write one grant atomically.
    ///
    /// `mutate` may run more than once when another writer wins the race, so it must only
    /// touch the grant it is handed. Restrictions are re-derived after every mutation.
    /// An error from `mutate` aborts without writing.
    pub fn update<T, E, F>(&self, key: &GrantKey, mutate: F) -> Result<(AccessGrant, T), E>
    where
        F: Fn(&mut AccessGrant, DateTime<Utc>) -> Result<T, E>,
        E: From<LedgerError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let current = self.repository.fetch(key).map_err(LedgerError::from)?;
            let expected = current.as_ref().map(|grant| grant.version);
            let mut grant = current.unwrap_or_else(|| AccessGrant::new(key.clone(), now));

            let output = mutate(&mut grant, now)?;
            grant.reproject();
            grant.updated_at = now;

            match self.repository.compare_and_set(expected, grant) {
                Ok(stored) => return Ok((stored, output)),
                Err(err) if err.is_version_mismatch() || err == RepositoryError::Conflict => {
                    debug!(grant = %key, attempt, "grant write lost a race, retrying");
                }
                Err(err) => return Err(LedgerError::from(err).into()),
            }
        }

        warn!(grant = %key, "grant update abandoned under contention");
        Err(LedgerError::Contention {
            key: key.to_string(),
            attempts: MAX_WRITE_ATTEMPTS,
        }
        .into())
    }

    /// Set the suspicious-activity flag and count the attempt.
    pub fn flag_suspicious(
        &self,
        key: &GrantKey,
        metadata: BTreeMap<String, String>,
    ) -> Result<AccessGrant, LedgerError> {
        self.update(key, |grant, now| {
            grant.flag_suspicious(now, metadata.clone());
            Ok::<_, LedgerError>(())
        })
        .map(|(grant, _)| grant)
    }

    /// Force every restriction on for the pair. Repeating it changes nothing.
    pub fn tighten(
        &self,
        key: &GrantKey,
        metadata: BTreeMap<String, String>,
    ) -> Result<AccessGrant, LedgerError> {
        self.update(key, |grant, now| {
            grant.tighten(now, metadata.clone());
            Ok::<_, LedgerError>(())
        })
        .map(|(grant, _)| grant)
    }

    /// Record activity on the pair; `first_contact` also stamps the exclusive-period start.
    pub fn touch(
        &self,
        key: &GrantKey,
        at: DateTime<Utc>,
        first_contact: bool,
    ) -> Result<AccessGrant, LedgerError> {
        self.update(key, |grant, _| {
            grant.touch(at);
            if first_contact {
                grant.mark_first_contact(at);
            }
            Ok::<_, LedgerError>(())
        })
        .map(|(grant, _)| grant)
    }
}
