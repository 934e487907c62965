use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{CandidateId, EmployerId, GrantKey};
use crate::store::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    ProfileView,
    ContactAccess,
    MessageSent,
    MessageBlocked,
    DocumentDownload,
    VideoView,
    UpgradeRequest,
}

impl ActivityAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProfileView => "profile_view",
            Self::ContactAccess => "contact_access",
            Self::MessageSent => "message_sent",
            Self::MessageBlocked => "message_blocked",
            Self::DocumentDownload => "document_download",
            Self::VideoView => "video_view",
            Self::UpgradeRequest => "upgrade_request",
        }
    }

    /// Actions that start the exclusive period when they are the first of their pair.
    pub const fn is_contact(self) -> bool {
        matches!(self, Self::ContactAccess | Self::MessageSent)
    }
}

/// Immutable record of one employer action against one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub actor: EmployerId,
    pub subject: CandidateId,
    pub action: ActivityAction,
    pub at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl ActivityEvent {
    pub fn new(
        key: &GrantKey,
        action: ActivityAction,
        at: DateTime<Utc>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: key.employer_id.clone(),
            subject: key.candidate_id.clone(),
            action,
            at,
            metadata,
        }
    }

    pub fn key(&self) -> GrantKey {
        GrantKey {
            employer_id: self.actor.clone(),
            candidate_id: self.subject.clone(),
        }
    }
}

/// Append-only activity store.
pub trait ActivityLog: Send + Sync {
    fn append(&self, event: ActivityEvent) -> Result<(), RepositoryError>;
    fn for_pair_since(
        &self,
        key: &GrantKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, RepositoryError>;
    fn for_employer_since(
        &self,
        employer_id: &EmployerId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityEvent>, RepositoryError>;
    fn latest_for_pair(&self, key: &GrantKey) -> Result<Option<ActivityEvent>, RepositoryError>;
}

/// Fire-and-forget destination for activity; implementations swallow and log failures.
pub trait ActivitySink: Send + Sync {
    fn record(&self, event: ActivityEvent);
}
