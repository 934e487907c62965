//! Progressive disclosure: the per-pair trust ledger and the staged candidate views it
//! unlocks.

pub mod disclosure;
pub mod domain;
pub mod ledger;
pub mod profile;
pub mod views;

#[cfg(test)]
mod tests;

pub use disclosure::{DisclosureError, DisclosureService, StagedProfile, UpgradeCheck};
pub use domain::{
    AccessGrant, AccessLevel, CandidateId, CommitmentType, EmployerId, GrantAction, GrantKey,
    HistoryEntry, InvalidAccessLevel, MonitoringFlags, PaymentStatus, Requirement, Restrictions,
};
pub use ledger::{AccessLedger, GrantRepository, LedgerError};
pub use profile::{
    CandidateProfile, Education, EmployerProfile, GeoPoint, PostalAddress, Profile, ProfileError,
    ProfileRepository, Reference, SalaryExpectation, VideoProfile, WorkSample,
};
pub use views::{
    BasicView, ContactView, DisclosureConfig, ProfessionalView, SalaryBand, StagedView,
    VerifiedView, WatermarkedVideo,
};
