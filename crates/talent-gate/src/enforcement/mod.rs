//! Monetary obligations owed by employers: success fees, bypass penalties, liquidated
//! damages, and the legal notices sent when they go unpaid.

pub mod domain;
pub mod ledger;

pub use domain::{
    exclusive_period_end, EnforcementRecord, EnforcementRepository, Evidence, LegalNotice,
    NoticeStage, ObligationKind, ObligationStatus, EXCLUSIVE_PERIOD_DAYS,
};
pub use ledger::{
    EnforcementConfig, EnforcementError, EnforcementLedger, HireOutcome, IssuedNotice,
};
