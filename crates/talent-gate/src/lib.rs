//! Progressive-disclosure access control and anti-circumvention enforcement for a
//! candidate/employer marketplace.

pub mod access;
pub mod accounts;
pub mod activity;
pub mod alerts;
pub mod clock;
pub mod config;
pub mod context;
pub mod detection;
pub mod enforcement;
pub mod error;
pub mod monitoring;
pub mod router;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub use context::{EngineContext, EngineStores};
pub use router::engine_router;
