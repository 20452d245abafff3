//! `scheduler` crate — cron derivation and the cron-driven run-firing loop
//! (spec §4.5).

pub mod cron;
pub mod error;
pub mod registry;

pub use cron::derive_cron;
pub use error::SchedulerError;
pub use registry::{ScheduleListing, Scheduler};
