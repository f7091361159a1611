//! Scheduler: one polling task per target, periodic reconciliation with the
//! target store, and an orderly drain on shutdown.

mod registry;
mod scheduler;
mod task;

pub use registry::TargetState;
pub use scheduler::{CheckReport, Scheduler, SchedulerOptions};
