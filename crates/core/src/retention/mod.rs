//! Retention: periodic deletion of aged upload and output files.
//!
//! Only the file age protects a file that is still in use, so `max_age` must
//! comfortably exceed the longest conversion.

mod config;
mod sweeper;

pub use config::RetentionConfig;
pub use sweeper::{sweep, DirectorySweep, RetentionSweeper, SweepReport, SweeperHandle};
