//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expired-entry sweep: purges stale responses ahead of their next read

mod sweep;

pub use sweep::spawn_sweep_task;
