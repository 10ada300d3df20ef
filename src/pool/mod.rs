// src/pool/mod.rs

//! The dynamic worker pool.
//!
//! This module ties together:
//! - workers, which repeatedly claim a filename and run the command on it
//! - the supervisor, which holds the pool at the target concurrency,
//!   persists the done set, and decides when the run is over
//! - the shutdown controller, the cooperative stop flag both sides poll

pub mod shutdown;
pub mod supervisor;
pub mod worker;

/// Identifies one worker in the supervisor's handle table.
pub type WorkerId = u64;

/// Events sent to the supervisor by workers and the signal listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    /// The pending/done sets were touched; persist and re-check the pool.
    StateChanged,
    /// A worker reached its exit point; its handle can be reaped.
    WorkerExited { id: WorkerId },
}

pub use shutdown::ShutdownController;
pub use supervisor::{PoolOptions, Supervisor};
pub use worker::Worker;
