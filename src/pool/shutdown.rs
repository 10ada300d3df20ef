// src/pool/shutdown.rs

//! Cooperative shutdown flag.
//!
//! A single atomic bool, flipped exactly once by the first interrupt or
//! terminate signal. Workers read it before each claim attempt and the
//! supervisor reads it before starting replacement workers; nobody blocks on
//! it and nothing ever kills an in-flight child process.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct ShutdownController {
    raised: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns true only for the first caller, so the
    /// "shutting down" notice is printed exactly once however many signals
    /// arrive.
    pub fn raise(&self) -> bool {
        !self.raised.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
