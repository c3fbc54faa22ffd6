//! Host process state fed into the retry policy.
//!
//! The "retry without bound while backgrounded" rule needs to know whether
//! the host is foregrounded. The host environment reports that here; nothing
//! platform-specific lives in the engine.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared foreground/background flag. Defaults to foregrounded.
#[derive(Debug, Default)]
pub struct HostState {
    background: AtomicBool,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report that the host moved to the background (or back).
    pub fn set_background(&self, background: bool) {
        self.background.store(background, Ordering::Relaxed);
    }

    pub fn is_background(&self) -> bool {
        self.background.load(Ordering::Relaxed)
    }
}
