//! Upload policy - decides whether uploads may run right now
//!
//! Re-evaluated on every attempt. A negative answer pauses the orchestrator
//! until the next `resume` or `enqueue`, so a policy that stays negative
//! costs nothing.

use std::sync::atomic::{AtomicBool, Ordering};

/// "Uploads currently allowed" predicate
pub trait UploadPolicy: Send + Sync {
    fn uploads_allowed(&self) -> bool;
}

/// Always allows uploads
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

impl UploadPolicy for AlwaysAllow {
    fn uploads_allowed(&self) -> bool {
        true
    }
}

/// Shared on/off switch, e.g. driven by a user setting or network state
#[derive(Debug)]
pub struct PolicySwitch {
    allowed: AtomicBool,
}

impl PolicySwitch {
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed: AtomicBool::new(allowed),
        }
    }

    pub fn set(&self, allowed: bool) {
        self.allowed.store(allowed, Ordering::SeqCst);
    }
}

impl UploadPolicy for PolicySwitch {
    fn uploads_allowed(&self) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }
}

impl<F> UploadPolicy for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn uploads_allowed(&self) -> bool {
        self()
    }
}
