use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the notification list view is currently open.
///
/// Shared between the dispatcher (alerts are suppressed while open) and the
/// fallback poller (background polls are skipped while open).
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    open: Arc<AtomicBool>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Set the flag, returning the previous value.
    pub fn set_open(&self, open: bool) -> bool {
        self.open.swap(open, Ordering::SeqCst)
    }
}
