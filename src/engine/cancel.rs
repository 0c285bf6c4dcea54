//! Run-scoped cancellation signal

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag that cancels a whole run once set. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing flag, e.g. one set from a Ctrl-C handler
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag before reusing the token for another run
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Install a Ctrl-C handler that cancels `token`
pub fn cancel_on_ctrlc(token: &CancelToken) -> Result<(), ctrlc::Error> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        if !token.is_cancelled() {
            eprintln!("\nCancel requested, stopping after the current process is terminated...");
        }
        token.cancel();
    })
}
