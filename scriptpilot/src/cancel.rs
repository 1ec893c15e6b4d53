//! User-initiated cancellation.
//!
//! A [`CancelToken`] is shared between the SIGINT handler and the controller.
//! Long waits (model calls, child processes) poll it and abandon work once it
//! is set. The controller clears it at the start of every user turn.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Route SIGINT/SIGTERM into this token.
    ///
    /// The first signal only sets the flag. A second signal while the flag is
    /// still set terminates the process with status 130.
    pub fn install_signal_handlers(&self) -> Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::flag;

        for signal in [SIGINT, SIGTERM] {
            // Order matters: the shutdown check must observe the flag before
            // the second registration sets it.
            flag::register_conditional_shutdown(signal, 130, Arc::clone(&self.flag))
                .with_context(|| format!("register shutdown handler for signal {signal}"))?;
            flag::register(signal, Arc::clone(&self.flag))
                .with_context(|| format!("register cancel handler for signal {signal}"))?;
        }
        Ok(())
    }
}
