//! Ctrl+C handling.
//!
//! Pressing Ctrl+C sets a shared `AtomicBool`. The fingerprint orchestrator
//! and the bitrate scan check it before starting each file: work already
//! dispatched runs to completion (a repair in flight always finishes its
//! backup/restore), files not yet started are skipped, and the run then
//! saves what it has and exits with code 130.
//!
//! ```rust,no_run
//! use musicscan::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let flag = handler.get_flag();
//! // hand `flag` to FingerprintOrchestrator::with_shutdown_flag
//! # let _ = flag;
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code after an interrupt (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the flag for worker code.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler.
///
/// Calling this again returns the already-installed handler with its flag
/// reset, so several in-process runs (tests) can each call it.
///
/// # Errors
///
/// Never fails in practice: if the hook cannot be registered, an unhooked
/// handler is returned that still honours [`ShutdownHandler::request_shutdown`].
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let hooked = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing files in progress..."
        );
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    if hooked.is_err() {
        log::debug!("Ctrl+C handler already registered, using unhooked handler");
    }

    let installed = GLOBAL_HANDLER.get_or_init(|| handler);
    installed.reset();
    Ok(installed.clone())
}
