//! CLI command handlers, one file per command.

mod check;
mod config_path;
mod run;

pub use check::run_check;
pub use config_path::run_config_path;
pub use run::run_batch;

use tordl_core::control::CancelToken;

/// Ctrl-C sets `cancel`; running work stops at its next checkpoint.
pub(crate) fn install_interrupt_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        if !cancel.is_cancelled() {
            eprintln!("interrupt received, stopping...");
            tracing::warn!("interrupt received, cancelling");
        }
        cancel.cancel();
    });
    if let Err(e) = installed {
        tracing::warn!("could not install Ctrl-C handler: {}", e);
    }
}

