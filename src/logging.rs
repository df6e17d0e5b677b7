//! Logging prelude module for convenient access to tracing macros.
//!
//! Stdout carries the special remote protocol, so every diagnostic goes to
//! stderr. git-annex shows a remote's stderr to the user, which makes it the
//! natural place for operator-facing messages.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("This is an info message");
//! warn!("This is a warning");
//! error!("An error occurred");
//! debug!("Debug information");
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// Logs at INFO level and above by default, DEBUG when the remote runs in
/// debug mode. `RUST_LOG` takes precedence over both:
///
/// ```bash
/// RUST_LOG=gdrive_annex=debug git annex copy --to gdrive
/// RUST_LOG=gdrive_annex::store=trace git annex get file.bin
/// ```
pub fn init_tracing(debug: bool) {
	let default_level = if debug { "debug" } else { "info" };
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.try_init();
}

// vim: ts=4
