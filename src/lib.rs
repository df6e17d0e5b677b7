//! # gdrive-annex - git-annex special remote for Google Drive
//!
//! Speaks the git-annex external special remote protocol on stdin/stdout and
//! keeps annexed content as files in a Google Drive folder.
//!
//! ## Embedding
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gdrive_annex::{config::Config, serve::serve, store::memory::MemoryConnector};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let connector = Arc::new(MemoryConnector::default());
//!     serve(Config::default(), connector, tokio::io::stdin(), tokio::io::stdout()).await
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod resolver;
pub mod serve;
pub mod store;
pub mod transfer;
pub mod transport;

// Re-export commonly used types and functions
pub use config::Config;
pub use error::{CredentialError, ResolveError, StoreError};
pub use protocol::{ProtocolError, Response};
pub use serve::{serve, SpecialRemote};

// vim: ts=4
