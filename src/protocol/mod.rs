//! Special remote protocol vocabulary
//!
//! Line formats exchanged with git-annex and the error type for
//! conversation-level faults.

pub mod error;
pub mod messages;

pub use error::ProtocolError;
pub use messages::{Direction, Response};

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// vim: ts=4
