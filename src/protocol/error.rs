//! Protocol error types
//!
//! A protocol error means the controller and the remote disagree about the
//! conversation itself: a reply of the wrong shape, a command with missing
//! arguments, or a controller that went away mid-query. These surface as a
//! generic `ERROR` line; operation failures never use this type.

use std::fmt;

/// Protocol error type
#[derive(Debug)]
pub enum ProtocolError {
	/// Reply to a sub-request did not have the expected shape
	UnexpectedReply { request: String, reply: String },
	/// Command arrived with arguments the handler cannot use
	BadArguments { command: String, args: Vec<String> },
	/// Input closed while a reply was still owed
	Disconnected { request: String },
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::UnexpectedReply { request, reply } => {
				write!(f, "protocol error: unexpected reply to {}: {:?}", request, reply)
			}
			ProtocolError::BadArguments { command, args } => {
				write!(f, "protocol error: unexpected args {:?} to {}", args, command)
			}
			ProtocolError::Disconnected { request } => {
				write!(f, "protocol error: input closed while waiting for reply to {}", request)
			}
		}
	}
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unexpected_reply_names_request() {
		let err = ProtocolError::UnexpectedReply {
			request: "GETCREDS".to_string(),
			reply: "CREDS badtoken".to_string(),
		};
		let msg = err.to_string();
		assert!(msg.contains("GETCREDS"));
		assert!(msg.contains("CREDS badtoken"));
	}
}

// vim: ts=4
