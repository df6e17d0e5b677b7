//! Special remote protocol message types
//!
//! Every message is a single line of space separated tokens. Outgoing
//! messages are modelled as [`Response`] values rendered through `Display`;
//! the few replies the remote has to parse (answers to its own sub-requests)
//! get dedicated parsers that reject malformed lines as protocol errors.

use std::fmt;

use super::error::ProtocolError;

/// Protocol version announced at startup
pub const PROTOCOL_VERSION: u32 = 1;

/// Credential setting name used with SETCREDS/GETCREDS
pub const CREDS_SETTING: &str = "oauth";

/// User field stored alongside the token blob
pub const CREDS_USER: &str = "oauth";

/// Config setting holding the remote root directory name
pub const DIRECTORY_SETTING: &str = "directory";

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Store,
	Retrieve,
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Direction::Store => write!(f, "STORE"),
			Direction::Retrieve => write!(f, "RETRIEVE"),
		}
	}
}

/// Messages sent from the remote to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
	Version(u32),
	InitRemoteSuccess,
	InitRemoteFailure(String),
	SetCreds { setting: String, user: String, password: String },
	GetCreds(String),
	GetConfig(String),
	DirHash(String),
	PrepareSuccess,
	PrepareFailure(String),
	Progress(u64),
	TransferSuccess(Direction, String),
	TransferFailure(Direction, String, String),
	CheckPresentSuccess(String),
	CheckPresentFailure(String),
	CheckPresentUnknown(String, String),
	RemoveSuccess(String),
	RemoveFailure(String, String),
	/// Always the `REMOTE` class
	Availability,
	Error(String),
	UnsupportedRequest,
}

impl fmt::Display for Response {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Response::Version(v) => write!(f, "VERSION {}", v),
			Response::InitRemoteSuccess => write!(f, "INITREMOTE-SUCCESS"),
			Response::InitRemoteFailure(msg) => {
				write!(f, "INITREMOTE-FAILURE {}", single_line(msg))
			}
			Response::SetCreds { setting, user, password } => {
				write!(f, "SETCREDS {} {} {}", setting, user, password)
			}
			Response::GetCreds(setting) => write!(f, "GETCREDS {}", setting),
			Response::GetConfig(setting) => write!(f, "GETCONFIG {}", setting),
			Response::DirHash(key) => write!(f, "DIRHASH {}", key),
			Response::PrepareSuccess => write!(f, "PREPARE-SUCCESS"),
			Response::PrepareFailure(msg) => write!(f, "PREPARE-FAILURE {}", single_line(msg)),
			Response::Progress(bytes) => write!(f, "PROGRESS {}", bytes),
			Response::TransferSuccess(dir, key) => write!(f, "TRANSFER-SUCCESS {} {}", dir, key),
			Response::TransferFailure(dir, key, msg) => {
				write!(f, "TRANSFER-FAILURE {} {} {}", dir, key, single_line(msg))
			}
			Response::CheckPresentSuccess(key) => write!(f, "CHECKPRESENT-SUCCESS {}", key),
			Response::CheckPresentFailure(key) => write!(f, "CHECKPRESENT-FAILURE {}", key),
			Response::CheckPresentUnknown(key, msg) => {
				write!(f, "CHECKPRESENT-UNKNOWN {} {}", key, single_line(msg))
			}
			Response::RemoveSuccess(key) => write!(f, "REMOVE-SUCCESS {}", key),
			Response::RemoveFailure(key, msg) => {
				write!(f, "REMOVE-FAILURE {} {}", key, single_line(msg))
			}
			Response::Availability => write!(f, "AVAILABILITY REMOTE"),
			Response::Error(msg) => write!(f, "ERROR {}", single_line(msg)),
			Response::UnsupportedRequest => write!(f, "UNSUPPORTED-REQUEST"),
		}
	}
}

/// Collapse a diagnostic message onto one line
fn single_line(msg: &str) -> String {
	msg.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Parse the reply to GETCREDS: `CREDS <user> ... <password>`
///
/// The password is the last field. Fewer than three fields, or any leading
/// token other than CREDS, is a protocol error.
pub fn parse_creds(line: &str) -> Result<String, ProtocolError> {
	let parts: Vec<&str> = line.split(' ').collect();
	match parts.as_slice() {
		["CREDS", _, .., password] => Ok(password.to_string()),
		_ => Err(ProtocolError::UnexpectedReply {
			request: "GETCREDS".to_string(),
			reply: line.to_string(),
		}),
	}
}

/// Parse a `VALUE <value>` reply (to GETCONFIG or DIRHASH)
///
/// The value may be empty and may contain spaces.
pub fn parse_value(request: &str, line: &str) -> Result<String, ProtocolError> {
	if line == "VALUE" {
		return Ok(String::new());
	}
	match line.strip_prefix("VALUE ") {
		Some(value) => Ok(value.to_string()),
		None => Err(ProtocolError::UnexpectedReply {
			request: request.to_string(),
			reply: line.to_string(),
		}),
	}
}


// vim: ts=4
