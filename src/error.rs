//! Error types for remote operations
//!
//! These are operation errors: they are always resolved into a specific
//! `*-FAILURE` or `*-UNKNOWN` response for the key involved and never end the
//! dispatch loop. Conversation-level faults live in
//! [`crate::protocol::ProtocolError`].

use std::error::Error;
use std::fmt;
use std::io;

/// Errors from the remote object store or local file I/O around it
#[derive(Debug)]
pub enum StoreError {
	/// HTTP request could not be performed
	Http(reqwest::Error),

	/// Remote API answered with a non-success status
	Api { status: u16, message: String },

	/// Remote answer could not be decoded
	Decode { message: String },

	/// Local I/O error (source or destination file, body stream)
	Io(io::Error),

	/// Access token could not be obtained
	Credentials(CredentialError),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreError::Http(e) => write!(f, "HTTP request failed: {}", e),
			StoreError::Api { status, message } => {
				write!(f, "remote API error {}: {}", status, message)
			}
			StoreError::Decode { message } => write!(f, "cannot decode remote reply: {}", message),
			StoreError::Io(e) => write!(f, "I/O error: {}", e),
			StoreError::Credentials(e) => write!(f, "credentials: {}", e),
			StoreError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for StoreError {}

impl From<io::Error> for StoreError {
	fn from(e: io::Error) -> Self {
		StoreError::Io(e)
	}
}

impl From<reqwest::Error> for StoreError {
	fn from(e: reqwest::Error) -> Self {
		StoreError::Http(e)
	}
}

impl From<serde_json::Error> for StoreError {
	fn from(e: serde_json::Error) -> Self {
		StoreError::Decode { message: e.to_string() }
	}
}

impl From<CredentialError> for StoreError {
	fn from(e: CredentialError) -> Self {
		StoreError::Credentials(e)
	}
}

impl From<String> for StoreError {
	fn from(e: String) -> Self {
		StoreError::Other { message: e }
	}
}

/// Outcome of a failed key or directory lookup
///
/// `NotFound` is an expected answer, not a fault: callers branch on it to
/// tell "object does not exist" apart from "lookup failed".
#[derive(Debug)]
pub enum ResolveError {
	/// No object with that title under the expected parent
	NotFound,

	/// The lookup itself failed
	Store(StoreError),
}

impl fmt::Display for ResolveError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResolveError::NotFound => write!(f, "not found"),
			ResolveError::Store(e) => write!(f, "{}", e),
		}
	}
}

impl Error for ResolveError {}

impl From<StoreError> for ResolveError {
	fn from(e: StoreError) -> Self {
		ResolveError::Store(e)
	}
}

/// Errors from the OAuth authorization and token lifecycle
#[derive(Debug)]
pub enum CredentialError {
	/// No browser could be launched for the authorization URL
	Browser { url: String, source: io::Error },

	/// Local redirect listener could not be started
	Listener(io::Error),

	/// No valid callback arrived in time
	Timeout { url: String, seconds: u64 },

	/// Operator has to finish the flow by hand and rerun with the code
	ManualAuthorization { url: String },

	/// Token endpoint rejected the code or refresh token
	Exchange { message: String },

	/// Token material could not be encoded
	Encode { message: String },

	/// Grant step failed; the operator can still finish by hand at `url`
	Unfinished { url: String, cause: Box<CredentialError> },
}

impl CredentialError {
	/// Authorization URL the operator can use to complete the flow, if any
	pub fn authorization_url(&self) -> Option<&str> {
		match self {
			CredentialError::Browser { url, .. }
			| CredentialError::Timeout { url, .. }
			| CredentialError::ManualAuthorization { url }
			| CredentialError::Unfinished { url, .. } => Some(url),
			_ => None,
		}
	}
}

impl fmt::Display for CredentialError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CredentialError::Browser { url, source } => write!(
				f,
				"Error opening URL in browser ({}). Authorize this app at {} and rerun with env OAUTH as the auth code",
				source, url
			),
			CredentialError::Listener(e) => write!(f, "cannot start redirect listener: {}", e),
			CredentialError::Timeout { url, seconds } => write!(
				f,
				"no authorization callback within {}s. Authorize this app at {} and rerun with env OAUTH as the auth code",
				seconds, url
			),
			CredentialError::ManualAuthorization { url } => write!(
				f,
				"Authorize this app at {} and rerun with env OAUTH as the auth code",
				url
			),
			CredentialError::Exchange { message } => write!(f, "token exchange failed: {}", message),
			CredentialError::Encode { message } => {
				write!(f, "cannot encode token: {}", message)
			}
			CredentialError::Unfinished { url, cause } => write!(
				f,
				"{}. Authorize this app at {} and rerun with env OAUTH as the auth code",
				cause, url
			),
		}
	}
}

impl Error for CredentialError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			CredentialError::Browser { source, .. } => Some(source),
			CredentialError::Listener(e) => Some(e),
			CredentialError::Unfinished { cause, .. } => Some(cause.as_ref()),
			_ => None,
		}
	}
}

impl From<reqwest::Error> for CredentialError {
	fn from(e: reqwest::Error) -> Self {
		CredentialError::Exchange { message: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_authorization_carries_url() {
		let err = CredentialError::ManualAuthorization {
			url: "https://accounts.example/auth?x=1".to_string(),
		};
		assert_eq!(err.authorization_url(), Some("https://accounts.example/auth?x=1"));
		assert!(err.to_string().contains("https://accounts.example/auth?x=1"));
	}

	#[test]
	fn test_exchange_error_has_no_url() {
		let err = CredentialError::Exchange { message: "invalid_grant".to_string() };
		assert!(err.authorization_url().is_none());
	}

	#[test]
	fn test_unfinished_grant_carries_cause_and_url() {
		let err = CredentialError::Unfinished {
			url: "https://accounts.example/auth?x=1".to_string(),
			cause: Box::new(CredentialError::Exchange { message: "invalid_grant".to_string() }),
		};
		assert_eq!(err.authorization_url(), Some("https://accounts.example/auth?x=1"));
		let text = err.to_string();
		assert!(text.starts_with("token exchange failed: invalid_grant. Authorize this app at https://"));
		assert!(err.source().is_some());
	}

	#[test]
	fn test_not_found_is_distinct_from_store_errors() {
		let lookup: ResolveError =
			StoreError::Api { status: 500, message: "backend".to_string() }.into();
		assert!(matches!(lookup, ResolveError::Store(_)));
		assert!(matches!(ResolveError::NotFound, ResolveError::NotFound));
	}
}

// vim: ts=4
