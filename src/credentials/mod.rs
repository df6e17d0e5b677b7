//! Credential lifecycle
//!
//! INITREMOTE runs the authorization-code grant and hands the resulting
//! token to git-annex with SETCREDS. PREPARE gets it back with GETCREDS and
//! wraps it in an [`Authenticator`] that refreshes it when it runs out.
//! Nothing is written to disk here; persistence belongs to git-annex.
//!
//! ```text
//! Unauthenticated ──► AwaitingCode ──► Exchanging ──► Authenticated
//!        │                 │               │
//!        └── code given ───┼───────────────┘
//!                          └──────────────────────► Failed
//! ```

pub mod browser;
pub mod callback;
pub mod oauth;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{AuthCode, Config, OOB_REDIRECT_URI};
use crate::error::CredentialError;
use crate::logging::*;
use callback::CallbackListener;
pub use oauth::OAuthClient;

/// Tokens this close to expiry are treated as expired
const EXPIRY_SKEW_SECS: i64 = 10;

/// OAuth token material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	pub access_token: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub token_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiry: Option<DateTime<Utc>>,
}

impl Token {
	/// Access token with no refresh token and no known expiry
	pub fn bare(access_token: &str) -> Self {
		Token {
			access_token: access_token.to_string(),
			token_type: String::new(),
			refresh_token: None,
			expiry: None,
		}
	}

	/// Expiry, ignoring the zero timestamps some encoders write for "never"
	fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.expiry.filter(|at| at.timestamp() > 0)
	}

	pub fn is_expired(&self) -> bool {
		match self.expires_at() {
			Some(at) => at - chrono::Duration::seconds(EXPIRY_SKEW_SECS) <= Utc::now(),
			None => false,
		}
	}

	/// Base64 JSON blob stored through SETCREDS
	pub fn encode(&self) -> Result<String, CredentialError> {
		let json = serde_json::to_vec(self)
			.map_err(|e| CredentialError::Encode { message: e.to_string() })?;
		Ok(BASE64.encode(json))
	}

	/// Rebuild a token from a CREDS password field
	///
	/// Anything that is not a base64 JSON token is taken as a bare access token.
	pub fn decode(blob: &str) -> Self {
		let blob = blob.trim();
		let decoded = BASE64
			.decode(blob)
			.ok()
			.and_then(|bytes| serde_json::from_slice::<Token>(&bytes).ok())
			.filter(|token| !token.access_token.is_empty());
		match decoded {
			Some(token) => token,
			None => {
				debug!("stored credentials are not an encoded token, using them as an access token");
				Token::bare(blob)
			}
		}
	}
}

/// Hands out a valid access token, refreshing when needed
#[derive(Debug)]
pub struct Authenticator {
	token: Mutex<Token>,
	oauth: Option<OAuthClient>,
}

impl Authenticator {
	pub fn new(token: Token, oauth: OAuthClient) -> Self {
		Self { token: Mutex::new(token), oauth: Some(oauth) }
	}

	/// Authenticator that never refreshes
	pub fn fixed(token: Token) -> Self {
		Self { token: Mutex::new(token), oauth: None }
	}

	/// Current access token, refreshed first if it has expired
	pub async fn access_token(&self) -> Result<String, CredentialError> {
		let mut token = self.token.lock().await;
		if token.is_expired() {
			if let Some(oauth) = &self.oauth {
				*token = oauth.refresh(&token).await?;
				info!("access token refreshed");
			}
		}
		Ok(token.access_token.clone())
	}
}

/// Where the credential flow stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
	Unauthenticated,
	AwaitingCode,
	Exchanging,
	Authenticated,
	Failed,
}

/// Opens a URL for the operator
pub type UrlOpener = Arc<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

/// Drives the authorization-code grant
pub struct CredentialManager {
	state: AuthState,
	auth_code: Option<AuthCode>,
	oauth: OAuthClient,
	opener: UrlOpener,
	callback_timeout: Duration,
}

impl CredentialManager {
	pub fn new(config: &Config) -> Self {
		Self {
			state: AuthState::Unauthenticated,
			auth_code: config.auth_code.clone(),
			oauth: OAuthClient::new(config.oauth.clone()),
			opener: Arc::new(browser::open_url),
			callback_timeout: config.callback_timeout,
		}
	}

	/// Replace the browser launcher
	pub fn with_opener(mut self, opener: UrlOpener) -> Self {
		self.opener = opener;
		self
	}

	pub fn state(&self) -> AuthState {
		self.state
	}

	pub fn oauth(&self) -> &OAuthClient {
		&self.oauth
	}

	fn transition(&mut self, next: AuthState) {
		debug!("credentials: {:?} -> {:?}", self.state, next);
		self.state = next;
	}

	/// Run the full grant and return fresh tokens
	pub async fn authorize(&mut self) -> Result<Token, CredentialError> {
		let result = self.run_grant().await;
		match &result {
			Ok(_) => self.transition(AuthState::Authenticated),
			Err(e) => {
				warn!("authorization failed: {}", e);
				self.transition(AuthState::Failed);
			}
		}
		result
	}

	/// Accept token material handed back by the controller
	pub fn restore(&mut self, blob: &str) -> Token {
		let token = Token::decode(blob);
		self.transition(AuthState::Authenticated);
		token
	}

	async fn run_grant(&mut self) -> Result<Token, CredentialError> {
		if !self.oauth.is_configured() {
			warn!("no OAuth client id configured; set GDRIVE_CLIENT_ID");
		}
		let (code, redirect_uri) = match self.auth_code.clone() {
			Some(AuthCode::Code(code)) => (code, OOB_REDIRECT_URI.to_string()),
			Some(AuthCode::Manual) => {
				return Err(CredentialError::ManualAuthorization { url: self.manual_url() });
			}
			None => {
				self.transition(AuthState::AwaitingCode);
				self.code_from_browser().await.map_err(|e| self.with_manual_url(e))?
			}
		};
		self.transition(AuthState::Exchanging);
		self.oauth.exchange(&code, &redirect_uri).await.map_err(|e| self.with_manual_url(e))
	}

	/// Attach the manual authorization URL to errors that lack one
	fn with_manual_url(&self, e: CredentialError) -> CredentialError {
		match e.authorization_url() {
			Some(_) => e,
			None => CredentialError::Unfinished { url: self.manual_url(), cause: Box::new(e) },
		}
	}

	/// URL for completing the flow by hand and pasting the code
	fn manual_url(&self) -> String {
		self.oauth.authorization_url("", OOB_REDIRECT_URI)
	}

	async fn code_from_browser(&self) -> Result<(String, String), CredentialError> {
		let state = format!("st{}", Uuid::new_v4().simple());
		let listener = CallbackListener::bind(&state).await.map_err(CredentialError::Listener)?;
		let redirect_uri = listener.redirect_uri();
		let url = self.oauth.authorization_url(&state, &redirect_uri);

		if let Err(source) = (self.opener)(&url) {
			listener.close().await;
			return Err(CredentialError::Browser { url: self.manual_url(), source });
		}
		info!("Authorize this app at: {}", url);

		match listener.wait_for_code(self.callback_timeout).await {
			Some(code) => Ok((code, redirect_uri)),
			None => Err(CredentialError::Timeout {
				url: self.manual_url(),
				seconds: self.callback_timeout.as_secs(),
			}),
		}
	}
}


// vim: ts=4
