//! Runtime configuration for the special remote
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Environment variables (`DEBUG`, `OAUTH`, `GDRIVE_*`)
//! 3. CLI flags (highest priority, applied in `main`)
//!
//! Settings that belong to a particular remote (its root directory name) are
//! not here: they come from git-annex through GETCONFIG during PREPARE.

use std::str::FromStr;
use std::time::Duration;

/// Root directory name used when the controller supplies an empty value
pub const DEFAULT_ROOT_DIRECTORY: &str = "annex";

/// Transfer chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// How long INITREMOTE waits for the browser redirect
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// `OAUTH` value meaning "no browser here, print the URL instead"
pub const MANUAL_AUTH_SENTINEL: &str = "manual";

/// Redirect URI for codes the operator copies by hand
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Where keys live below the root directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
	/// Every key directly inside the root
	#[default]
	Flat,
	/// Keys sharded into DIRHASH subdirectories
	Hashed,
}

impl FromStr for Layout {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"flat" => Ok(Layout::Flat),
			"hashed" | "dirhash" => Ok(Layout::Hashed),
			_ => Err(format!("Unknown layout: {}", s)),
		}
	}
}

/// Which object store implementation serves the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
	#[default]
	Drive,
	/// In-process store, for exercising the protocol without network access
	Memory,
}

impl FromStr for Backend {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"drive" | "gdrive" => Ok(Backend::Drive),
			"memory" | "mem" => Ok(Backend::Memory),
			_ => Err(format!("Unknown backend: {}", s)),
		}
	}
}

/// Authorization code supplied out of band
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCode {
	/// Code pasted by the operator after a manual authorization
	Code(String),
	/// No browser available; report the URL instead of listening
	Manual,
}

impl AuthCode {
	/// Interpret a raw `OAUTH` value; empty means "not supplied"
	pub fn parse(raw: &str) -> Option<Self> {
		let raw = raw.trim();
		if raw.is_empty() {
			None
		} else if raw.eq_ignore_ascii_case(MANUAL_AUTH_SENTINEL) {
			Some(AuthCode::Manual)
		} else {
			Some(AuthCode::Code(raw.to_string()))
		}
	}
}

/// OAuth client settings
#[derive(Debug, Clone)]
pub struct OAuthSettings {
	pub client_id: String,
	pub client_secret: String,
	pub auth_url: String,
	pub token_url: String,
	pub scope: String,
}

impl Default for OAuthSettings {
	fn default() -> Self {
		OAuthSettings {
			client_id: option_env!("GDRIVE_CLIENT_ID").unwrap_or_default().to_string(),
			client_secret: option_env!("GDRIVE_CLIENT_SECRET").unwrap_or_default().to_string(),
			auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
			token_url: "https://accounts.google.com/o/oauth2/token".to_string(),
			scope: "https://www.googleapis.com/auth/drive".to_string(),
		}
	}
}

/// Configuration for one special remote process
#[derive(Debug, Clone)]
pub struct Config {
	/// Debug mode: verbose logs, wire logging, blank line ends the session
	pub debug: bool,

	/// Out-of-band authorization code or the manual sentinel
	pub auth_code: Option<AuthCode>,

	/// Fallback root directory name
	pub default_directory: String,

	/// Key layout below the root
	pub layout: Layout,

	/// Object store implementation
	pub backend: Backend,

	/// Size of each transfer chunk in bytes
	pub chunk_size: usize,

	/// Upper bound on waiting for the browser redirect
	pub callback_timeout: Duration,

	/// OAuth client
	pub oauth: OAuthSettings,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			debug: false,
			auth_code: None,
			default_directory: DEFAULT_ROOT_DIRECTORY.to_string(),
			layout: Layout::Flat,
			backend: Backend::Drive,
			chunk_size: DEFAULT_CHUNK_SIZE,
			callback_timeout: Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS),
			oauth: OAuthSettings::default(),
		}
	}
}

impl Config {
	/// Defaults overridden by the process environment
	pub fn from_env() -> Result<Self, String> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Defaults overridden by whatever `lookup` returns for each variable
	pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut config = Config::default();
		if let Some(debug) = lookup("DEBUG") {
			config.debug = debug == "true" || debug == "1";
		}
		if let Some(code) = lookup("OAUTH") {
			config.auth_code = AuthCode::parse(&code);
		}
		if let Some(layout) = lookup("GDRIVE_LAYOUT") {
			config.layout = layout.parse()?;
		}
		if let Some(backend) = lookup("GDRIVE_BACKEND") {
			config.backend = backend.parse()?;
		}
		if let Some(id) = lookup("GDRIVE_CLIENT_ID") {
			config.oauth.client_id = id;
		}
		if let Some(secret) = lookup("GDRIVE_CLIENT_SECRET") {
			config.oauth.client_secret = secret;
		}
		Ok(config)
	}

	/// Root directory name, falling back to the default for an empty value
	pub fn root_directory(&self, configured: &str) -> String {
		let configured = configured.trim();
		if configured.is_empty() {
			self.default_directory.clone()
		} else {
			configured.to_string()
		}
	}
}


// vim: ts=4
