//! OAuth 2.0 authorization-code grant against the configured endpoints

use chrono::{Duration, Utc};
use serde::Deserialize;
use url::form_urlencoded;

use super::Token;
use crate::config::OAuthSettings;
use crate::error::CredentialError;
use crate::logging::*;

/// Token endpoint reply
#[derive(Debug, Deserialize)]
struct TokenResponse {
	#[serde(default)]
	access_token: String,
	#[serde(default)]
	token_type: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

impl TokenResponse {
	fn into_token(self, previous_refresh: Option<String>) -> Result<Token, CredentialError> {
		if self.access_token.is_empty() {
			return Err(CredentialError::Exchange {
				message: "server response missing access_token".to_string(),
			});
		}
		Ok(Token {
			access_token: self.access_token,
			token_type: self.token_type,
			refresh_token: self.refresh_token.or(previous_refresh),
			expiry: self
				.expires_in
				.filter(|secs| *secs > 0)
				.map(|secs| Utc::now() + Duration::seconds(secs)),
		})
	}
}

/// Client for the authorization and token endpoints
#[derive(Debug, Clone)]
pub struct OAuthClient {
	settings: OAuthSettings,
	http: reqwest::Client,
}

impl OAuthClient {
	pub fn new(settings: OAuthSettings) -> Self {
		Self { settings, http: reqwest::Client::new() }
	}

	/// Whether a client id is available to put in requests
	pub fn is_configured(&self) -> bool {
		!self.settings.client_id.is_empty()
	}

	/// URL the operator visits to approve access
	///
	/// Requests offline access so the exchange yields a refresh token.
	pub fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
		let query = form_urlencoded::Serializer::new(String::new())
			.append_pair("access_type", "offline")
			.append_pair("client_id", &self.settings.client_id)
			.append_pair("redirect_uri", redirect_uri)
			.append_pair("response_type", "code")
			.append_pair("scope", &self.settings.scope)
			.append_pair("state", state)
			.finish();
		let separator = if self.settings.auth_url.contains('?') { '&' } else { '?' };
		format!("{}{}{}", self.settings.auth_url, separator, query)
	}

	/// Trade an authorization code for tokens
	pub async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<Token, CredentialError> {
		debug!("exchanging authorization code");
		let reply = self
			.request_token(&[
				("grant_type", "authorization_code"),
				("code", code),
				("redirect_uri", redirect_uri),
			])
			.await?;
		reply.into_token(None)
	}

	/// Get a fresh access token using the token's refresh token
	pub async fn refresh(&self, token: &Token) -> Result<Token, CredentialError> {
		let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
			CredentialError::Exchange { message: "token expired and has no refresh token".to_string() }
		})?;
		debug!("refreshing access token");
		let reply = self
			.request_token(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
			.await?;
		reply.into_token(token.refresh_token.clone())
	}

	async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, CredentialError> {
		let mut form: Vec<(&str, &str)> = vec![
			("client_id", self.settings.client_id.as_str()),
			("client_secret", self.settings.client_secret.as_str()),
		];
		form.extend_from_slice(params);

		let response = self.http.post(&self.settings.token_url).form(&form).send().await?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(CredentialError::Exchange { message: format!("{}: {}", status, body.trim()) });
		}
		Ok(response.json::<TokenResponse>().await?)
	}
}


// vim: ts=4
