//! Local HTTP listener capturing the OAuth redirect
//!
//! Bound to an ephemeral loopback port for the duration of one INITREMOTE.
//! Any path is accepted as the callback; requests must carry the per-run
//! `state` token, and the first one that also carries a `code` wins.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::logging::*;

/// Grace period for in-flight callback responses on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct CallbackState {
	expected_state: Arc<str>,
	codes: mpsc::Sender<String>,
}

/// Running redirect listener
pub struct CallbackListener {
	addr: SocketAddr,
	codes: mpsc::Receiver<String>,
	shutdown: Option<oneshot::Sender<()>>,
	server: JoinHandle<()>,
}

impl CallbackListener {
	/// Start listening on 127.0.0.1 with an OS-assigned port
	pub async fn bind(expected_state: &str) -> io::Result<Self> {
		let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
		let addr = listener.local_addr()?;
		let (codes_tx, codes) = mpsc::channel(1);
		let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

		let app = Router::new()
			.route("/favicon.ico", get(favicon))
			.fallback(callback)
			.with_state(CallbackState { expected_state: Arc::from(expected_state), codes: codes_tx });

		let server = tokio::spawn(async move {
			let result = axum::serve(listener, app)
				.with_graceful_shutdown(async move {
					let _ = shutdown_rx.await;
				})
				.await;
			if let Err(e) = result {
				warn!("redirect listener failed: {}", e);
			}
		});
		debug!("redirect listener on {}", addr);

		Ok(Self { addr, codes, shutdown: Some(shutdown_tx), server })
	}

	/// Redirect URI to register in the authorization URL
	pub fn redirect_uri(&self) -> String {
		format!("http://{}", self.addr)
	}

	/// Block until a valid callback delivers a code, or the timeout passes
	pub async fn wait_for_code(mut self, timeout: Duration) -> Option<String> {
		let code = tokio::time::timeout(timeout, self.codes.recv()).await.ok().flatten();
		self.close().await;
		code
	}

	/// Stop the listener
	pub async fn close(mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
		if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.server).await.is_err() {
			self.server.abort();
		}
	}
}

async fn favicon() -> StatusCode {
	StatusCode::NOT_FOUND
}

async fn callback(
	State(state): State<CallbackState>,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	if params.get("state").map(String::as_str) != Some(&*state.expected_state) {
		warn!("State doesn't match: {:?}", params.get("state"));
		return StatusCode::INTERNAL_SERVER_ERROR.into_response();
	}
	match params.get("code").filter(|code| !code.is_empty()) {
		Some(code) => {
			if state.codes.try_send(code.clone()).is_err() {
				debug!("authorization code already captured, ignoring repeat callback");
			}
			Html("<h1>Success</h1>Authorized.").into_response()
		}
		None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
	}
}


// vim: ts=4
