//! Google Drive v2 REST binding
//!
//! Only the calls the remote needs: listing by exact title, folder creation,
//! multipart upload, delete and download by locator. Every request carries a
//! bearer token from the session's [`Authenticator`], refreshed on demand.
//!
//! In debug mode request lines, headers and bodies are written to a
//! [`DiagnosticSink`]. Streamed upload bodies are copied as each part goes
//! out, and response bodies pass through a [`TeeReader`] so the caller still
//! reads the same bytes.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Body, Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio_util::io::{ReaderStream, StreamReader};
use uuid::Uuid;

use super::tee::{DiagnosticSink, TeeReader};
use super::{DownloadStream, ListQuery, RemoteObject, RemoteStore, StoreConnector, UploadBody};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::credentials::Authenticator;
use crate::error::StoreError;
use crate::logging::*;

pub const API_BASE: &str = "https://www.googleapis.com/drive/v2";
pub const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v2";

/// MIME type Drive uses for folders
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
	id: String,
	#[serde(default)]
	title: String,
	#[serde(default)]
	mime_type: String,
	#[serde(default)]
	download_url: Option<String>,
	#[serde(default)]
	parents: Vec<ParentReference>,
}

#[derive(Debug, Deserialize)]
struct ParentReference {
	id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
	#[serde(default)]
	items: Vec<DriveFile>,
	#[serde(default)]
	next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
	error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	message: String,
}

impl DriveFile {
	fn is_folder(&self) -> bool {
		self.mime_type == FOLDER_MIME
	}

	fn into_object(self) -> RemoteObject {
		RemoteObject {
			id: self.id,
			title: self.title,
			parent_id: self.parents.into_iter().next().map(|p| p.id),
			download_url: self.download_url.filter(|url| !url.is_empty()),
		}
	}
}

/// Escape a literal for use inside a single-quoted query string
fn quote(value: &str) -> String {
	value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Render a listing filter in the Drive query language
pub fn drive_query(query: &ListQuery) -> String {
	let mut q = format!("title='{}'", quote(&query.title));
	if let Some(parent) = &query.parent {
		q.push_str(&format!(" and '{}' in parents", quote(parent)));
	}
	if query.folders_only {
		q.push_str(&format!(" and mimeType='{}'", FOLDER_MIME));
	}
	q.push_str(" and trashed=false");
	q
}

/// Authenticated Drive client
pub struct DriveStore {
	http: reqwest::Client,
	auth: Authenticator,
	api_base: String,
	upload_base: String,
	wire: Option<DiagnosticSink>,
}

impl DriveStore {
	pub fn new(
		auth: Authenticator,
		api_base: &str,
		upload_base: &str,
		wire: Option<DiagnosticSink>,
	) -> Result<Self, StoreError> {
		let http = reqwest::Client::builder().build()?;
		Ok(Self {
			http,
			auth,
			api_base: api_base.trim_end_matches('/').to_string(),
			upload_base: upload_base.trim_end_matches('/').to_string(),
			wire,
		})
	}

	/// Authorize, log and send a request; non-success statuses become [`StoreError::Api`]
	async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
		let token = self.auth.access_token().await?;
		let request = request.bearer_auth(token).build()?;
		if let Some(sink) = &self.wire {
			log_request(sink, &request);
		}

		let response = self.http.execute(request).await?;
		if let Some(sink) = &self.wire {
			sink.line(format!("{:?} {}", response.version(), response.status()));
			log_headers(sink, response.headers());
			sink.line("");
		}

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		let body = self.read_body(response).await.unwrap_or_default();
		let message = serde_json::from_slice::<ErrorEnvelope>(&body)
			.map(|envelope| envelope.error.message)
			.unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
		debug!("drive request failed: {} {}", status, message);
		Err(StoreError::Api { status: status.as_u16(), message })
	}

	/// Response body as a reader, teed to the wire log in debug mode
	fn body_reader(&self, response: Response) -> DownloadStream {
		let stream = Box::pin(
			response
				.bytes_stream()
				.map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
		);
		let reader = StreamReader::new(stream);
		match &self.wire {
			Some(sink) => Box::new(TeeReader::new(reader, sink.clone())),
			None => Box::new(reader),
		}
	}

	async fn read_body(&self, response: Response) -> Result<Vec<u8>, StoreError> {
		let mut reader = self.body_reader(response);
		let mut body = Vec::new();
		reader.read_to_end(&mut body).await?;
		if let Some(sink) = &self.wire {
			sink.line("");
		}
		Ok(body)
	}

	async fn json<T: DeserializeOwned>(&self, response: Response) -> Result<T, StoreError> {
		let body = self.read_body(response).await?;
		Ok(serde_json::from_slice(&body)?)
	}
}

fn log_request(sink: &DiagnosticSink, request: &Request) {
	sink.line(format!("{} {} {:?}", request.method(), request.url(), request.version()));
	log_headers(sink, request.headers());
	sink.line("");
	match request.body().map(|body| body.as_bytes()) {
		Some(Some(bytes)) => {
			sink.write(bytes);
			sink.line("");
		}
		Some(None) => sink.line("<streamed body>"),
		None => {}
	}
}

fn log_headers(sink: &DiagnosticSink, headers: &HeaderMap) {
	for (name, value) in headers {
		// Bearer tokens stay out of the log
		let value = if name == AUTHORIZATION { "<redacted>" } else { value.to_str().unwrap_or("<binary>") };
		sink.line(format!("{}: {}", name, value));
	}
}

#[async_trait]
impl RemoteStore for DriveStore {
	async fn list(&self, query: &ListQuery) -> Result<Vec<RemoteObject>, StoreError> {
		let q = drive_query(query);
		let mut objects = Vec::new();
		let mut page_token: Option<String> = None;
		loop {
			let mut request = self.http.get(format!("{}/files", self.api_base)).query(&[("q", q.as_str())]);
			if let Some(token) = &page_token {
				request = request.query(&[("pageToken", token.as_str())]);
			}
			let page: FileList = self.json(self.send(request).await?).await?;
			objects.extend(
				page.items
					.into_iter()
					.filter(|file| !query.folders_only || file.is_folder())
					.map(DriveFile::into_object),
			);
			match page.next_page_token.filter(|token| !token.is_empty()) {
				Some(token) => page_token = Some(token),
				None => break,
			}
		}
		debug!("list {} -> {} object(s)", q, objects.len());
		Ok(objects)
	}

	async fn create_folder(&self, title: &str, parent: Option<&str>) -> Result<RemoteObject, StoreError> {
		let mut metadata = json!({ "title": title, "mimeType": FOLDER_MIME });
		if let Some(parent) = parent {
			metadata["parents"] = json!([{ "id": parent }]);
		}
		let request = self.http.post(format!("{}/files", self.api_base)).json(&metadata);
		let file: DriveFile = self.json(self.send(request).await?).await?;
		info!("created folder {} ({})", title, file.id);
		Ok(file.into_object())
	}

	async fn insert(&self, title: &str, parent: &str, body: UploadBody) -> Result<RemoteObject, StoreError> {
		let boundary = format!("annex{}", Uuid::new_v4().simple());
		let metadata = json!({ "title": title, "parents": [{ "id": parent }] });
		let head = format!(
			"--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: application/octet-stream\r\n\r\n",
			b = boundary,
			m = metadata
		);
		let tail = format!("\r\n--{}--\r\n", boundary);

		let wire = self.wire.clone();
		let parts = stream::once(future::ready(Ok::<Bytes, io::Error>(Bytes::from(head))))
			.chain(ReaderStream::with_capacity(body, DEFAULT_CHUNK_SIZE))
			.chain(stream::once(future::ready(Ok(Bytes::from(tail)))))
			.inspect_ok(move |part| {
				if let Some(sink) = &wire {
					sink.write(part);
				}
			});

		let request = self
			.http
			.post(format!("{}/files", self.upload_base))
			.query(&[("uploadType", "multipart")])
			.header(CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
			.body(Body::wrap_stream(parts));
		let file: DriveFile = self.json(self.send(request).await?).await?;
		debug!("uploaded {} as {}", title, file.id);
		Ok(file.into_object())
	}

	async fn delete(&self, object: &RemoteObject) -> Result<(), StoreError> {
		let request = self.http.delete(format!("{}/files/{}", self.api_base, object.id));
		let response = self.send(request).await?;
		self.read_body(response).await?;
		Ok(())
	}

	async fn download(&self, object: &RemoteObject) -> Result<DownloadStream, StoreError> {
		let url = object.download_url.as_deref().ok_or_else(|| StoreError::Other {
			message: format!("{} has no download URL", object.title),
		})?;
		let response = self.send(self.http.get(url)).await?;
		Ok(self.body_reader(response))
	}
}

/// Connects sessions to Google Drive
#[derive(Debug, Clone)]
pub struct DriveConnector {
	api_base: String,
	upload_base: String,
}

impl DriveConnector {
	pub fn new() -> Self {
		Self::with_endpoints(API_BASE, UPLOAD_BASE)
	}

	/// Point at a different API host
	pub fn with_endpoints(api_base: &str, upload_base: &str) -> Self {
		Self { api_base: api_base.to_string(), upload_base: upload_base.to_string() }
	}
}

impl Default for DriveConnector {
	fn default() -> Self {
		Self::new()
	}
}

impl StoreConnector for DriveConnector {
	fn connect(&self, auth: Authenticator, debug: bool) -> Result<Arc<dyn RemoteStore>, StoreError> {
		let wire = debug.then(DiagnosticSink::stderr);
		Ok(Arc::new(DriveStore::new(auth, &self.api_base, &self.upload_base, wire)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_key_query() {
		let q = drive_query(&ListQuery::child("SHA256E-s3--abc", "0Bfolder"));
		assert_eq!(q, "title='SHA256E-s3--abc' and '0Bfolder' in parents and trashed=false");
	}

	#[test]
	fn test_root_query_is_folder_scoped() {
		let q = drive_query(&ListQuery::folder("annex"));
		assert_eq!(
			q,
			"title='annex' and mimeType='application/vnd.google-apps.folder' and trashed=false"
		);
	}

	#[test]
	fn test_quotes_are_escaped() {
		let q = drive_query(&ListQuery::folder("bob's annex"));
		assert!(q.starts_with("title='bob\\'s annex'"));
	}

	#[test]
	fn test_drive_file_conversion() {
		let file: DriveFile = serde_json::from_str(
			r#"{"id":"f1","title":"k1","mimeType":"application/octet-stream",
			"downloadUrl":"https://dl/f1","parents":[{"id":"root1","isRoot":false}]}"#,
		)
		.unwrap();
		assert!(!file.is_folder());
		let object = file.into_object();
		assert_eq!(object.parent_id.as_deref(), Some("root1"));
		assert_eq!(object.download_url.as_deref(), Some("https://dl/f1"));
	}
}

// vim: ts=4
