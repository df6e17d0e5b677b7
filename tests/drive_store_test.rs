//! Drive binding tests against a local fake of the v2 REST API

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use gdrive_annex::credentials::{Authenticator, Token};
use gdrive_annex::store::drive::{DriveConnector, DriveStore, FOLDER_MIME};
use gdrive_annex::store::tee::DiagnosticSink;
use gdrive_annex::store::{ListQuery, RemoteObject, RemoteStore, StoreConnector, UploadBody};
use gdrive_annex::StoreError;

// ============================================================================
// Fake Drive
// ============================================================================

#[derive(Clone, Default)]
struct Fake {
	base: Arc<Mutex<String>>,
	queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
	uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
	deleted: Arc<Mutex<Vec<String>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
	headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer tok")
}

async fn list(
	State(fake): State<Fake>,
	headers: HeaderMap,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	if !authorized(&headers) {
		return StatusCode::UNAUTHORIZED.into_response();
	}
	fake.queries.lock().unwrap().push(params.clone());
	let page = match params.get("pageToken").map(String::as_str) {
		None => json!({
			"items": [{ "id": "a1", "title": "annex", "mimeType": FOLDER_MIME }],
			"nextPageToken": "p2"
		}),
		Some("p2") => json!({
			"items": [{ "id": "a2", "title": "annex", "mimeType": FOLDER_MIME }]
		}),
		Some(_) => return StatusCode::BAD_REQUEST.into_response(),
	};
	Json(page).into_response()
}

async fn create_folder(Json(metadata): Json<serde_json::Value>) -> Response {
	Json(json!({
		"id": "folder9",
		"title": metadata["title"],
		"mimeType": metadata["mimeType"],
		"parents": metadata.get("parents").cloned().unwrap_or(json!([]))
	}))
	.into_response()
}

async fn upload(
	State(fake): State<Fake>,
	headers: HeaderMap,
	Query(params): Query<HashMap<String, String>>,
	body: Bytes,
) -> Response {
	if params.get("uploadType").map(String::as_str) != Some("multipart") {
		return StatusCode::BAD_REQUEST.into_response();
	}
	let content_type = headers.get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("");
	fake.uploads.lock().unwrap().push((content_type.to_string(), body.to_vec()));
	let base = fake.base.lock().unwrap().clone();
	Json(json!({
		"id": "new1",
		"title": "k1",
		"mimeType": "application/octet-stream",
		"downloadUrl": format!("{}/download/new1", base),
		"parents": [{ "id": "root1" }]
	}))
	.into_response()
}

async fn download(Path(id): Path<String>) -> Response {
	match id.as_str() {
		"new1" => b"stored bytes".to_vec().into_response(),
		_ => StatusCode::NOT_FOUND.into_response(),
	}
}

async fn remove(State(fake): State<Fake>, Path(id): Path<String>) -> Response {
	if id == "gone" {
		let error = json!({ "error": { "code": 404, "message": "File not found: gone" } });
		return (StatusCode::NOT_FOUND, Json(error)).into_response();
	}
	fake.deleted.lock().unwrap().push(id);
	StatusCode::NO_CONTENT.into_response()
}

async fn start_fake() -> (Fake, String) {
	let fake = Fake::default();
	let app = Router::new()
		.route("/drive/v2/files", get(list).post(create_folder))
		.route("/drive/v2/files/:id", delete(remove))
		.route("/upload/drive/v2/files", post(upload))
		.route("/download/:id", get(download))
		.with_state(fake.clone());
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let base = format!("http://{}", listener.local_addr().unwrap());
	*fake.base.lock().unwrap() = base.clone();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(fake, base)
}

fn connect(base: &str) -> Arc<dyn RemoteStore> {
	DriveConnector::with_endpoints(&format!("{}/drive/v2", base), &format!("{}/upload/drive/v2", base))
		.connect(Authenticator::fixed(Token::bare("tok")), false)
		.unwrap()
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_list_follows_pages() {
	let (fake, base) = start_fake().await;
	let store = connect(&base);

	let found = store.list(&ListQuery::folder("annex")).await.unwrap();
	let ids: Vec<&str> = found.iter().map(|o| o.id.as_str()).collect();
	assert_eq!(ids, vec!["a1", "a2"]);

	let queries = fake.queries.lock().unwrap().clone();
	assert_eq!(queries.len(), 2);
	assert_eq!(
		queries[0]["q"],
		"title='annex' and mimeType='application/vnd.google-apps.folder' and trashed=false"
	);
	assert_eq!(queries[1]["pageToken"], "p2");
}

#[tokio::test]
async fn test_create_folder_under_parent() {
	let (_fake, base) = start_fake().await;
	let store = connect(&base);

	let folder = store.create_folder("f8", Some("root1")).await.unwrap();
	assert_eq!(folder.id, "folder9");
	assert_eq!(folder.title, "f8");
	assert_eq!(folder.parent_id.as_deref(), Some("root1"));
	assert!(folder.download_url.is_none());
}

#[tokio::test]
async fn test_multipart_upload_then_download() {
	let (fake, base) = start_fake().await;
	let store = connect(&base);

	let body: UploadBody = Box::new(std::io::Cursor::new(b"stored bytes".to_vec()));
	let object = store.insert("k1", "root1", body).await.unwrap();
	assert_eq!(object.id, "new1");

	let (content_type, raw) = fake.uploads.lock().unwrap()[0].clone();
	let boundary = content_type.strip_prefix("multipart/related; boundary=").unwrap().to_string();
	let raw = String::from_utf8(raw).unwrap();
	assert!(raw.starts_with(&format!("--{}\r\n", boundary)));
	assert!(raw.contains("\"title\":\"k1\""));
	assert!(raw.contains("\"id\":\"root1\""));
	assert!(raw.contains("\r\n\r\nstored bytes\r\n"));
	assert!(raw.ends_with(&format!("--{}--\r\n", boundary)));

	let mut content = Vec::new();
	store.download(&object).await.unwrap().read_to_end(&mut content).await.unwrap();
	assert_eq!(content, b"stored bytes");
}

#[tokio::test]
async fn test_delete_and_api_errors() {
	let (fake, base) = start_fake().await;
	let store = connect(&base);
	let object = |id: &str| RemoteObject {
		id: id.to_string(),
		title: "k1".to_string(),
		parent_id: None,
		download_url: None,
	};

	store.delete(&object("new1")).await.unwrap();
	assert_eq!(*fake.deleted.lock().unwrap(), vec!["new1".to_string()]);

	match store.delete(&object("gone")).await {
		Err(StoreError::Api { status, message }) => {
			assert_eq!(status, 404);
			assert_eq!(message, "File not found: gone");
		}
		other => panic!("expected API error, got {:?}", other),
	}

	assert!(store.download(&object("new1")).await.is_err(), "no download URL");
}

#[tokio::test]
async fn test_bad_token_is_api_error() {
	let (_fake, base) = start_fake().await;
	let store = DriveConnector::with_endpoints(&format!("{}/drive/v2", base), &base)
		.connect(Authenticator::fixed(Token::bare("wrong")), false)
		.unwrap();
	let result = store.list(&ListQuery::folder("annex")).await;
	assert!(matches!(result, Err(StoreError::Api { status: 401, .. })));
}

#[tokio::test]
async fn test_wire_log_mirrors_traffic() {
	let (_fake, base) = start_fake().await;
	let capture = Capture::default();
	let store = DriveStore::new(
		Authenticator::fixed(Token::bare("tok")),
		&format!("{}/drive/v2", base),
		&format!("{}/upload/drive/v2", base),
		Some(DiagnosticSink::new(capture.clone())),
	)
	.unwrap();

	let found = store.list(&ListQuery::folder("annex")).await.unwrap();
	assert_eq!(found.len(), 2, "consumer still sees the full body");

	let log = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
	assert!(log.contains("GET http://"));
	assert!(log.contains("200 OK"));
	assert!(log.contains("\"nextPageToken\":\"p2\""));
	assert!(log.contains("authorization: <redacted>"));
	assert!(!log.contains("Bearer tok"));
}

#[tokio::test]
async fn test_wire_log_mirrors_upload_body() {
	let (fake, base) = start_fake().await;
	let capture = Capture::default();
	let store = DriveStore::new(
		Authenticator::fixed(Token::bare("tok")),
		&format!("{}/drive/v2", base),
		&format!("{}/upload/drive/v2", base),
		Some(DiagnosticSink::new(capture.clone())),
	)
	.unwrap();

	let body: UploadBody = Box::new(std::io::Cursor::new(b"UNIQUE-PAYLOAD-BYTES".to_vec()));
	store.insert("k1", "root1", body).await.unwrap();

	let (content_type, raw) = fake.uploads.lock().unwrap()[0].clone();
	let boundary = content_type.strip_prefix("multipart/related; boundary=").unwrap().to_string();
	let log = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
	assert!(log.contains("POST http://"));
	assert!(log.contains("\"title\":\"k1\""));
	assert!(log.contains("UNIQUE-PAYLOAD-BYTES"));
	assert!(log.contains(&format!("--{}--", boundary)));
	assert!(log.contains(&String::from_utf8(raw).unwrap()), "log holds the exact request body");
}

// vim: ts=4
