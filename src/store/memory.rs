//! In-process object store
//!
//! Behaves like the Drive binding as far as the remote can tell: ids are
//! opaque, titles are not unique, folders and files share one namespace.
//! Handles are cheap clones sharing the same state, so a test can keep one
//! and inspect what a session did through another.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

use super::{DownloadStream, ListQuery, RemoteObject, RemoteStore, StoreConnector, UploadBody};
use crate::credentials::Authenticator;
use crate::error::StoreError;
use crate::logging::*;

#[derive(Debug, Clone)]
struct Entry {
	object: RemoteObject,
	is_folder: bool,
	content: Arc<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
	entries: BTreeMap<String, Entry>,
	next_id: u64,
	download_cutoff: Option<usize>,
}

#[derive(Debug, Default)]
struct Shared {
	inner: Mutex<Inner>,
	uploads: AtomicU64,
	offline: AtomicBool,
}

/// Store keeping every object in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
	shared: Arc<Shared>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of successful uploads so far
	pub fn upload_count(&self) -> u64 {
		self.shared.uploads.load(Ordering::SeqCst)
	}

	/// Make every call fail as if the network were down
	pub fn set_offline(&self, offline: bool) {
		self.shared.offline.store(offline, Ordering::SeqCst);
	}

	/// Make downloads fail with a reset after `bytes` bytes, or never with `None`
	pub fn break_downloads_after(&self, bytes: Option<usize>) {
		if let Ok(mut inner) = self.shared.inner.lock() {
			inner.download_cutoff = bytes;
		}
	}

	/// Content of the first file with this title, if any
	pub fn content_of(&self, title: &str) -> Option<Vec<u8>> {
		let inner = self.shared.inner.lock().ok()?;
		inner
			.entries
			.values()
			.find(|e| !e.is_folder && e.object.title == title)
			.map(|e| e.content.to_vec())
	}

	/// Title path from the top down to the object with this id
	pub fn path_of(&self, id: &str) -> Option<Vec<String>> {
		let inner = self.shared.inner.lock().ok()?;
		let mut path = Vec::new();
		let mut cursor = Some(id.to_string());
		while let Some(id) = cursor {
			let entry = inner.entries.get(&id)?;
			path.push(entry.object.title.clone());
			cursor = entry.object.parent_id.clone();
		}
		path.reverse();
		Some(path)
	}

	fn check_online(&self) -> Result<(), StoreError> {
		if self.shared.offline.load(Ordering::SeqCst) {
			return Err(StoreError::Api { status: 503, message: "store offline".to_string() });
		}
		Ok(())
	}

	fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
		self.check_online()?;
		self.shared.inner.lock().map_err(|_| StoreError::from("memory store poisoned".to_string()))
	}

	fn add(
		&self,
		title: &str,
		parent: Option<&str>,
		is_folder: bool,
		content: Vec<u8>,
	) -> Result<RemoteObject, StoreError> {
		let mut inner = self.lock()?;
		if let Some(parent) = parent {
			if !inner.entries.contains_key(parent) {
				return Err(StoreError::Api { status: 404, message: format!("File not found: {}", parent) });
			}
		}
		inner.next_id += 1;
		let id = format!("mem{:06}", inner.next_id);
		let object = RemoteObject {
			id: id.clone(),
			title: title.to_string(),
			parent_id: parent.map(str::to_string),
			download_url: (!is_folder).then(|| format!("memory://{}", id)),
		};
		inner.entries.insert(id, Entry { object: object.clone(), is_folder, content: Arc::new(content) });
		Ok(object)
	}
}

#[async_trait]
impl RemoteStore for MemoryStore {
	async fn list(&self, query: &ListQuery) -> Result<Vec<RemoteObject>, StoreError> {
		let inner = self.lock()?;
		Ok(inner
			.entries
			.values()
			.filter(|e| query.matches(&e.object, e.is_folder))
			.map(|e| e.object.clone())
			.collect())
	}

	async fn create_folder(&self, title: &str, parent: Option<&str>) -> Result<RemoteObject, StoreError> {
		self.add(title, parent, true, Vec::new())
	}

	async fn insert(&self, title: &str, parent: &str, mut body: UploadBody) -> Result<RemoteObject, StoreError> {
		self.check_online()?;
		let mut content = Vec::new();
		body.read_to_end(&mut content).await?;
		let object = self.add(title, Some(parent), false, content)?;
		self.shared.uploads.fetch_add(1, Ordering::SeqCst);
		debug!("memory store: {} stored as {}", title, object.id);
		Ok(object)
	}

	async fn delete(&self, object: &RemoteObject) -> Result<(), StoreError> {
		let mut inner = self.lock()?;
		match inner.entries.remove(&object.id) {
			Some(_) => Ok(()),
			None => Err(StoreError::Api { status: 404, message: format!("File not found: {}", object.id) }),
		}
	}

	async fn download(&self, object: &RemoteObject) -> Result<DownloadStream, StoreError> {
		let (content, cutoff) = {
			let inner = self.lock()?;
			match inner.entries.get(&object.id) {
				Some(entry) if !entry.is_folder => (entry.content.clone(), inner.download_cutoff),
				_ => {
					return Err(StoreError::Api {
						status: 404,
						message: format!("File not found: {}", object.id),
					})
				}
			}
		};
		match cutoff {
			Some(n) if n < content.len() => {
				let parts = vec![
					Ok(Bytes::copy_from_slice(&content[..n])),
					Err(io::Error::new(io::ErrorKind::ConnectionReset, "download interrupted")),
				];
				Ok(Box::new(StreamReader::new(stream::iter(parts))))
			}
			_ => Ok(Box::new(std::io::Cursor::new(content.to_vec()))),
		}
	}
}

/// Hands every session the same [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
	store: MemoryStore,
}

impl MemoryConnector {
	pub fn new(store: MemoryStore) -> Self {
		Self { store }
	}
}

impl StoreConnector for MemoryConnector {
	fn connect(&self, _auth: Authenticator, _debug: bool) -> Result<Arc<dyn RemoteStore>, StoreError> {
		Ok(Arc::new(self.store.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_insert_list_download() {
		let store = MemoryStore::new();
		let root = store.create_folder("annex", None).await.unwrap();
		let body: UploadBody = Box::new(std::io::Cursor::new(b"hello".to_vec()));
		let file = store.insert("k1", &root.id, body).await.unwrap();

		let found = store.list(&ListQuery::child("k1", &root.id)).await.unwrap();
		assert_eq!(found, vec![file.clone()]);
		assert!(store.list(&ListQuery::folder("k1")).await.unwrap().is_empty());

		let mut content = Vec::new();
		store.download(&file).await.unwrap().read_to_end(&mut content).await.unwrap();
		assert_eq!(content, b"hello");
		assert_eq!(store.upload_count(), 1);
		assert_eq!(store.path_of(&file.id).unwrap(), vec!["annex", "k1"]);
	}

	#[tokio::test]
	async fn test_offline_fails_every_call() {
		let store = MemoryStore::new();
		store.set_offline(true);
		assert!(store.list(&ListQuery::folder("annex")).await.is_err());
		assert!(store.create_folder("annex", None).await.is_err());
	}

	#[tokio::test]
	async fn test_broken_download_errors_midway() {
		let store = MemoryStore::new();
		let root = store.create_folder("annex", None).await.unwrap();
		let body: UploadBody = Box::new(std::io::Cursor::new(b"0123456789".to_vec()));
		let file = store.insert("k1", &root.id, body).await.unwrap();
		store.break_downloads_after(Some(6));

		let mut content = Vec::new();
		let err = store.download(&file).await.unwrap().read_to_end(&mut content).await.unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
		assert_eq!(content, b"012345");
	}

	#[tokio::test]
	async fn test_delete_missing_object() {
		let store = MemoryStore::new();
		let ghost = RemoteObject {
			id: "nope".to_string(),
			title: "k".to_string(),
			parent_id: None,
			download_url: None,
		};
		assert!(matches!(store.delete(&ghost).await, Err(StoreError::Api { status: 404, .. })));
	}
}

// vim: ts=4
