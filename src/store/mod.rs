//! Remote object store seam
//!
//! The transfer engine and resolver only talk to a [`RemoteStore`]. The
//! Google Drive binding lives in [`drive`]; [`memory`] keeps everything in
//! process for exercising the protocol without network access.

pub mod drive;
pub mod memory;
pub mod tee;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::credentials::Authenticator;
use crate::error::StoreError;

/// Body streamed into a new remote object
pub type UploadBody = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Readable content of a remote object
pub type DownloadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Handle to an object (file or folder) in the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
	pub id: String,
	pub title: String,
	pub parent_id: Option<String>,
	/// Locator for reading the content; folders have none
	pub download_url: Option<String>,
}

/// Filter for a listing query
///
/// Trashed objects are always excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
	/// Exact title to match
	pub title: String,
	/// Restrict to children of this object; None searches everywhere
	pub parent: Option<String>,
	pub folders_only: bool,
}

impl ListQuery {
	/// Objects titled `title` directly under `parent`
	pub fn child(title: &str, parent: &str) -> Self {
		Self { title: title.to_string(), parent: Some(parent.to_string()), folders_only: false }
	}

	/// Folders titled `title` anywhere in the store
	pub fn folder(title: &str) -> Self {
		Self { title: title.to_string(), parent: None, folders_only: true }
	}

	/// Whether an object satisfies the query, independent of how the backend filtered
	pub fn matches(&self, object: &RemoteObject, is_folder: bool) -> bool {
		object.title == self.title
			&& (!self.folders_only || is_folder)
			&& self.parent.as_ref().map_or(true, |p| object.parent_id.as_ref() == Some(p))
	}
}

/// Operations the remote needs from an object store
#[async_trait]
pub trait RemoteStore: Send + Sync {
	/// All non-trashed objects matching the query, every page
	async fn list(&self, query: &ListQuery) -> Result<Vec<RemoteObject>, StoreError>;

	/// Create a folder, at the top level when `parent` is None
	async fn create_folder(
		&self,
		title: &str,
		parent: Option<&str>,
	) -> Result<RemoteObject, StoreError>;

	/// Create a new object with the given content
	async fn insert(
		&self,
		title: &str,
		parent: &str,
		body: UploadBody,
	) -> Result<RemoteObject, StoreError>;

	async fn delete(&self, object: &RemoteObject) -> Result<(), StoreError>;

	/// Open the object's content for reading
	async fn download(&self, object: &RemoteObject) -> Result<DownloadStream, StoreError>;
}

/// Builds the store for a session once credentials are known
pub trait StoreConnector: Send + Sync {
	fn connect(&self, auth: Authenticator, debug: bool) -> Result<Arc<dyn RemoteStore>, StoreError>;
}

// vim: ts=4
