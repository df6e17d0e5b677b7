//! Key to remote object resolution
//!
//! Keys live below the session's root folder, either directly (flat layout)
//! or under the DIRHASH directories git-annex hands out (hashed layout).
//! Everything found or created is memoized by its slash-joined path, so a
//! key is listed remotely at most once per session unless it is forgotten.
//!
//! Directory creation is gated by this cache and one listing only. Two
//! processes sharing a root can both miss and both create the same
//! directory; sequential use from one process is safe.

use std::collections::HashMap;

use crate::error::{ResolveError, StoreError};
use crate::logging::*;
use crate::store::{ListQuery, RemoteObject, RemoteStore};

/// Where a key lives relative to the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
	pub dirs: Vec<String>,
	pub name: String,
}

impl RemotePath {
	/// Key stored directly in the root
	pub fn flat(key: &str) -> Self {
		Self { dirs: Vec::new(), name: key.to_string() }
	}

	/// Key stored under a DIRHASH value such as `f8/3a/`
	pub fn hashed(key: &str, dirhash: &str) -> Self {
		Self {
			dirs: dirhash.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect(),
			name: key.to_string(),
		}
	}

	fn cache_key(&self) -> String {
		let mut key = dir_key(&self.dirs);
		key.push_str(&self.name);
		key
	}
}

/// Cache key for a directory: segments joined, with a trailing slash
fn dir_key(dirs: &[String]) -> String {
	dirs.iter().map(|d| format!("{}/", d)).collect()
}

/// Root folder handle plus the path cache
#[derive(Debug)]
pub struct Resolver {
	root: RemoteObject,
	cache: HashMap<String, RemoteObject>,
}

impl Resolver {
	/// Find the root folder by title, creating it at the top level if absent
	pub async fn resolve_root(store: &dyn RemoteStore, name: &str) -> Result<Self, StoreError> {
		let existing = store.list(&ListQuery::folder(name)).await?.into_iter().find(|o| o.title == name);
		let root = match existing {
			Some(root) => {
				debug!("using root folder {} ({})", name, root.id);
				root
			}
			None => {
				info!("root folder {} not found, creating it", name);
				store.create_folder(name, None).await?
			}
		};
		Ok(Self::with_root(root))
	}

	pub fn with_root(root: RemoteObject) -> Self {
		Self { root, cache: HashMap::new() }
	}

	pub fn root(&self) -> &RemoteObject {
		&self.root
	}

	/// Look a key up without creating anything
	///
	/// A missing directory along the way is `NotFound`, same as a missing key.
	pub async fn resolve(
		&mut self,
		store: &dyn RemoteStore,
		path: &RemotePath,
	) -> Result<RemoteObject, ResolveError> {
		let key = path.cache_key();
		if let Some(hit) = self.cache.get(&key) {
			return Ok(hit.clone());
		}

		let mut parent = self.root.clone();
		for depth in 1..=path.dirs.len() {
			let dir_path = dir_key(&path.dirs[..depth]);
			parent = match self.cache.get(&dir_path) {
				Some(dir) => dir.clone(),
				None => {
					let dir = find_child(store, &parent, &path.dirs[depth - 1]).await?;
					self.cache.insert(dir_path, dir.clone());
					dir
				}
			};
		}

		let object = find_child(store, &parent, &path.name).await?;
		self.cache.insert(key, object.clone());
		Ok(object)
	}

	/// Directory for `dirs`, creating missing segments in order
	pub async fn ensure_path(
		&mut self,
		store: &dyn RemoteStore,
		dirs: &[String],
	) -> Result<RemoteObject, StoreError> {
		let mut parent = self.root.clone();
		for depth in 1..=dirs.len() {
			let dir_path = dir_key(&dirs[..depth]);
			if let Some(dir) = self.cache.get(&dir_path) {
				parent = dir.clone();
				continue;
			}
			let title = &dirs[depth - 1];
			let dir = match find_child(store, &parent, title).await {
				Ok(dir) => dir,
				Err(ResolveError::NotFound) => {
					debug!("creating directory {}", dir_path);
					store.create_folder(title, Some(&parent.id)).await?
				}
				Err(ResolveError::Store(e)) => return Err(e),
			};
			self.cache.insert(dir_path, dir.clone());
			parent = dir;
		}
		Ok(parent)
	}

	/// Record an object just created at `path`
	pub fn remember(&mut self, path: &RemotePath, object: RemoteObject) {
		self.cache.insert(path.cache_key(), object);
	}

	/// Drop a cached key, after it was removed remotely
	pub fn forget(&mut self, path: &RemotePath) {
		self.cache.remove(&path.cache_key());
	}
}

async fn find_child(
	store: &dyn RemoteStore,
	parent: &RemoteObject,
	title: &str,
) -> Result<RemoteObject, ResolveError> {
	store
		.list(&ListQuery::child(title, &parent.id))
		.await?
		.into_iter()
		.find(|o| o.title == title)
		.ok_or(ResolveError::NotFound)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::memory::MemoryStore;

	#[test]
	fn test_hashed_path_drops_empty_segments() {
		let path = RemotePath::hashed("k1", "f8/3a/");
		assert_eq!(path.dirs, vec!["f8", "3a"]);
		assert_eq!(path.cache_key(), "f8/3a/k1");
		assert_eq!(RemotePath::hashed("k1", "").dirs.len(), 0);
	}

	#[tokio::test]
	async fn test_root_is_created_once() {
		let store = MemoryStore::new();
		let first = Resolver::resolve_root(&store, "annex").await.unwrap();
		let second = Resolver::resolve_root(&store, "annex").await.unwrap();
		assert_eq!(first.root().id, second.root().id);
		assert_eq!(store.list(&ListQuery::folder("annex")).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_missing_key_is_not_found() {
		let store = MemoryStore::new();
		let mut resolver = Resolver::resolve_root(&store, "annex").await.unwrap();
		let flat = resolver.resolve(&store, &RemotePath::flat("k1")).await;
		assert!(matches!(flat, Err(ResolveError::NotFound)));

		let hashed = resolver.resolve(&store, &RemotePath::hashed("k1", "aa/bb/")).await;
		assert!(matches!(hashed, Err(ResolveError::NotFound)));
		// lookups never create directories
		assert!(store.list(&ListQuery::folder("aa")).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_ensure_path_creates_and_memoizes() {
		let store = MemoryStore::new();
		let mut resolver = Resolver::resolve_root(&store, "annex").await.unwrap();
		let dirs = vec!["aa".to_string(), "bb".to_string()];

		let leaf = resolver.ensure_path(&store, &dirs).await.unwrap();
		assert_eq!(store.path_of(&leaf.id).unwrap(), vec!["annex", "aa", "bb"]);

		store.set_offline(true);
		let again = resolver.ensure_path(&store, &dirs).await.unwrap();
		assert_eq!(again.id, leaf.id);
	}

	#[tokio::test]
	async fn test_lookup_error_is_not_not_found() {
		let store = MemoryStore::new();
		let mut resolver = Resolver::resolve_root(&store, "annex").await.unwrap();
		store.set_offline(true);
		let result = resolver.resolve(&store, &RemotePath::flat("k1")).await;
		assert!(matches!(result, Err(ResolveError::Store(_))));
	}

	#[tokio::test]
	async fn test_forget_drops_cached_key() {
		let store = MemoryStore::new();
		let mut resolver = Resolver::resolve_root(&store, "annex").await.unwrap();
		let path = RemotePath::flat("k1");
		let fake = RemoteObject {
			id: "x".to_string(),
			title: "k1".to_string(),
			parent_id: Some(resolver.root().id.clone()),
			download_url: None,
		};
		resolver.remember(&path, fake.clone());
		assert_eq!(resolver.resolve(&store, &path).await.unwrap(), fake);

		resolver.forget(&path);
		assert!(matches!(resolver.resolve(&store, &path).await, Err(ResolveError::NotFound)));
	}
}

// vim: ts=4
