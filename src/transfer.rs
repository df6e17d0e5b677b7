//! Transfer engine
//!
//! A [`Session`] exists once PREPARE has succeeded and owns everything the
//! key operations touch: the store client, the resolver with its cache and
//! the chunk size. Each operation turns its outcome into exactly one final
//! response; store and remote failures never escape as errors.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};

use crate::error::{ResolveError, StoreError};
use crate::logging::*;
use crate::protocol::{Direction, Response};
use crate::resolver::{RemotePath, Resolver};
use crate::store::{RemoteObject, RemoteStore};
use crate::transport::Outbox;

/// Reader that yields at most one chunk per read and reports cumulative progress
///
/// An empty source reports `PROGRESS 0` once at end of stream.
pub struct ProgressReader<R> {
	inner: R,
	outbox: Outbox,
	scratch: Vec<u8>,
	total: u64,
	reported: bool,
}

impl<R> ProgressReader<R> {
	pub fn new(inner: R, outbox: Outbox, chunk_size: usize) -> Self {
		Self { inner, outbox, scratch: vec![0; chunk_size.max(1)], total: 0, reported: false }
	}

	/// Bytes read so far
	pub fn total(&self) -> u64 {
		self.total
	}
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let this = self.get_mut();
		let limit = buf.remaining().min(this.scratch.len());
		let mut chunk = ReadBuf::new(&mut this.scratch[..limit]);
		ready!(Pin::new(&mut this.inner).poll_read(cx, &mut chunk))?;

		let n = chunk.filled().len();
		if n > 0 {
			buf.put_slice(chunk.filled());
			this.total += n as u64;
		} else if this.reported {
			return Poll::Ready(Ok(()));
		}
		this.outbox.progress(this.total);
		this.reported = true;
		Poll::Ready(Ok(()))
	}
}

/// State of a prepared remote
pub struct Session {
	store: Arc<dyn RemoteStore>,
	resolver: Resolver,
	chunk_size: usize,
}

impl Session {
	pub fn new(store: Arc<dyn RemoteStore>, resolver: Resolver, chunk_size: usize) -> Self {
		Self { store, resolver, chunk_size }
	}

	pub fn root(&self) -> &RemoteObject {
		self.resolver.root()
	}

	/// TRANSFER STORE: upload unless the key is already there
	pub async fn store(&mut self, outbox: &Outbox, key: &str, path: &RemotePath, local: &Path) -> Response {
		match self.try_store(outbox, path, local).await {
			Ok(()) => Response::TransferSuccess(Direction::Store, key.to_string()),
			Err(e) => {
				warn!("store {} failed: {}", key, e);
				Response::TransferFailure(Direction::Store, key.to_string(), e.to_string())
			}
		}
	}

	async fn try_store(&mut self, outbox: &Outbox, path: &RemotePath, local: &Path) -> Result<(), StoreError> {
		match self.resolver.resolve(&*self.store, path).await {
			Ok(existing) => {
				debug!("{} already present as {}", path.name, existing.id);
				return Ok(());
			}
			Err(ResolveError::NotFound) => {}
			Err(ResolveError::Store(e)) => return Err(e),
		}

		let file = File::open(local).await.map_err(|e| local_error(local, e))?;
		let parent = self.resolver.ensure_path(&*self.store, &path.dirs).await?;
		let body = ProgressReader::new(file, outbox.clone(), self.chunk_size);
		let object = self.store.insert(&path.name, &parent.id, Box::new(body)).await?;
		info!("stored {} as {}", path.name, object.id);
		self.resolver.remember(path, object);
		Ok(())
	}

	/// TRANSFER RETRIEVE: download into `local`
	///
	/// A partially written file is left behind on failure.
	pub async fn retrieve(&mut self, outbox: &Outbox, key: &str, path: &RemotePath, local: &Path) -> Response {
		match self.try_retrieve(outbox, path, local).await {
			Ok(bytes) => {
				debug!("retrieved {} ({} bytes)", key, bytes);
				Response::TransferSuccess(Direction::Retrieve, key.to_string())
			}
			Err(e) => {
				warn!("retrieve {} failed: {}", key, e);
				Response::TransferFailure(Direction::Retrieve, key.to_string(), e.to_string())
			}
		}
	}

	async fn try_retrieve(&mut self, outbox: &Outbox, path: &RemotePath, local: &Path) -> Result<u64, StoreError> {
		let object = match self.resolver.resolve(&*self.store, path).await {
			Ok(object) => object,
			Err(ResolveError::NotFound) => {
				return Err(StoreError::Other { message: format!("{} not found", path.name) })
			}
			Err(ResolveError::Store(e)) => return Err(e),
		};

		let download = self.store.download(&object).await?;
		let mut reader = ProgressReader::new(download, outbox.clone(), self.chunk_size);
		let mut file = File::create(local).await.map_err(|e| local_error(local, e))?;
		tokio::io::copy(&mut reader, &mut file).await?;
		file.flush().await?;
		Ok(reader.total())
	}

	/// CHECKPRESENT: FAILURE means absent, UNKNOWN means the lookup failed
	pub async fn check_present(&mut self, key: &str, path: &RemotePath) -> Response {
		match self.resolver.resolve(&*self.store, path).await {
			Ok(_) => Response::CheckPresentSuccess(key.to_string()),
			Err(ResolveError::NotFound) => Response::CheckPresentFailure(key.to_string()),
			Err(ResolveError::Store(e)) => {
				warn!("checkpresent {}: {}", key, e);
				Response::CheckPresentUnknown(key.to_string(), e.to_string())
			}
		}
	}

	/// REMOVE: removing a key that is not there succeeds
	pub async fn remove(&mut self, key: &str, path: &RemotePath) -> Response {
		let object = match self.resolver.resolve(&*self.store, path).await {
			Ok(object) => object,
			Err(ResolveError::NotFound) => return Response::RemoveSuccess(key.to_string()),
			Err(ResolveError::Store(e)) => return Response::RemoveFailure(key.to_string(), e.to_string()),
		};

		match self.store.delete(&object).await {
			Ok(()) | Err(StoreError::Api { status: 404, .. }) => {
				self.resolver.forget(path);
				Response::RemoveSuccess(key.to_string())
			}
			Err(e) => {
				warn!("remove {} failed: {}", key, e);
				Response::RemoveFailure(key.to_string(), e.to_string())
			}
		}
	}
}

fn local_error(path: &Path, e: io::Error) -> StoreError {
	StoreError::Io(io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
}


// vim: ts=4
