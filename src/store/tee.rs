//! Transparent wire logging
//!
//! [`TeeReader`] copies every byte it reads to a [`DiagnosticSink`] while
//! handing the identical bytes on to its consumer.

use std::fmt;
use std::io::{self, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use crate::logging::*;

/// Shared side channel for diagnostic bytes, stderr unless told otherwise
#[derive(Clone)]
pub struct DiagnosticSink {
	out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DiagnosticSink {
	pub fn new(out: impl Write + Send + 'static) -> Self {
		Self { out: Arc::new(Mutex::new(Box::new(out))) }
	}

	pub fn stderr() -> Self {
		Self::new(io::stderr())
	}

	/// Append raw bytes; sink failures never reach the data path
	pub fn write(&self, bytes: &[u8]) {
		let Ok(mut out) = self.out.lock() else {
			return;
		};
		if let Err(e) = out.write_all(bytes).and_then(|_| out.flush()) {
			debug!("diagnostic sink write failed: {}", e);
		}
	}

	/// Append one line of text
	pub fn line(&self, text: impl fmt::Display) {
		self.write(format!("{}\n", text).as_bytes());
	}
}

impl Default for DiagnosticSink {
	fn default() -> Self {
		Self::stderr()
	}
}

impl fmt::Debug for DiagnosticSink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("DiagnosticSink")
	}
}

/// Reader that mirrors everything it yields into a sink
pub struct TeeReader<R> {
	inner: R,
	sink: DiagnosticSink,
}

impl<R> TeeReader<R> {
	pub fn new(inner: R, sink: DiagnosticSink) -> Self {
		Self { inner, sink }
	}
}

impl<R: AsyncRead + Unpin> AsyncRead for TeeReader<R> {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let this = self.get_mut();
		let before = buf.filled().len();
		ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
		let fresh = &buf.filled()[before..];
		if !fresh.is_empty() {
			this.sink.write(fresh);
		}
		Poll::Ready(Ok(()))
	}
}


// vim: ts=4
