//! Line transport between git-annex and the remote
//!
//! Two pumps run for the lifetime of the process. The read pump turns the
//! controller's input stream into lines on an intake queue; the write pump
//! drains an outtake queue onto the output stream, one newline-terminated
//! line per message. Protocol logic only ever sees the queues.
//!
//! The read pump closes the intake queue when the input ends, after every
//! line already read has been queued. The write pump exits once every
//! [`Outbox`] handle is dropped and the queue is empty, so dropping the
//! [`Transport`] is what lets pending output drain.

use std::fmt::Display;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::logging::*;
use crate::protocol::{ProtocolError, ProtocolResult, Response};

/// Lines buffered between the read pump and the dispatcher
const INTAKE_CAPACITY: usize = 32;

/// Cloneable, non-blocking handle onto the outtake queue
///
/// Submission order is wire order.
#[derive(Clone, Debug)]
pub struct Outbox {
	tx: mpsc::UnboundedSender<String>,
}

impl Outbox {
	/// Queue a line for output
	pub fn send(&self, line: impl Display) {
		let line = line.to_string();
		if self.tx.send(line).is_err() {
			warn!("output closed, dropping message");
		}
	}

	/// Queue a PROGRESS message with the cumulative byte count
	pub fn progress(&self, bytes: u64) {
		self.send(Response::Progress(bytes));
	}

	#[cfg(test)]
	pub(crate) fn capture() -> (Self, mpsc::UnboundedReceiver<String>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}
}

/// Protocol-facing side of the pumps
pub struct Transport {
	inbox: mpsc::Receiver<String>,
	outbox: Outbox,
}

impl Transport {
	fn new(inbox: mpsc::Receiver<String>, outbox: Outbox) -> Self {
		Self { inbox, outbox }
	}

	/// Handle for code that reports progress while the transport is borrowed elsewhere
	pub fn outbox(&self) -> &Outbox {
		&self.outbox
	}

	/// Queue a line for output
	pub fn send(&self, line: impl Display) {
		self.outbox.send(line);
	}

	/// Next input line, or None once the input is closed and drained
	pub async fn receive(&mut self) -> Option<String> {
		self.inbox.recv().await
	}

	/// Send a sub-request and block for its reply
	///
	/// Relies on the controller answering in order: the first line received
	/// after the request is taken as its reply, whatever it says. Validating
	/// the shape of that reply is the caller's job.
	pub async fn query(&mut self, request: Response) -> ProtocolResult<String> {
		let label = request.to_string();
		self.send(request);
		match self.receive().await {
			Some(reply) => {
				debug!("{} -> {}", label, reply);
				Ok(reply)
			}
			None => Err(ProtocolError::Disconnected { request: label }),
		}
	}
}

/// Join handles of the two pump tasks
pub struct Pumps {
	reader: JoinHandle<()>,
	writer: JoinHandle<io::Result<()>>,
}

impl Pumps {
	/// Wait for the pumps after the dispatcher has dropped its [`Transport`]
	///
	/// Output is always drained. In debug mode the read pump may still be
	/// parked on an input that never closes, so it is abandoned instead of
	/// joined.
	pub async fn finish(self, debug: bool) -> io::Result<()> {
		if debug {
			self.reader.abort();
		} else if let Err(e) = self.reader.await {
			warn!("read pump ended abnormally: {}", e);
		}
		match self.writer.await {
			Ok(result) => result,
			Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
		}
	}
}

/// Start both pumps over the given streams
pub fn spawn<R, W>(input: R, output: W) -> (Transport, Pumps)
where
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let (in_tx, in_rx) = mpsc::channel(INTAKE_CAPACITY);
	let (out_tx, out_rx) = mpsc::unbounded_channel();
	let outbox = Outbox { tx: out_tx };

	let reader = tokio::spawn(read_pump(input, in_tx, outbox.clone()));
	let writer = tokio::spawn(write_pump(output, out_rx));

	(Transport::new(in_rx, outbox), Pumps { reader, writer })
}

async fn read_pump<R>(input: R, intake: mpsc::Sender<String>, outbox: Outbox)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(input).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => {
				if intake.send(line).await.is_err() {
					debug!("dispatcher gone, stopping read pump");
					break;
				}
			}
			Ok(None) => break,
			Err(e) => {
				error!("read error: {}", e);
				outbox.send(Response::Error(e.to_string()));
				break;
			}
		}
	}
	debug!("input closed");
}

async fn write_pump<W>(mut output: W, mut outtake: mpsc::UnboundedReceiver<String>) -> io::Result<()>
where
	W: AsyncWrite + Unpin,
{
	while let Some(line) = outtake.recv().await {
		output.write_all(line.as_bytes()).await?;
		output.write_all(b"\n").await?;
		output.flush().await?;
	}
	output.shutdown().await
}


// vim: ts=4
