//! Scripted git-annex controller for driving a remote over in-memory pipes

#![allow(dead_code)]

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;

use gdrive_annex::config::{Backend, Config};
use gdrive_annex::SpecialRemote;

const LINE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn memory_config() -> Config {
	Config { backend: Backend::Memory, chunk_size: 4, ..Config::default() }
}

pub struct Controller {
	input: Option<DuplexStream>,
	output: Lines<BufReader<DuplexStream>>,
	remote: JoinHandle<io::Result<()>>,
}

impl Controller {
	/// Start the remote and consume its VERSION greeting
	pub async fn start(remote: SpecialRemote) -> Self {
		let (input, remote_in) = tokio::io::duplex(64 * 1024);
		let (remote_out, output) = tokio::io::duplex(64 * 1024);
		let remote = tokio::spawn(remote.serve(remote_in, remote_out));
		let mut ctl = Self { input: Some(input), output: BufReader::new(output).lines(), remote };
		ctl.expect("VERSION 1").await;
		ctl
	}

	pub async fn send(&mut self, line: &str) {
		let input = self.input.as_mut().expect("input already closed");
		input.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
	}

	/// Next line from the remote, or None once its output is closed
	pub async fn try_recv(&mut self) -> Option<String> {
		tokio::time::timeout(LINE_TIMEOUT, self.output.next_line())
			.await
			.expect("timed out waiting for the remote")
			.unwrap()
	}

	pub async fn recv(&mut self) -> String {
		self.try_recv().await.expect("remote closed its output")
	}

	pub async fn expect(&mut self, line: &str) {
		assert_eq!(self.recv().await, line);
	}

	/// PROGRESS values up to the next other line, and that line
	pub async fn progress_then(&mut self) -> (Vec<u64>, String) {
		let mut progress = Vec::new();
		loop {
			let line = self.recv().await;
			match line.strip_prefix("PROGRESS ") {
				Some(n) => progress.push(n.parse().unwrap()),
				None => return (progress, line),
			}
		}
	}

	/// Standard PREPARE exchange with a bare token
	pub async fn prepare(&mut self, directory: &str) {
		self.send("PREPARE").await;
		self.expect("GETCREDS oauth").await;
		self.send("CREDS oauth oauth deadbeef").await;
		self.expect("GETCONFIG directory").await;
		self.send(&format!("VALUE {}", directory)).await;
		self.expect("PREPARE-SUCCESS").await;
	}

	/// Close the input and collect whatever the remote still writes
	pub async fn finish(mut self) -> Vec<String> {
		self.input.take();
		let mut rest = Vec::new();
		while let Some(line) = self.try_recv().await {
			rest.push(line);
		}
		tokio::time::timeout(LINE_TIMEOUT, self.remote)
			.await
			.expect("remote did not exit")
			.unwrap()
			.unwrap();
		rest
	}

	/// Wait for the remote to exit on its own, input still open
	pub async fn wait_exit(self) -> Vec<String> {
		let Controller { input, mut output, remote } = self;
		let mut rest = Vec::new();
		while let Some(line) = tokio::time::timeout(LINE_TIMEOUT, output.next_line())
			.await
			.expect("remote kept its output open")
			.unwrap()
		{
			rest.push(line);
		}
		remote.await.unwrap().unwrap();
		drop(input);
		rest
	}
}

// vim: ts=4
