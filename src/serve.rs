//! Special remote session loop
//!
//! One process serves one git-annex conversation. The loop reads a line,
//! looks it up in the command table and runs the handler to completion
//! before reading the next line. Handlers may query the controller
//! (GETCREDS, GETCONFIG, DIRHASH) in the middle; the next line read is
//! taken as the answer.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{Config, Layout};
use crate::credentials::{Authenticator, CredentialManager};
use crate::dispatch::{self, Command, CommandTable};
use crate::logging::*;
use crate::protocol::messages::{
	parse_creds, parse_value, CREDS_SETTING, CREDS_USER, DIRECTORY_SETTING, PROTOCOL_VERSION,
};
use crate::protocol::{Direction, ProtocolError, ProtocolResult, Response};
use crate::resolver::{RemotePath, Resolver};
use crate::store::StoreConnector;
use crate::transfer::Session;
use crate::transport::{self, Transport};

const NOT_PREPARED: &str = "remote not prepared";

/// Protocol state for one conversation
pub struct SpecialRemote {
	config: Config,
	connector: Arc<dyn StoreConnector>,
	credentials: CredentialManager,
	session: Option<Session>,
	table: CommandTable<Command>,
}

impl SpecialRemote {
	pub fn new(config: Config, connector: Arc<dyn StoreConnector>) -> Self {
		let credentials = CredentialManager::new(&config);
		Self { config, connector, credentials, session: None, table: dispatch::commands() }
	}

	/// Use a preconfigured credential manager (custom browser launcher)
	pub fn with_credentials(mut self, credentials: CredentialManager) -> Self {
		self.credentials = credentials;
		self
	}

	/// Speak the protocol over the given streams until the input ends
	pub async fn serve<R, W>(mut self, input: R, output: W) -> io::Result<()>
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let (mut transport, pumps) = transport::spawn(input, output);
		self.run(&mut transport).await;
		drop(transport);
		pumps.finish(self.config.debug).await
	}

	/// Dispatch loop
	pub async fn run(&mut self, transport: &mut Transport) {
		transport.send(Response::Version(PROTOCOL_VERSION));

		while let Some(line) = transport.receive().await {
			if line.is_empty() && self.config.debug {
				info!("blank line, ending session");
				break;
			}
			let Some(matched) = self.table.lookup(&line) else {
				debug!("unsupported request: {}", line);
				transport.send(Response::UnsupportedRequest);
				continue;
			};
			debug!("<- {}", line);
			if let Err(e) = self.handle(transport, matched.verb, &matched.args).await {
				error!("{}", e);
				transport.send(Response::Error(e.to_string()));
			}
		}
		debug!("input drained, leaving dispatch loop");
	}

	async fn handle(
		&mut self,
		transport: &mut Transport,
		command: Command,
		args: &[&str],
	) -> ProtocolResult<()> {
		let response = match command {
			Command::InitRemote => self.init_remote(transport).await,
			Command::Prepare => self.prepare(transport).await?,
			Command::TransferStore => self.transfer(transport, Direction::Store, args).await?,
			Command::TransferRetrieve => self.transfer(transport, Direction::Retrieve, args).await?,
			Command::CheckPresent => {
				let key = single_key("CHECKPRESENT", args)?;
				match self.session.as_mut() {
					Some(session) => {
						let path = key_path(self.config.layout, transport, key).await?;
						session.check_present(key, &path).await
					}
					None => Response::CheckPresentUnknown(key.to_string(), NOT_PREPARED.to_string()),
				}
			}
			Command::Remove => {
				let key = single_key("REMOVE", args)?;
				match self.session.as_mut() {
					Some(session) => {
						let path = key_path(self.config.layout, transport, key).await?;
						session.remove(key, &path).await
					}
					None => Response::RemoveFailure(key.to_string(), NOT_PREPARED.to_string()),
				}
			}
			Command::Availability => Response::Availability,
		};
		transport.send(response);
		Ok(())
	}

	/// INITREMOTE: obtain tokens and hand them to git-annex
	async fn init_remote(&mut self, transport: &mut Transport) -> Response {
		match self.credentials.authorize().await.and_then(|token| token.encode()) {
			Ok(blob) => {
				transport.send(Response::SetCreds {
					setting: CREDS_SETTING.to_string(),
					user: CREDS_USER.to_string(),
					password: blob,
				});
				info!("remote initialized");
				Response::InitRemoteSuccess
			}
			Err(e) => Response::InitRemoteFailure(e.to_string()),
		}
	}

	/// PREPARE: credentials, store client, root folder
	async fn prepare(&mut self, transport: &mut Transport) -> ProtocolResult<Response> {
		let reply = transport.query(Response::GetCreds(CREDS_SETTING.to_string())).await?;
		let blob = parse_creds(&reply)?;
		let token = self.credentials.restore(&blob);
		let auth = Authenticator::new(token, self.credentials.oauth().clone());

		let store = match self.connector.connect(auth, self.config.debug) {
			Ok(store) => store,
			Err(e) => return Ok(Response::PrepareFailure(e.to_string())),
		};

		let reply = transport.query(Response::GetConfig(DIRECTORY_SETTING.to_string())).await?;
		let directory = self.config.root_directory(&parse_value("GETCONFIG", &reply)?);

		match Resolver::resolve_root(&*store, &directory).await {
			Ok(resolver) => {
				info!("prepared with root {} ({})", directory, resolver.root().id);
				self.session = Some(Session::new(store, resolver, self.config.chunk_size));
				Ok(Response::PrepareSuccess)
			}
			Err(e) => {
				warn!("cannot resolve root {}: {}", directory, e);
				Ok(Response::PrepareFailure(format!("root directory {}: {}", directory, e)))
			}
		}
	}

	/// TRANSFER STORE|RETRIEVE <key> <file>; the file name may contain spaces
	async fn transfer(
		&mut self,
		transport: &mut Transport,
		direction: Direction,
		args: &[&str],
	) -> ProtocolResult<Response> {
		let (key, local) = match args {
			[key, file @ ..] if !file.is_empty() => (*key, PathBuf::from(file.join(" "))),
			_ => return Err(bad_arguments(&format!("TRANSFER {}", direction), args)),
		};
		let Some(session) = self.session.as_mut() else {
			return Ok(Response::TransferFailure(direction, key.to_string(), NOT_PREPARED.to_string()));
		};

		let path = key_path(self.config.layout, transport, key).await?;
		let outbox = transport.outbox();
		Ok(match direction {
			Direction::Store => session.store(outbox, key, &path, &local).await,
			Direction::Retrieve => session.retrieve(outbox, key, &path, &local).await,
		})
	}
}

/// Where a key lives, asking the controller for its DIRHASH in hashed layout
async fn key_path(layout: Layout, transport: &mut Transport, key: &str) -> ProtocolResult<RemotePath> {
	match layout {
		Layout::Flat => Ok(RemotePath::flat(key)),
		Layout::Hashed => {
			let reply = transport.query(Response::DirHash(key.to_string())).await?;
			Ok(RemotePath::hashed(key, &parse_value("DIRHASH", &reply)?))
		}
	}
}

fn single_key<'a>(command: &str, args: &[&'a str]) -> ProtocolResult<&'a str> {
	match args {
		[key] => Ok(*key),
		_ => Err(bad_arguments(command, args)),
	}
}

fn bad_arguments(command: &str, args: &[&str]) -> ProtocolError {
	ProtocolError::BadArguments {
		command: command.to_string(),
		args: args.iter().map(|a| a.to_string()).collect(),
	}
}

/// Run a special remote over `input`/`output` until the input ends
pub async fn serve<R, W>(
	config: Config,
	connector: Arc<dyn StoreConnector>,
	input: R,
	output: W,
) -> io::Result<()>
where
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	SpecialRemote::new(config, connector).serve(input, output).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_single_key_rejects_extra_args() {
		assert_eq!(single_key("REMOVE", &["k1"]).unwrap(), "k1");
		let err = single_key("REMOVE", &["k1", "extra"]).unwrap_err();
		assert!(matches!(err, ProtocolError::BadArguments { .. }));
		assert!(single_key("CHECKPRESENT", &[]).is_err());
	}
}

// vim: ts=4
