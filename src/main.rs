use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use gdrive_annex::config::{AuthCode, Backend, Config, Layout};
use gdrive_annex::logging::*;
use gdrive_annex::store::drive::DriveConnector;
use gdrive_annex::store::memory::MemoryConnector;
use gdrive_annex::store::StoreConnector;

fn build_config() -> Result<Config, Box<dyn Error>> {
	let matches = Command::new("git-annex-remote-gdrive")
		.version(env!("CARGO_PKG_VERSION"))
		.about("git-annex special remote storing content in Google Drive")
		.arg(
			Arg::new("debug")
				.long("debug")
				.action(ArgAction::SetTrue)
				.help("Verbose logging, wire dumps, blank line ends the session"),
		)
		.arg(
			Arg::new("oauth-code")
				.long("oauth-code")
				.value_name("CODE")
				.help("Authorization code from a manual authorization, or \"manual\""),
		)
		.arg(
			Arg::new("layout")
				.long("layout")
				.value_name("LAYOUT")
				.help("Key layout below the root directory: flat or hashed"),
		)
		.arg(
			Arg::new("backend")
				.long("backend")
				.value_name("BACKEND")
				.help("Object store: drive or memory"),
		)
		.arg(
			Arg::new("chunk-size")
				.long("chunk-size")
				.value_name("BYTES")
				.value_parser(clap::value_parser!(usize))
				.help("Transfer chunk size"),
		)
		.arg(
			Arg::new("auth-timeout")
				.long("auth-timeout")
				.value_name("SECONDS")
				.value_parser(clap::value_parser!(u64))
				.help("How long INITREMOTE waits for the browser redirect"),
		)
		.get_matches();

	let mut config = Config::from_env()?;
	if matches.get_flag("debug") {
		config.debug = true;
	}
	if let Some(code) = matches.get_one::<String>("oauth-code") {
		config.auth_code = AuthCode::parse(code);
	}
	if let Some(layout) = matches.get_one::<String>("layout") {
		config.layout = layout.parse::<Layout>()?;
	}
	if let Some(backend) = matches.get_one::<String>("backend") {
		config.backend = backend.parse::<Backend>()?;
	}
	if let Some(size) = matches.get_one::<usize>("chunk-size") {
		if *size == 0 {
			return Err("chunk size must be positive".into());
		}
		config.chunk_size = *size;
	}
	if let Some(secs) = matches.get_one::<u64>("auth-timeout") {
		config.callback_timeout = Duration::from_secs(*secs);
	}
	Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
	let config = build_config()?;
	init_tracing(config.debug);
	debug!("starting with {:?} layout, {:?} backend", config.layout, config.backend);

	let connector: Arc<dyn StoreConnector> = match config.backend {
		Backend::Drive => Arc::new(DriveConnector::new()),
		Backend::Memory => Arc::new(MemoryConnector::default()),
	};

	let runtime = tokio::runtime::Runtime::new()?;
	let result = runtime.block_on(gdrive_annex::serve(
		config,
		connector,
		tokio::io::stdin(),
		tokio::io::stdout(),
	));
	// The stdin reader may still be parked in a blocking read after a debug-mode exit
	runtime.shutdown_background();

	if let Err(e) = result {
		error!("{}", e);
		return Err(e.into());
	}
	Ok(())
}

// vim: ts=4
