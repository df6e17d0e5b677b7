//! Best-effort browser launch for the authorization URL

use std::io;

use crate::logging::*;

/// Open `url` with the desktop's default handler without waiting for it
pub fn open_url(url: &str) -> io::Result<()> {
	debug!("opening authorization URL in browser");
	open::that_detached(url).map_err(|e| {
		debug!("browser launch failed: {}", e);
		io::Error::new(e.kind(), "Error opening URL in browser")
	})
}

// vim: ts=4
