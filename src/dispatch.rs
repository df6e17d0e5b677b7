//! Command dispatch table
//!
//! Incoming lines are split on single spaces and matched against verb
//! patterns such as `TRANSFER STORE`. A pattern matches when its tokens are a
//! prefix of the line's tokens; the remaining tokens become the arguments.
//!
//! Patterns are kept ordered longest first, so when one pattern is a prefix
//! of another the more specific one always wins, independent of registration
//! order. Registering the same pattern twice replaces the earlier entry.

/// Commands the remote understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	InitRemote,
	Prepare,
	TransferStore,
	TransferRetrieve,
	CheckPresent,
	Remove,
	Availability,
}

/// Pattern table for the special remote protocol
pub fn commands() -> CommandTable<Command> {
	let mut table = CommandTable::new();
	table.register("INITREMOTE", Command::InitRemote);
	table.register("PREPARE", Command::Prepare);
	table.register("TRANSFER STORE", Command::TransferStore);
	table.register("TRANSFER RETRIEVE", Command::TransferRetrieve);
	table.register("CHECKPRESENT", Command::CheckPresent);
	table.register("REMOVE", Command::Remove);
	table.register("AVAILABILITY", Command::Availability);
	table
}

/// A matched line: the verb and the tokens after it
#[derive(Debug, PartialEq, Eq)]
pub struct Match<'a, V> {
	pub verb: V,
	pub args: Vec<&'a str>,
}

/// Ordered (pattern, verb) pairs, most specific first
#[derive(Debug, Clone)]
pub struct CommandTable<V> {
	entries: Vec<(Vec<String>, V)>,
}

impl<V: Copy> CommandTable<V> {
	/// Create an empty table
	pub fn new() -> Self {
		Self { entries: Vec::new() }
	}

	/// Register a space separated pattern, returning the verb it replaced
	pub fn register(&mut self, pattern: &str, verb: V) -> Option<V> {
		let tokens: Vec<String> = pattern.split(' ').map(str::to_string).collect();
		if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == tokens) {
			return Some(std::mem::replace(&mut entry.1, verb));
		}
		let pos = self
			.entries
			.iter()
			.position(|(existing, _)| existing.len() < tokens.len())
			.unwrap_or(self.entries.len());
		self.entries.insert(pos, (tokens, verb));
		None
	}

	/// Find the most specific pattern matching the line
	pub fn lookup<'a>(&self, line: &'a str) -> Option<Match<'a, V>> {
		let parts: Vec<&'a str> = line.split(' ').collect();
		self.entries.iter().find_map(|(pattern, verb)| {
			if pattern.len() > parts.len() {
				return None;
			}
			let matches = pattern.iter().zip(&parts).all(|(want, got)| want == got);
			matches.then(|| Match { verb: *verb, args: parts[pattern.len()..].to_vec() })
		})
	}
}

impl<V: Copy> Default for CommandTable<V> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_multi_word_verb_and_args() {
		let table = commands();
		let m = table.lookup("TRANSFER STORE SHA256E-s10--abc /tmp/my file").unwrap();
		assert_eq!(m.verb, Command::TransferStore);
		assert_eq!(m.args, vec!["SHA256E-s10--abc", "/tmp/my", "file"]);

		let m = table.lookup("TRANSFER RETRIEVE k /tmp/x").unwrap();
		assert_eq!(m.verb, Command::TransferRetrieve);
	}

	#[test]
	fn test_bare_verbs() {
		let table = commands();
		assert_eq!(table.lookup("PREPARE").unwrap().verb, Command::Prepare);
		assert!(table.lookup("PREPARE").unwrap().args.is_empty());
		assert_eq!(table.lookup("AVAILABILITY").unwrap().verb, Command::Availability);
	}

	#[test]
	fn test_unmatched_lines() {
		let table = commands();
		assert!(table.lookup("GETCOST").is_none());
		assert!(table.lookup("TRANSFER").is_none());
		assert!(table.lookup("TRANSFER SIDEWAYS k f").is_none());
		assert!(table.lookup("prepare").is_none());
		assert!(table.lookup("").is_none());
	}

	#[test]
	fn test_longest_pattern_wins_regardless_of_order() {
		let mut table = CommandTable::new();
		table.register("TRANSFER", 1);
		table.register("TRANSFER STORE", 2);
		assert_eq!(table.lookup("TRANSFER STORE k f").unwrap().verb, 2);
		assert_eq!(table.lookup("TRANSFER RETRIEVE k f").unwrap().verb, 1);

		let mut reversed = CommandTable::new();
		reversed.register("TRANSFER STORE", 2);
		reversed.register("TRANSFER", 1);
		assert_eq!(reversed.lookup("TRANSFER STORE k f").unwrap().verb, 2);
	}

	#[test]
	fn test_reregistering_replaces() {
		let mut table = CommandTable::new();
		assert_eq!(table.register("REMOVE", 1), None);
		assert_eq!(table.register("REMOVE", 2), Some(1));
		assert_eq!(table.lookup("REMOVE k").unwrap().verb, 2);
	}
}

// vim: ts=4
