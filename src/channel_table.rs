//! Per-connection channel membership tracking.
//!
//! `slirc-proto` parses and encodes `MODE`/`JOIN`/`PART`/`353 NAMES` traffic
//! but, being a protocol/codec library rather than a stateful client, keeps
//! no notion of "who is in what channel with what status". A `Conn` needs
//! that to answer "is this nick opped in this channel" for the `\aop`
//! private command (spec §4.6), so it's supplied here.

use std::collections::{HashMap, HashSet};

use slirc_proto::{casemap::irc_to_lower, ChannelMode};

/// Per-user status within a single channel, ordered low-to-high so derived
/// `Ord` gives the expected "highest status wins" comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    None,
    Voice,
    Halfop,
    Oper,
}

impl Status {
    fn from_mode(mode: &ChannelMode) -> Option<Self> {
        match mode {
            ChannelMode::Voice => Some(Status::Voice),
            ChannelMode::Halfop => Some(Status::Halfop),
            ChannelMode::Oper => Some(Status::Oper),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Channel {
    /// casefolded nick -> status
    members: HashMap<String, Status>,
}

/// Tracks channel membership and per-user status for a single IRC
/// connection, keyed by IRC-casefolded channel and nick names.
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: HashMap<String, Channel>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(s: &str) -> String {
        irc_to_lower(s)
    }

    /// Record that `nick` has joined `channel` with no status.
    pub fn join(&mut self, channel: &str, nick: &str) {
        self.channels
            .entry(Self::key(channel))
            .or_default()
            .members
            .insert(Self::key(nick), Status::None);
    }

    /// Remove `nick` from `channel` (PART, KICK, or QUIT-driven removal).
    pub fn part(&mut self, channel: &str, nick: &str) {
        if let Some(chan) = self.channels.get_mut(&Self::key(channel)) {
            chan.members.remove(&Self::key(nick));
        }
    }

    /// Remove `nick` from every channel (QUIT).
    pub fn quit(&mut self, nick: &str) {
        let key = Self::key(nick);
        for chan in self.channels.values_mut() {
            chan.members.remove(&key);
        }
    }

    /// Rename a member across every channel they're in (NICK).
    pub fn rename(&mut self, old_nick: &str, new_nick: &str) {
        let old_key = Self::key(old_nick);
        let new_key = Self::key(new_nick);
        for chan in self.channels.values_mut() {
            if let Some(status) = chan.members.remove(&old_key) {
                chan.members.insert(new_key.clone(), status);
            }
        }
    }

    /// Apply a `+`/`-` channel status mode targeting `nick` (e.g.
    /// `MODE #chan +o nick`). Non-status modes are ignored.
    pub fn apply_mode(&mut self, channel: &str, nick: &str, mode: &ChannelMode, adding: bool) {
        let Some(status) = Status::from_mode(mode) else {
            return;
        };
        let chan = self.channels.entry(Self::key(channel)).or_default();
        let entry = chan.members.entry(Self::key(nick)).or_insert(Status::None);
        *entry = if adding { status } else { Status::None };
    }

    /// Remove bookkeeping for a channel the connection has left entirely
    /// (self-PART or self-KICK).
    pub fn forget_channel(&mut self, channel: &str) {
        self.channels.remove(&Self::key(channel));
    }

    pub fn is_member(&self, channel: &str, nick: &str) -> bool {
        self.channels
            .get(&Self::key(channel))
            .is_some_and(|c| c.members.contains_key(&Self::key(nick)))
    }

    pub fn is_oper(&self, channel: &str, nick: &str) -> bool {
        self.status(channel, nick) == Status::Oper
    }

    pub fn is_voiced(&self, channel: &str, nick: &str) -> bool {
        self.status(channel, nick) >= Status::Voice
    }

    pub fn status(&self, channel: &str, nick: &str) -> Status {
        self.channels
            .get(&Self::key(channel))
            .and_then(|c| c.members.get(&Self::key(nick)))
            .copied()
            .unwrap_or(Status::None)
    }

    /// Casefolded nicks currently tracked as members of `channel`.
    pub fn members(&self, channel: &str) -> HashSet<String> {
        self.channels
            .get(&Self::key(channel))
            .map(|c| c.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_then_part_clears_membership() {
        let mut table = ChannelTable::new();
        table.join("#rust", "Alice");
        assert!(table.is_member("#RUST", "alice"));
        table.part("#rust", "alice");
        assert!(!table.is_member("#rust", "Alice"));
    }

    #[test]
    fn mode_grants_and_revokes_oper_status() {
        let mut table = ChannelTable::new();
        table.join("#rust", "alice");
        table.apply_mode("#rust", "alice", &ChannelMode::Oper, true);
        assert!(table.is_oper("#rust", "alice"));
        table.apply_mode("#rust", "alice", &ChannelMode::Oper, false);
        assert!(!table.is_oper("#rust", "alice"));
    }

    #[test]
    fn voice_counts_toward_is_voiced_but_not_is_oper() {
        let mut table = ChannelTable::new();
        table.join("#rust", "bob");
        table.apply_mode("#rust", "bob", &ChannelMode::Voice, true);
        assert!(table.is_voiced("#rust", "bob"));
        assert!(!table.is_oper("#rust", "bob"));
    }

    #[test]
    fn quit_removes_nick_from_every_channel() {
        let mut table = ChannelTable::new();
        table.join("#a", "carl");
        table.join("#b", "carl");
        table.quit("carl");
        assert!(!table.is_member("#a", "carl"));
        assert!(!table.is_member("#b", "carl"));
    }

    #[test]
    fn rename_preserves_status() {
        let mut table = ChannelTable::new();
        table.join("#rust", "dave");
        table.apply_mode("#rust", "dave", &ChannelMode::Oper, true);
        table.rename("dave", "dave2");
        assert!(!table.is_member("#rust", "dave"));
        assert!(table.is_oper("#rust", "dave2"));
    }

    #[test]
    fn casefold_treats_brackets_as_equivalent() {
        let mut table = ChannelTable::new();
        table.join("#rust", "nick[one]");
        assert!(table.is_member("#rust", "NICK{ONE}"));
    }
}
