//! Outbound bridge messages and their bot-specific/shareable classification.

use std::fmt;

use slirc_proto::ChannelExt;

/// The closed set of commands a [`Message`] can carry.
///
/// This mirrors the subset of IRC commands the bridge core actually issues;
/// mapping onto the wire protocol happens in [`crate::conn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Join,
    Mode,
    Privmsg,
    Privnotice,
    Topic,
    Who,
    Whois,
    Part,
    Quit,
    Action,
}

impl Command {
    /// Lowercase event-type name, as used by formatters and config
    /// (`always`/`never` event-type lists).
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Mode => "mode",
            Command::Privmsg => "privmsg",
            Command::Privnotice => "privnotice",
            Command::Topic => "topic",
            Command::Who => "who",
            Command::Whois => "whois",
            Command::Part => "part",
            Command::Quit => "quit",
            Command::Action => "action",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound IRC command with a creation timestamp.
///
/// `timestamp` is seconds since the Unix epoch. A timestamp of exactly `0.0`
/// is a sentinel forcing the message to the head of a [`crate::buffer::MessageBuffer`]
/// (see `Network::push`'s JOIN pre-emption).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub command: Command,
    pub arguments: Vec<String>,
    pub timestamp: f64,
}

impl Message {
    /// Construct a message timestamped at the current wall-clock time.
    pub fn new(command: Command, arguments: Vec<String>) -> Self {
        Self {
            command,
            arguments,
            timestamp: now_secs(),
        }
    }

    /// Construct a message with an explicit timestamp (used for the `0.0`
    /// head-of-queue sentinel and for synthetic purge notices).
    pub fn with_timestamp(command: Command, arguments: Vec<String>, timestamp: f64) -> Self {
        Self {
            command,
            arguments,
            timestamp,
        }
    }

    /// A `join(channel, password?)` message, forced to the head of whatever
    /// buffer it lands in.
    pub fn join_now(channel: &str, password: Option<&str>) -> Self {
        let mut args = vec![channel.to_string()];
        if let Some(p) = password {
            args.push(p.to_string());
        }
        Self::with_timestamp(Command::Join, args, 0.0)
    }

    /// `true` iff this message must be sent by a specific Bot connection
    /// rather than any Bot of the target Network (spec §3).
    pub fn is_bot_specific(&self) -> bool {
        match self.command {
            Command::Join | Command::Mode => true,
            Command::Privmsg | Command::Privnotice => self
                .arguments
                .first()
                .is_some_and(|target| target.as_str().is_channel_name()),
            _ => false,
        }
    }

    /// A system notice is a `privmsg`/`privnotice` whose text begins with
    /// `--`; purge does not count these against the "skipped N lines" tally
    /// (it would otherwise re-count its own synthetic notices).
    pub fn is_system_notice(&self) -> bool {
        matches!(self.command, Command::Privmsg | Command::Privnotice)
            && self
                .arguments
                .get(1)
                .is_some_and(|text| text.starts_with("--"))
    }
}

pub(crate) fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_mode_are_bot_specific() {
        let m = Message::new(Command::Join, vec!["#x".into()]);
        assert!(m.is_bot_specific());
        let m = Message::new(Command::Mode, vec!["#x".into(), "+o".into(), "nick".into()]);
        assert!(m.is_bot_specific());
    }

    #[test]
    fn privmsg_to_channel_is_bot_specific() {
        let m = Message::new(Command::Privmsg, vec!["#x".into(), "hi".into()]);
        assert!(m.is_bot_specific());
    }

    #[test]
    fn privmsg_to_nick_is_shareable() {
        let m = Message::new(Command::Privmsg, vec!["alice".into(), "hi".into()]);
        assert!(!m.is_bot_specific());
    }

    #[test]
    fn who_whois_part_quit_are_shareable() {
        for cmd in [Command::Who, Command::Whois, Command::Part, Command::Quit] {
            let m = Message::new(cmd, vec![]);
            assert!(!m.is_bot_specific());
        }
    }

    #[test]
    fn join_now_sorts_to_head() {
        let m = Message::join_now("#x", None);
        assert_eq!(m.timestamp, 0.0);
        assert_eq!(m.command, Command::Join);
    }

    #[test]
    fn system_notice_detection() {
        let m = Message::new(
            Command::Privmsg,
            vec!["#x".into(), "-- Message lags over 10.000000 seconds. Skipping 3 line(s)..".into()],
        );
        assert!(m.is_system_notice());
        let m = Message::new(Command::Privmsg, vec!["#x".into(), "hello".into()]);
        assert!(!m.is_system_notice());
    }
}
