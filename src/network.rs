//! `Network`: a named endpoint spec that owns a fleet of [`Bot`]s and the
//! shared [`MessageBuffer`] they drain for shareable outbound traffic.
//!
//! Grounded on `examples/original_source/uniko.py`'s `Server` class
//! (`is_one_of_us`, `get_nickname`, the per-server packet buffer), extended
//! to a multi-bot fleet per spec §3/§4.4.

use std::sync::Arc;

use parking_lot::Mutex;
use slirc_proto::{casemap::irc_to_lower, ChannelExt};

use crate::bot::Bot;
use crate::buffer::MessageBuffer;
use crate::encoding::TextCodec;
use crate::message::{Command, Message};

/// A named IRC network: its bot fleet and the shared buffer they all drain.
pub struct Network {
    pub name: String,
    pub encoding: TextCodec,
    pub bots: Vec<Bot>,
    pub shared: Arc<Mutex<MessageBuffer>>,
    pub bot_channel_limit: usize,
}

impl Network {
    pub fn new(name: String, encoding: TextCodec, buffer_timeout: f64, bot_channel_limit: usize) -> Self {
        Self {
            name,
            encoding,
            bots: Vec::new(),
            shared: Arc::new(Mutex::new(MessageBuffer::new(buffer_timeout))),
            bot_channel_limit,
        }
    }

    /// Add a bot to this network's fleet, permanently attaching the
    /// network-shared buffer (distinct from the per-pipe buffers a `Pipe`
    /// attaches and detaches across its own lifecycle).
    pub fn add_bot(&mut self, mut bot: Bot) {
        bot.attach(self.shared.clone());
        self.bots.push(bot);
    }

    /// Deposit a message for this network's fleet to send (spec §4.4).
    ///
    /// `privmsg`/`privnotice` addressed to a channel with no bot currently
    /// joined are pre-empted by a synthetic `join` at `timestamp = 0.0`, so
    /// whichever bot picks it up first joins before the relayed line can go
    /// out. The original message then always lands in the shared buffer
    /// regardless of its own bot-specific/shareable classification — a
    /// bot-specific channel privmsg is still safe there because
    /// `Bot::flood_control`'s step 2 refuses to pop it from a bot that
    /// isn't a member of the target channel.
    pub fn push(&mut self, message: Message) {
        if matches!(message.command, Command::Privmsg | Command::Privnotice) {
            if let Some(target) = message.arguments.first() {
                if target.as_str().is_channel_name() && !self.has_bot_in(target) {
                    self.shared.lock().push(Message::join_now(target, None));
                }
            }
        }
        self.shared.lock().push(message);
    }

    fn has_bot_in(&self, channel: &str) -> bool {
        self.bots.iter().any(|b| b.conn.channels.is_member(channel, b.nickname()))
    }

    /// Bot indices currently joined to `channel`, in fleet (insertion) order.
    pub fn bots_in(&self, channel: &str) -> Vec<usize> {
        self.bots
            .iter()
            .enumerate()
            .filter(|(_, b)| b.conn.channels.is_member(channel, b.nickname()))
            .map(|(i, _)| i)
            .collect()
    }

    /// The deduplication primitive (spec §4.4): `true` iff `bot_index`
    /// sorts first, by insertion order, among this network's bots currently
    /// joined to `channel`.
    pub fn is_listening_bot(&self, bot_index: usize, channel: &str) -> bool {
        if !channel.is_channel_name() {
            return false;
        }
        let Some(bot) = self.bots.get(bot_index) else {
            return false;
        };
        if !bot.conn.channels.is_member(channel, bot.nickname()) {
            return false;
        }
        self.bots_in(channel).first() == Some(&bot_index)
    }

    /// Any bot of this network currently joined to `channel` and holding
    /// operator status there.
    pub fn get_oper(&self, channel: &str) -> Option<usize> {
        self.bots.iter().position(|b| {
            b.conn.channels.is_member(channel, b.nickname()) && b.conn.channels.is_oper(channel, b.nickname())
        })
    }

    /// `true` iff `nick` (as seen on the wire) names one of this network's
    /// own bots — used for self-echo suppression (spec §4.6), independent
    /// of `is_listening_bot`.
    pub fn owns_nick(&self, nick: &str) -> bool {
        let folded = irc_to_lower(nick);
        self.bots.iter().any(|b| irc_to_lower(b.nickname()) == folded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkConfig, ServerAddr};
    use crate::conn::Conn;
    use std::time::Duration;

    fn config() -> NetworkConfig {
        NetworkConfig {
            name: "a".into(),
            server: vec![ServerAddr {
                host: "irc.a.example".into(),
                port: 6667,
                password: None,
            }],
            encoding: "utf-8".into(),
            use_ssl: false,
            buffer_timeout: crate::buffer::DEFAULT_TIMEOUT,
        }
    }

    fn bot(nick: &str) -> Bot {
        let conn = Conn::new(&config(), nick.into(), "bridge".into(), "Bridge".into());
        Bot::new(conn, Duration::from_secs(600))
    }

    #[test]
    fn listening_bot_is_the_first_joined_by_insertion_order() {
        let mut net = Network::new("a".into(), TextCodec::default(), 10.0, 20);
        net.add_bot(bot("one"));
        net.add_bot(bot("two"));
        net.bots[0].conn.channels.join("#x", "one");
        net.bots[1].conn.channels.join("#x", "two");
        assert!(net.is_listening_bot(0, "#x"));
        assert!(!net.is_listening_bot(1, "#x"));
    }

    #[test]
    fn push_privmsg_to_unjoined_channel_preempts_a_join() {
        let mut net = Network::new("a".into(), TextCodec::default(), 10.0, 20);
        net.add_bot(bot("one"));
        net.push(Message::new(Command::Privmsg, vec!["#x".into(), "hi".into()]));
        let shared = net.shared.lock();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn push_skips_join_preemption_when_a_bot_is_already_joined() {
        let mut net = Network::new("a".into(), TextCodec::default(), 10.0, 20);
        net.add_bot(bot("one"));
        net.bots[0].conn.channels.join("#x", "one");
        net.push(Message::new(Command::Privmsg, vec!["#x".into(), "hi".into()]));
        assert_eq!(net.shared.lock().len(), 1);
    }

    #[test]
    fn owns_nick_is_casefold_insensitive() {
        let mut net = Network::new("a".into(), TextCodec::default(), 10.0, 20);
        net.add_bot(bot("Bridge[One]"));
        assert!(net.owns_nick("BRIDGE{one}"));
        assert!(!net.owns_nick("someone-else"));
    }
}
