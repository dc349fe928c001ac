//! `Bot`: one IRC connection on a [`crate::network::Network`], its private
//! buffer, attached buffers, and flood control.

use std::time::{Duration, Instant};

use slirc_proto::ChannelExt;

use crate::buffer::MessageBuffer;
use crate::conn::{Conn, InboundEvent};
use crate::error::SendError;
use crate::message::{Command, Message};

/// `d = min(4, 0.5 + len(text)/35)` for `privmsg`, else `min(4, 2)` (§4.3).
fn send_delay(message: &Message) -> Duration {
    let secs = match message.command {
        Command::Privmsg => {
            let len = message.arguments.get(1).map(String::len).unwrap_or(0);
            (0.5 + len as f64 / 35.0).min(4.0)
        }
        _ => 2.0_f64.min(4.0),
    };
    Duration::from_secs_f64(secs)
}

/// An identifier for one of a Bot's attached (pipe-owned) buffers.
pub type AttachedBufferId = usize;

struct Attached {
    id: AttachedBufferId,
    buffer: std::sync::Arc<parking_lot::Mutex<MessageBuffer>>,
}

/// One Bot's connection, private buffer, and attached external buffers.
pub struct Bot {
    pub conn: Conn,
    pub private: MessageBuffer,
    attached: Vec<Attached>,
    round_robin_cursor: usize,
    next_attach_id: AttachedBufferId,
    last_send: Option<Instant>,
    reconnect_interval: Duration,
    last_disconnect: Option<Instant>,
}

pub enum TickOutcome {
    Idle,
    Sent,
    Reconnecting,
}

impl Bot {
    pub fn new(conn: Conn, reconnect_interval: Duration) -> Self {
        Self {
            conn,
            private: MessageBuffer::with_default_timeout(),
            attached: Vec::new(),
            round_robin_cursor: 0,
            next_attach_id: 0,
            last_send: None,
            reconnect_interval,
            last_disconnect: None,
        }
    }

    pub fn nickname(&self) -> &str {
        self.conn.nickname()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Register a pipe-owned buffer as drainable by this Bot; re-seeds the
    /// round-robin cursor since membership of the attached set changed.
    pub fn attach(&mut self, buffer: std::sync::Arc<parking_lot::Mutex<MessageBuffer>>) -> AttachedBufferId {
        let id = self.next_attach_id;
        self.next_attach_id += 1;
        self.attached.push(Attached { id, buffer });
        self.round_robin_cursor = 0;
        id
    }

    pub fn detach(&mut self, id: AttachedBufferId) {
        self.attached.retain(|a| a.id != id);
        self.round_robin_cursor = 0;
    }

    pub fn channel_count(&self) -> usize {
        self.conn.channels.channels().count()
    }

    /// Drain inbound I/O with a bounded per-tick budget (spec §5(i)).
    pub async fn poll_inbound(&mut self, budget: Duration) -> Vec<InboundEvent> {
        self.conn.poll(budget).await
    }

    /// Apply a membership-mutating event to this Bot's channel table. Must
    /// be called only after any `nick`/`quit` observers (e.g. the owning
    /// Pipe) have seen the event against the *prior* state (spec §4.5's
    /// handler-priority note).
    pub fn apply_membership(&mut self, event: &InboundEvent) {
        self.conn.apply_membership(event);
    }

    /// Step 1 of §4.3: choose which buffer to drain from, if any.
    fn select_source(&mut self) -> Option<usize> {
        if !self.private.is_empty() {
            return Some(usize::MAX); // sentinel for "private"
        }
        if self.attached.is_empty() {
            return None;
        }
        for offset in 0..self.attached.len() {
            let idx = (self.round_robin_cursor + offset) % self.attached.len();
            if !self.attached[idx].buffer.lock().is_empty() {
                self.round_robin_cursor = (idx + 1) % self.attached.len();
                return Some(idx);
            }
        }
        None
    }

    /// Run one flood-control step (§4.3). Reconnects are signalled via
    /// `TickOutcome::Reconnecting` and performed by the caller (the
    /// Supervisor owns retry/backoff policy across all Bots).
    pub async fn flood_control(&mut self) -> TickOutcome {
        if !self.is_connected() {
            if self.should_attempt_reconnect() {
                return TickOutcome::Reconnecting;
            }
            return TickOutcome::Idle;
        }

        let Some(source) = self.select_source() else {
            return TickOutcome::Idle;
        };

        let peeked = if source == usize::MAX {
            self.private.peek().cloned()
        } else {
            self.attached[source].buffer.lock().peek().cloned()
        };
        let Some(message) = peeked else {
            return TickOutcome::Idle;
        };

        if message.command == Command::Privmsg {
            if let Some(target) = message.arguments.first() {
                if target.as_str().is_channel_name() && !self.conn.channels.is_member(target, self.nickname())
                {
                    return TickOutcome::Idle;
                }
            }
        }

        let delay = send_delay(&message);
        if let Some(last) = self.last_send {
            if last.elapsed() < delay {
                return TickOutcome::Idle;
            }
        }

        match self.conn.send(&message).await {
            Ok(()) => {
                self.pop_matching(source, &message);
                self.last_send = Some(Instant::now());
                TickOutcome::Sent
            }
            Err(err) => {
                self.pop_matching(source, &message);
                self.push_back(source, message);
                if matches!(err, SendError::NotConnected) {
                    self.last_disconnect = Some(Instant::now());
                    TickOutcome::Reconnecting
                } else {
                    TickOutcome::Idle
                }
            }
        }
    }

    /// The `test` config mode's drain step (spec §6: "`test` mode logs each
    /// outbound Message instead of sending, except `join` which is
    /// suppressed"). Bypasses the connection entirely — the per-bot pacing
    /// delay still applies, but no connection state is required or mutated,
    /// so this runs identically whether or not `is_connected()`.
    pub fn drain_for_log(&mut self) -> Option<Message> {
        let source = self.select_source()?;
        let peeked = if source == usize::MAX {
            self.private.peek().cloned()
        } else {
            self.attached[source].buffer.lock().peek().cloned()
        };
        let message = peeked?;

        if message.command == Command::Join {
            self.pop_matching(source, &message);
            return None;
        }

        let delay = send_delay(&message);
        if let Some(last) = self.last_send {
            if last.elapsed() < delay {
                return None;
            }
        }

        self.pop_matching(source, &message);
        self.last_send = Some(Instant::now());
        Some(message)
    }

    fn pop_matching(&mut self, source: usize, expected: &Message) {
        if source == usize::MAX {
            let popped = self.private.pop(crate::message::now_secs());
            debug_assert!(popped.as_ref() == Some(expected) || popped.is_none());
        } else {
            let mut buffer = self.attached[source].buffer.lock();
            let popped = buffer.pop(crate::message::now_secs());
            debug_assert!(popped.as_ref() == Some(expected) || popped.is_none());
        }
    }

    fn push_back(&mut self, source: usize, message: Message) {
        if source == usize::MAX {
            self.private.push(message);
        } else {
            self.attached[source].buffer.lock().push(message);
        }
    }

    fn should_attempt_reconnect(&self) -> bool {
        match self.last_disconnect {
            None => true,
            Some(at) => at.elapsed() >= self.reconnect_interval,
        }
    }

    pub fn mark_reconnect_attempted(&mut self) {
        self.last_disconnect = Some(Instant::now());
    }

    pub fn mark_connected(&mut self) {
        self.last_disconnect = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_delay_formula_matches_spec() {
        let short = Message::new(Command::Privmsg, vec!["#x".into(), "hello".into()]);
        let delay = send_delay(&short);
        assert!((delay.as_secs_f64() - 0.5 - 5.0 / 35.0).abs() < 1e-9);

        let long_text = "x".repeat(400);
        let long = Message::new(Command::Privmsg, vec!["#x".into(), long_text]);
        assert_eq!(send_delay(&long).as_secs_f64(), 4.0);

        let join = Message::new(Command::Join, vec!["#x".into()]);
        assert_eq!(send_delay(&join).as_secs_f64(), 2.0);
    }

    fn test_bot() -> Bot {
        let network = crate::config::NetworkConfig {
            name: "a".into(),
            server: vec![crate::config::ServerAddr {
                host: "irc.a.example".into(),
                port: 6667,
                password: None,
            }],
            encoding: "utf-8".into(),
            use_ssl: false,
            buffer_timeout: crate::buffer::DEFAULT_TIMEOUT,
        };
        let conn = Conn::new(&network, "bridge".into(), "bridge".into(), "Bridge".into());
        Bot::new(conn, Duration::from_secs(600))
    }

    #[test]
    fn drain_for_log_suppresses_joins() {
        let mut bot = test_bot();
        bot.private.push(Message::join_now("#x", None));
        assert!(bot.drain_for_log().is_none());
        assert!(bot.private.is_empty());
    }

    #[test]
    fn drain_for_log_returns_non_join_messages() {
        let mut bot = test_bot();
        bot.private.push(Message::new(Command::Privmsg, vec!["#x".into(), "hi".into()]));
        let drained = bot.drain_for_log().expect("message should drain");
        assert_eq!(drained.command, Command::Privmsg);
        assert!(bot.private.is_empty());
    }
}
