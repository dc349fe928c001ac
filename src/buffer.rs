//! Time-ordered, staleness-purging outbound message queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;

use crate::message::{Command, Message};

/// Default staleness timeout, in seconds (spec §3).
pub const DEFAULT_TIMEOUT: f64 = 10.0;

/// A heap entry: ordered by `(timestamp, seq)` ascending so that messages
/// pushed with equal timestamps come out in push order (spec §3: "ties
/// broken arbitrarily but stably within a buffer").
#[derive(Debug, Clone)]
struct Entry {
    timestamp: f64,
    seq: u64,
    message: Message,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .partial_cmp(&other.timestamp)
            .unwrap_or(Ordering::Equal)
            .then(self.seq.cmp(&other.seq))
    }
}

/// A min-heap of [`Message`]s keyed by timestamp, bounded by a staleness
/// timeout. See spec §4.2.
#[derive(Debug)]
pub struct MessageBuffer {
    heap: BinaryHeap<std::cmp::Reverse<Entry>>,
    timeout: f64,
    disabled: bool,
    next_seq: u64,
}

impl MessageBuffer {
    pub fn new(timeout: f64) -> Self {
        Self {
            heap: BinaryHeap::new(),
            timeout,
            disabled: false,
            next_seq: 0,
        }
    }

    pub fn with_default_timeout() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert `message` by timestamp. Silently dropped if the buffer is
    /// disabled.
    pub fn push(&mut self, message: Message) {
        if self.disabled {
            return;
        }
        let entry = Entry {
            timestamp: message.timestamp,
            seq: self.next_seq,
            message,
        };
        self.next_seq += 1;
        self.heap.push(std::cmp::Reverse(entry));
    }

    /// Return the head without removing it.
    pub fn peek(&self) -> Option<&Message> {
        self.heap.peek().map(|e| &e.0.message)
    }

    /// `true` iff any queued message carries `command`.
    pub fn has_buffer_by_command(&self, command: Command) -> bool {
        self.heap.iter().any(|e| e.0.message.command == command)
    }

    /// `true` iff a `join` targeting `channel` is already queued (used by
    /// weight sync to avoid over-issuing joins for bots with one pending).
    pub fn has_pending_join(&self, channel: &str) -> bool {
        self.heap.iter().any(|e| {
            e.0.message.command == Command::Join
                && e.0.message.arguments.first().is_some_and(|c| c == channel)
        })
    }

    /// If the head is stale, purge first; then unconditionally remove and
    /// return the new head (which may now be a synthesized "skipped" notice,
    /// or the exempted stale `join` that blocked the purge).
    pub fn pop(&mut self, now: f64) -> Option<Message> {
        if let Some(head) = self.peek() {
            if now - head.timestamp > self.timeout {
                self.purge(now);
            }
        }
        self.heap.pop().map(|e| e.0.message)
    }

    /// Repeatedly remove the head while it is stale, except `join` commands
    /// (they are exempted — popped out of the way so staleness checking can
    /// continue past them, then reinserted once the stale run ends). Each
    /// purged `privmsg`/`privnotice` that is not itself a system notice
    /// increments a per-target skip counter; when the stale run ends, a
    /// synthetic "skipped N lines" notice is pushed per target.
    ///
    /// A purged `privmsg`/`privnotice` whose arguments don't decompose into
    /// `(target, text)` is re-pushed and the purge aborts early (spec §4.2
    /// "defensive"); notices for counts already accumulated are still
    /// emitted.
    pub fn purge(&mut self, now: f64) {
        let mut skipped: HashMap<String, u32> = HashMap::new();
        let mut kept_joins: Vec<Entry> = Vec::new();

        loop {
            let stale = match self.heap.peek() {
                Some(e) => now - e.0.message.timestamp > self.timeout,
                None => false,
            };
            if !stale {
                break;
            }
            let std::cmp::Reverse(entry) = self.heap.pop().expect("peeked Some above");

            if entry.message.command == Command::Join {
                kept_joins.push(entry);
                continue;
            }

            match entry.message.command {
                Command::Privmsg | Command::Privnotice => {
                    if entry.message.arguments.len() < 2 {
                        // Malformed: re-push and abort this purge cycle.
                        self.heap.push(std::cmp::Reverse(entry));
                        break;
                    }
                    if !entry.message.is_system_notice() {
                        let target = entry.message.arguments[0].clone();
                        *skipped.entry(target).or_insert(0) += 1;
                    }
                }
                _ => {}
            }
        }

        for entry in kept_joins {
            self.heap.push(std::cmp::Reverse(entry));
        }

        for (target, count) in skipped {
            let text = format!(
                "-- Message lags over {:.6} seconds. Skipping {} line(s)..",
                self.timeout, count
            );
            self.push(Message::with_timestamp(
                Command::Privmsg,
                vec![target, text],
                now,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg_at(cmd: Command, args: Vec<&str>, ts: f64) -> Message {
        Message::with_timestamp(cmd, args.into_iter().map(String::from).collect(), ts)
    }

    #[test]
    fn pop_order_is_non_decreasing_by_timestamp() {
        let mut buf = MessageBuffer::with_default_timeout();
        buf.push(msg_at(Command::Privmsg, vec!["#x", "c"], 30.0));
        buf.push(msg_at(Command::Privmsg, vec!["#x", "a"], 10.0));
        buf.push(msg_at(Command::Privmsg, vec!["#x", "b"], 20.0));

        let now = 30.0;
        let m1 = buf.pop(now).unwrap();
        let m2 = buf.pop(now).unwrap();
        let m3 = buf.pop(now).unwrap();
        assert_eq!(m1.arguments[1], "a");
        assert_eq!(m2.arguments[1], "b");
        assert_eq!(m3.arguments[1], "c");
    }

    #[test]
    fn ties_are_broken_stably_in_push_order() {
        let mut buf = MessageBuffer::with_default_timeout();
        buf.push(msg_at(Command::Privmsg, vec!["#x", "first"], 5.0));
        buf.push(msg_at(Command::Privmsg, vec!["#x", "second"], 5.0));
        let now = 5.0;
        assert_eq!(buf.pop(now).unwrap().arguments[1], "first");
        assert_eq!(buf.pop(now).unwrap().arguments[1], "second");
    }

    #[test]
    fn disabled_buffer_drops_pushes() {
        let mut buf = MessageBuffer::with_default_timeout();
        buf.set_disabled(true);
        buf.push(msg_at(Command::Privmsg, vec!["#x", "hi"], 0.0));
        assert!(buf.is_empty());
    }

    #[test]
    fn purge_exempts_joins_but_drops_stale_privmsgs_and_emits_notice() {
        let mut buf = MessageBuffer::new(10.0);
        let now = 100.0;
        // All pushed 15s ago: well past the 10s timeout.
        buf.push(msg_at(Command::Join, vec!["#x"], now - 15.0));
        buf.push(msg_at(Command::Privmsg, vec!["#x", "a"], now - 15.0));
        buf.push(msg_at(Command::Privmsg, vec!["#x", "b"], now - 15.0));
        buf.push(msg_at(Command::Privmsg, vec!["#x", "c"], now - 15.0));

        buf.purge(now);

        // Join survives, plus one synthetic notice.
        assert_eq!(buf.len(), 2);
        let first = buf.pop(now).unwrap();
        assert_eq!(first.command, Command::Join);
        let second = buf.pop(now).unwrap();
        assert_eq!(second.command, Command::Privmsg);
        assert_eq!(second.arguments[0], "#x");
        assert!(second.arguments[1].starts_with("-- Message lags over 10.000000 seconds. Skipping 3 line(s).."));
    }

    #[test]
    fn purge_does_not_count_system_notices() {
        let mut buf = MessageBuffer::new(10.0);
        let now = 100.0;
        buf.push(msg_at(Command::Privmsg, vec!["#x", "-- already a notice"], now - 15.0));
        buf.purge(now);
        assert!(buf.is_empty());
    }

    #[test]
    fn malformed_privmsg_is_repushed_and_aborts_purge() {
        let mut buf = MessageBuffer::new(10.0);
        let now = 100.0;
        // Only one argument: cannot decompose into (target, text).
        buf.push(msg_at(Command::Privmsg, vec!["#x"], now - 15.0));
        buf.push(msg_at(Command::Privmsg, vec!["#y", "well formed"], now - 15.0));
        buf.purge(now);
        // The malformed entry aborted the purge before the second (older by
        // push order but later in heap iteration) entry could be inspected;
        // both remain since BinaryHeap pops the oldest timestamp first and
        // both share a timestamp — the malformed one is re-pushed and the
        // loop breaks before considering anything else newly-stale that was
        // behind it.
        assert!(buf.len() >= 1);
    }

    #[test]
    fn has_pending_join_matches_on_channel_argument() {
        let mut buf = MessageBuffer::with_default_timeout();
        buf.push(msg_at(Command::Join, vec!["#x"], 1.0));
        assert!(buf.has_pending_join("#x"));
        assert!(!buf.has_pending_join("#y"));
    }

    #[test]
    fn has_buffer_by_command_scans_all_entries() {
        let mut buf = MessageBuffer::with_default_timeout();
        buf.push(msg_at(Command::Join, vec!["#x"], 1.0));
        assert!(buf.has_buffer_by_command(Command::Join));
        assert!(!buf.has_buffer_by_command(Command::Part));
    }
}
