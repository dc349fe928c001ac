//! `Pipe`: a configured relay between channels on two or more networks.
//!
//! Grounded on `examples/original_source/uniko.py`'s `Pipe` class — channel
//! event relay (`handle_channel_event`), the private-command surface
//! (`handle_who`, `handle_aop`), and the weight-sync reconciliation loop that
//! keeps each network's membership in a pipe's channel near its configured
//! `weight`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use slirc_proto::{casemap::irc_to_lower, ChannelExt, ChannelMode, Mode};

use crate::bot::AttachedBufferId;
use crate::buffer::MessageBuffer;
use crate::channel_table::ChannelTable;
use crate::config::PipeConfig;
use crate::conn::InboundEvent;
use crate::formatter::{Adornment, FormatInput, Formatter};
use crate::message::{Command, Message};
use crate::network::Network;

const WEIGHT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

fn default_active_events() -> HashSet<String> {
    [
        "action", "privmsg", "privnotice", "pubmsg", "pubnotice", "kick", "mode", "topic",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// A configured relay across a set of (network, channel) legs.
///
/// Each leg owns a buffer that every bot of its network attaches to (relayed
/// traffic is shareable — spec §3 — so any bot of the destination network can
/// send it). Legs with no configured channel (`channel_for` returned `None`)
/// or marked `disabled` are inert: no buffer traffic flows to or through them.
pub struct Pipe {
    networks: Vec<usize>,
    channels: Vec<Option<String>>,
    passwords: Vec<Option<String>>,
    disabled: Vec<bool>,
    buffers: Vec<Arc<Mutex<MessageBuffer>>>,
    active_events: HashSet<String>,
    weight: u32,
    bot_channel_limit: usize,
    formatter: Arc<dyn Formatter>,
    last_weight_sync: Option<Instant>,
    attached: Vec<Vec<(usize, AttachedBufferId)>>,
}

impl Pipe {
    pub fn from_config(
        cfg: &PipeConfig,
        network_index: impl Fn(&str) -> usize,
        formatter: Arc<dyn Formatter>,
    ) -> Self {
        let networks: Vec<usize> = cfg.network.iter().map(|n| network_index(n)).collect();
        let legs = cfg.network.len();
        let channels = (0..legs).map(|i| cfg.channel_for(i).map(irc_to_lower)).collect();
        let passwords = (0..legs).map(|i| cfg.password_for(i).map(String::from)).collect();
        let disabled = (0..legs).map(|i| cfg.disabled_for(i)).collect();
        let buffers = (0..legs)
            .map(|_| Arc::new(Mutex::new(MessageBuffer::new(cfg.buffer_timeout))))
            .collect();

        let mut active_events = default_active_events();
        for event in &cfg.always {
            active_events.insert(event.clone());
        }
        for event in &cfg.never {
            active_events.remove(event);
        }

        Self {
            networks,
            channels,
            passwords,
            disabled,
            buffers,
            active_events,
            weight: cfg.weight,
            bot_channel_limit: cfg.bot_channel_limit,
            formatter,
            last_weight_sync: None,
            attached: vec![Vec::new(); legs],
        }
    }

    /// Attach this pipe's per-leg buffers to every bot of the corresponding
    /// network. Idempotent: call [`Pipe::detach_all`] first on reload.
    pub fn attach_all(&mut self, networks: &mut [Network]) {
        for (leg, &net_idx) in self.networks.iter().enumerate() {
            if self.channels[leg].is_none() {
                continue;
            }
            let net = &mut networks[net_idx];
            for (bot_idx, bot) in net.bots.iter_mut().enumerate() {
                let id = bot.attach(self.buffers[leg].clone());
                self.attached[leg].push((bot_idx, id));
            }
        }
    }

    /// Detach every buffer attachment made by [`Pipe::attach_all`], leaving
    /// existing connections and channel membership untouched.
    pub fn detach_all(&mut self, networks: &mut [Network]) {
        for (leg, &net_idx) in self.networks.iter().enumerate() {
            let net = &mut networks[net_idx];
            for &(bot_idx, id) in &self.attached[leg] {
                if let Some(bot) = net.bots.get_mut(bot_idx) {
                    bot.detach(id);
                }
            }
            self.attached[leg].clear();
        }
    }

    /// Weight-sync reconciliation (spec §4.5), gated to run at most once per
    /// [`WEIGHT_SYNC_INTERVAL`]. For each leg below its configured `weight`,
    /// issue joins (via each candidate bot's private buffer, so they're sent
    /// by that specific bot rather than broadcast) to bring membership up —
    /// skipping bots that already have a join for the channel queued, are
    /// disconnected, or are already at their channel-count limit.
    pub fn on_tick(&mut self, networks: &mut [Network]) {
        let now = Instant::now();
        if let Some(last) = self.last_weight_sync {
            if now.duration_since(last) < WEIGHT_SYNC_INTERVAL {
                return;
            }
        }
        self.last_weight_sync = Some(now);

        for leg in 0..self.networks.len() {
            if self.disabled[leg] {
                continue;
            }
            let Some(channel) = self.channels[leg].clone() else {
                continue;
            };
            let net_idx = self.networks[leg];
            let net = &mut networks[net_idx];

            let joined = net.bots_in(&channel);
            let mut deficit = self.weight as i64 - joined.len() as i64;
            if deficit <= 0 {
                continue;
            }

            let mut available = Vec::new();
            for (bot_idx, bot) in net.bots.iter().enumerate() {
                if joined.contains(&bot_idx) {
                    continue;
                }
                if bot.private.has_pending_join(&channel) {
                    deficit -= 1;
                    continue;
                }
                if !bot.is_connected() {
                    continue;
                }
                if bot.channel_count() >= self.bot_channel_limit {
                    continue;
                }
                available.push(bot_idx);
            }
            if deficit <= 0 {
                continue;
            }

            let password = self.passwords[leg].clone();
            for &bot_idx in available.iter().take(deficit as usize) {
                net.bots[bot_idx]
                    .private
                    .push(Message::join_now(&channel, password.as_deref()));
            }
        }
    }

    /// Route one inbound event from `(net_idx, bot_idx)` to the channel-event
    /// or private-command path, per whether it targets a channel (spec §4.6).
    pub fn handle_event(
        &mut self,
        net_idx: usize,
        bot_idx: usize,
        event: &InboundEvent,
        networks: &mut [Network],
    ) {
        let Some(leg) = self.networks.iter().position(|&n| n == net_idx) else {
            return;
        };
        if self.disabled[leg] {
            return;
        }

        match event.target() {
            Some(target) if target.is_channel_name() => {
                self.handle_channel_event(leg, net_idx, bot_idx, target, event, networks);
            }
            _ => self.handle_private_event(leg, net_idx, event, networks),
        }
    }

    fn handle_channel_event(
        &mut self,
        leg: usize,
        net_idx: usize,
        bot_idx: usize,
        channel: &str,
        event: &InboundEvent,
        networks: &mut [Network],
    ) {
        if !networks[net_idx].is_listening_bot(bot_idx, channel) {
            return;
        }
        let folded = irc_to_lower(channel);
        if self.channels[leg].as_deref() != Some(folded.as_str()) {
            return;
        }
        let Some(source) = event.source_nick() else {
            return;
        };
        if networks[net_idx].owns_nick(source) {
            return;
        }
        let type_name = event.type_name();
        if !self.active_events.contains(type_name) {
            return;
        }
        if type_name == "mode" && is_pure_status_grant(event) {
            return;
        }

        let adornment = adornment_of(&networks[net_idx].bots[bot_idx].conn.channels, channel, source);
        let args = event_args(event);
        let line = self.formatter.format(&FormatInput {
            event_type: type_name,
            nick: source,
            adornment,
            args: &args,
        });

        for peer_leg in 0..self.networks.len() {
            if peer_leg == leg || self.disabled[peer_leg] {
                continue;
            }
            let Some(peer_channel) = self.channels[peer_leg].clone() else {
                continue;
            };
            self.buffers[peer_leg]
                .lock()
                .push(Message::new(Command::Privmsg, vec![peer_channel, line.clone()]));
        }
    }

    /// Recognized private commands sent directly to a bot: `\who <channel>`
    /// and `\aop <channel>` are fully implemented (spec §4.6); `\whois`,
    /// `\topic`, and `\op` are recognized but otherwise no-ops (spec's open
    /// question on partial private-command coverage, resolved in DESIGN.md).
    fn handle_private_event(
        &mut self,
        leg: usize,
        net_idx: usize,
        event: &InboundEvent,
        networks: &mut [Network],
    ) {
        let InboundEvent::Privmsg { from, text, is_action: false, .. } = event else {
            return;
        };
        if networks[net_idx].owns_nick(from) {
            return;
        }
        let Some(rest) = text.strip_prefix('\\') else {
            return;
        };
        let (cmd, arg) = rest.split_once(' ').unwrap_or((rest, ""));

        match cmd {
            "who" => self.handle_who(leg, net_idx, from, arg.trim(), networks),
            "aop" => self.handle_aop(leg, net_idx, from, arg.trim(), networks),
            "whois" | "topic" | "op" => {}
            _ => {}
        }
    }

    fn handle_who(&mut self, leg: usize, net_idx: usize, requester: &str, channel: &str, networks: &mut [Network]) {
        if !channel.is_channel_name() {
            return;
        }
        let folded = irc_to_lower(channel);
        if self.channels[leg].as_deref() != Some(folded.as_str()) {
            return;
        }
        let requester_bot = networks[net_idx]
            .bots
            .iter()
            .position(|b| b.conn.channels.is_member(channel, requester));
        if requester_bot.is_none() {
            return;
        }

        let mut replies = Vec::new();
        for peer_leg in 0..self.networks.len() {
            if peer_leg == leg {
                continue;
            }
            let Some(peer_channel) = self.channels[peer_leg].clone() else {
                continue;
            };
            let peer_net_idx = self.networks[peer_leg];
            let peer_net = &networks[peer_net_idx];
            let Some(&any_bot) = peer_net.bots_in(&peer_channel).first() else {
                continue;
            };
            let table = &peer_net.bots[any_bot].conn.channels;
            let list = render_nicklist(table, &peer_channel);
            let total = table.members(&peer_channel).len();
            replies.push(format!(
                "Total {} in {}'s {}: {}",
                total, peer_net.name, peer_channel, list
            ));
        }

        for reply in replies {
            networks[net_idx].push(Message::new(Command::Privmsg, vec![requester.to_string(), reply]));
        }
    }

    fn handle_aop(&mut self, leg: usize, net_idx: usize, requester: &str, channel: &str, networks: &mut [Network]) {
        if !channel.is_channel_name() {
            return;
        }
        let folded = irc_to_lower(channel);
        if self.channels[leg].as_deref() != Some(folded.as_str()) {
            return;
        }

        for peer_leg in 0..self.networks.len() {
            if peer_leg == leg {
                continue;
            }
            let Some(peer_channel) = self.channels[peer_leg].clone() else {
                continue;
            };
            let peer_net_idx = self.networks[peer_leg];
            let Some(oper_bot) = networks[peer_net_idx].get_oper(&peer_channel) else {
                continue;
            };

            let table = &networks[peer_net_idx].bots[oper_bot].conn.channels;
            let members = table.members(&peer_channel);
            let mut non_opers: Vec<String> = members
                .into_iter()
                .filter(|n| !table.is_oper(&peer_channel, n))
                .collect();
            non_opers.sort();

            for group in non_opers.chunks(4) {
                let flags = "o".repeat(group.len());
                let mut args = vec![peer_channel.clone(), format!("+{}", flags)];
                args.extend(group.iter().cloned());
                networks[peer_net_idx].bots[oper_bot]
                    .private
                    .push(Message::new(Command::Mode, args));
            }

            if !non_opers.is_empty() {
                let reply = non_opers.join(" ");
                networks[net_idx].push(Message::new(Command::Privmsg, vec![requester.to_string(), reply]));
            }
        }
    }
}

fn adornment_of(table: &ChannelTable, channel: &str, nick: &str) -> Adornment {
    if table.is_oper(channel, nick) {
        Adornment::Oper
    } else if table.is_voiced(channel, nick) {
        Adornment::Voice
    } else {
        Adornment::None
    }
}

/// `true` iff a mode event consists entirely of `+o`/`+v` grants — these are
/// suppressed from channel-event relay (spec §4.6: status grants are noisy
/// and not informative to a bridged channel on their own).
fn is_pure_status_grant(event: &InboundEvent) -> bool {
    let InboundEvent::Mode { changes, .. } = event else {
        return false;
    };
    !changes.is_empty()
        && changes
            .iter()
            .all(|c| matches!(c, Mode::Plus(ChannelMode::Oper, _) | Mode::Plus(ChannelMode::Voice, _)))
}

fn event_args(event: &InboundEvent) -> Vec<String> {
    match event {
        InboundEvent::Privmsg { text, .. } => vec![text.clone()],
        InboundEvent::Notice { text, .. } => vec![text.clone()],
        InboundEvent::Topic { topic, .. } => vec![topic.clone()],
        InboundEvent::Kick { target, reason, .. } => {
            vec![target.clone(), reason.clone().unwrap_or_default()]
        }
        InboundEvent::Mode { changes, .. } => changes.iter().map(render_mode_change).collect(),
        InboundEvent::Part { reason, .. } | InboundEvent::Quit { reason, .. } => {
            reason.clone().into_iter().collect()
        }
        InboundEvent::Join { .. } | InboundEvent::Nick { .. } => Vec::new(),
    }
}

fn render_mode_change(change: &Mode<ChannelMode>) -> String {
    match change {
        Mode::Plus(mode, Some(arg)) => format!("+{} {}", mode, arg),
        Mode::Plus(mode, None) => format!("+{}", mode),
        Mode::Minus(mode, Some(arg)) => format!("-{} {}", mode, arg),
        Mode::Minus(mode, None) => format!("-{}", mode),
        Mode::NoPrefix(mode) => mode.to_string(),
    }
}

/// Opers first, then voiced, then everyone else; alphabetical by casefolded
/// nick within each bucket (the only case [`ChannelTable`] tracks).
fn render_nicklist(table: &ChannelTable, channel: &str) -> String {
    let mut members: Vec<String> = table.members(channel).into_iter().collect();
    members.sort_by(|a, b| rank(table, channel, a).cmp(&rank(table, channel, b)).then_with(|| a.cmp(b)));
    members
        .iter()
        .map(|nick| {
            let prefix = if table.is_oper(channel, nick) {
                '@'
            } else if table.is_voiced(channel, nick) {
                '+'
            } else {
                ' '
            };
            format!("{}{}", prefix, nick)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn rank(table: &ChannelTable, channel: &str, nick: &str) -> u8 {
    if table.is_oper(channel, nick) {
        0
    } else if table.is_voiced(channel, nick) {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelSpec, PipeConfig};
    use crate::conn::Conn;
    use crate::config::{NetworkConfig, ServerAddr};
    use crate::encoding::TextCodec;
    use crate::formatter::standard::StandardFormatter;
    use crate::network::Network;
    use std::time::Duration as StdDuration;

    fn pipe_config(networks: &[&str], channel: &str) -> PipeConfig {
        PipeConfig {
            network: networks.iter().map(|s| s.to_string()).collect(),
            channel: ChannelSpec::Single(channel.to_string()),
            password: Vec::new(),
            disabled: Vec::new(),
            always: Vec::new(),
            never: Vec::new(),
            formatter: "standard".into(),
            weight: 1,
            buffer_timeout: crate::buffer::DEFAULT_TIMEOUT,
            bot_channel_limit: 20,
        }
    }

    fn net_config(name: &str) -> NetworkConfig {
        NetworkConfig {
            name: name.into(),
            server: vec![ServerAddr {
                host: format!("irc.{name}.example"),
                port: 6667,
                password: None,
            }],
            encoding: "utf-8".into(),
            use_ssl: false,
            buffer_timeout: crate::buffer::DEFAULT_TIMEOUT,
        }
    }

    fn network_with_bot(name: &str, nick: &str) -> Network {
        let mut net = Network::new(name.into(), TextCodec::default(), 10.0, 20);
        let conn = Conn::new(&net_config(name), nick.into(), "bridge".into(), "Bridge".into());
        net.add_bot(crate::bot::Bot::new(conn, StdDuration::from_secs(600)));
        net
    }

    fn make_pipe(names: &[&str]) -> (Pipe, Vec<Network>) {
        let mut networks: Vec<Network> = names
            .iter()
            .enumerate()
            .map(|(i, n)| network_with_bot(n, &format!("bridge{i}")))
            .collect();
        let cfg = pipe_config(names, "#x");
        let index_of: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let mut pipe = Pipe::from_config(
            &cfg,
            |name| index_of.iter().position(|n| n == name).unwrap(),
            Arc::new(StandardFormatter),
        );
        pipe.attach_all(&mut networks);
        (pipe, networks)
    }

    #[test]
    fn channel_event_relays_to_every_other_leg() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b", "c"]);
        networks[0].bots[0].conn.channels.join("#x", "bridge0");
        networks[0].bots[0].conn.channels.join("#x", "alice");

        let event = InboundEvent::Privmsg {
            from: "alice".into(),
            target: "#x".into(),
            text: "hello".into(),
            is_action: false,
        };
        pipe.handle_event(0, 0, &event, &mut networks);

        assert_eq!(pipe.buffers[1].lock().len(), 1);
        assert_eq!(pipe.buffers[2].lock().len(), 1);
        assert_eq!(pipe.buffers[0].lock().len(), 0);
    }

    #[test]
    fn self_echo_is_suppressed() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b"]);
        networks[0].bots[0].conn.channels.join("#x", "bridge0");

        let event = InboundEvent::Privmsg {
            from: "bridge0".into(),
            target: "#x".into(),
            text: "hello".into(),
            is_action: false,
        };
        pipe.handle_event(0, 0, &event, &mut networks);

        assert_eq!(pipe.buffers[1].lock().len(), 0);
    }

    #[test]
    fn non_listening_bot_is_ignored() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b"]);
        // bridge0 is not a member of #x at all.
        let event = InboundEvent::Privmsg {
            from: "alice".into(),
            target: "#x".into(),
            text: "hello".into(),
            is_action: false,
        };
        pipe.handle_event(0, 0, &event, &mut networks);
        assert_eq!(pipe.buffers[1].lock().len(), 0);
    }

    #[test]
    fn inactive_event_type_is_dropped() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b"]);
        networks[0].bots[0].conn.channels.join("#x", "bridge0");
        networks[0].bots[0].conn.channels.join("#x", "alice");

        let event = InboundEvent::Join {
            nick: "alice".into(),
            channel: "#x".into(),
        };
        pipe.handle_event(0, 0, &event, &mut networks);
        assert_eq!(pipe.buffers[1].lock().len(), 0);
    }

    #[test]
    fn pure_status_grant_mode_is_suppressed() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b"]);
        networks[0].bots[0].conn.channels.join("#x", "bridge0");
        networks[0].bots[0].conn.channels.join("#x", "alice");

        let event = InboundEvent::Mode {
            by: "alice".into(),
            channel: "#x".into(),
            changes: vec![Mode::Plus(ChannelMode::Oper, Some("bob".into()))],
        };
        pipe.handle_event(0, 0, &event, &mut networks);
        assert_eq!(pipe.buffers[1].lock().len(), 0);
    }

    #[test]
    fn who_reports_membership_of_every_other_leg() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b"]);
        networks[0].bots[0].conn.channels.join("#x", "bridge0");
        networks[0].bots[0].conn.channels.join("#x", "alice");
        networks[1].bots[0].conn.channels.join("#x", "bridge1");
        networks[1].bots[0].conn.channels.join("#x", "carl");
        networks[1]
            .bots[0]
            .conn
            .channels
            .apply_mode("#x", "carl", &ChannelMode::Oper, true);

        let event = InboundEvent::Privmsg {
            from: "alice".into(),
            target: "bridge0".into(),
            text: "\\who #x".into(),
            is_action: false,
        };
        pipe.handle_event(0, 0, &event, &mut networks);

        let reply = networks[0].shared.lock().pop(crate::message::now_secs()).unwrap();
        assert_eq!(reply.command, Command::Privmsg);
        assert_eq!(reply.arguments[0], "alice");
        assert!(reply.arguments[1].starts_with("Total 2 in b's #x:"));
        assert!(reply.arguments[1].contains("@carl"));
    }

    #[test]
    fn aop_sends_mode_grants_in_groups_of_four() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b"]);
        networks[0].bots[0].conn.channels.join("#x", "bridge0");
        let oper_bot = &mut networks[1].bots[0];
        oper_bot.conn.channels.join("#x", "bridge1");
        oper_bot
            .conn
            .channels
            .apply_mode("#x", "bridge1", &ChannelMode::Oper, true);
        for nick in ["n1", "n2", "n3", "n4", "n5"] {
            oper_bot.conn.channels.join("#x", nick);
        }

        let event = InboundEvent::Privmsg {
            from: "alice".into(),
            target: "bridge0".into(),
            text: "\\aop #x".into(),
            is_action: false,
        };
        pipe.handle_event(0, 0, &event, &mut networks);

        assert_eq!(networks[1].bots[0].private.len(), 2);
        let first = networks[1].bots[0].private.pop(crate::message::now_secs()).unwrap();
        assert_eq!(first.command, Command::Mode);
        assert_eq!(first.arguments[1], "+oooo");
        let second = networks[1].bots[0].private.pop(crate::message::now_secs()).unwrap();
        assert_eq!(second.arguments[1], "+o");

        let reply = networks[0].shared.lock().pop(crate::message::now_secs()).unwrap();
        assert_eq!(reply.arguments[0], "alice");
    }

    #[test]
    fn aop_sends_one_reply_per_peer_network_not_a_merged_one() {
        let (mut pipe, mut networks) = make_pipe(&["a", "b", "c"]);
        networks[0].bots[0].conn.channels.join("#x", "bridge0");

        let oper_b = &mut networks[1].bots[0];
        oper_b.conn.channels.join("#x", "bridge1");
        oper_b.conn.channels.apply_mode("#x", "bridge1", &ChannelMode::Oper, true);
        oper_b.conn.channels.join("#x", "bob");

        let oper_c = &mut networks[2].bots[0];
        oper_c.conn.channels.join("#x", "bridge2");
        oper_c.conn.channels.apply_mode("#x", "bridge2", &ChannelMode::Oper, true);
        oper_c.conn.channels.join("#x", "carl");

        let event = InboundEvent::Privmsg {
            from: "alice".into(),
            target: "bridge0".into(),
            text: "\\aop #x".into(),
            is_action: false,
        };
        pipe.handle_event(0, 0, &event, &mut networks);

        let mut shared = networks[0].shared.lock();
        assert_eq!(shared.len(), 2, "one reply per peer network, not one merged reply");
        let first = shared.pop(crate::message::now_secs()).unwrap();
        let second = shared.pop(crate::message::now_secs()).unwrap();
        let replies = [first.arguments[1].clone(), second.arguments[1].clone()];
        assert!(replies.iter().any(|r| r == "bob"));
        assert!(replies.iter().any(|r| r == "carl"));
        assert!(!replies.iter().any(|r| r.contains("bob") && r.contains("carl")));
    }

    #[test]
    fn weight_sync_issues_joins_up_to_weight_for_unjoined_bots() {
        let mut networks = vec![network_with_bot("a", "bridge0"), network_with_bot("b", "bridge1")];
        networks[0].add_bot({
            let conn = Conn::new(&net_config("a"), "bridge0b".into(), "bridge".into(), "Bridge".into());
            crate::bot::Bot::new(conn, StdDuration::from_secs(600))
        });

        let mut cfg = pipe_config(&["a", "b"], "#x");
        cfg.weight = 2;
        let index_of = vec!["a".to_string(), "b".to_string()];
        let mut pipe = Pipe::from_config(
            &cfg,
            |name| index_of.iter().position(|n| n == name).unwrap(),
            Arc::new(StandardFormatter),
        );
        pipe.attach_all(&mut networks);
        pipe.on_tick(&mut networks);

        let joins: usize = networks[0]
            .bots
            .iter()
            .filter(|b| b.private.has_pending_join("#x"))
            .count();
        assert_eq!(joins, 2);
    }
}
