//! `Supervisor`: owns the whole Network/Bot/Pipe graph and drives the main
//! loop (spec's `UnikoBot`).
//!
//! Grounded on `examples/original_source/uniko.py`'s `UnikoBot.start` — a
//! flat `while True` loop calling `process_once` per server — generalized to
//! a single `tokio` task that also drains pipes' weight sync and polls the
//! config file for hot reload, the way `slircd-ng::main`'s background tasks
//! are all spawned from one place but, here, run cooperatively on one task
//! rather than one-per-concern, since spec §5 asks for a single
//! state-serializing main loop rather than per-connection tasks.

use std::time::Duration;

use crate::bot::Bot;
use crate::bot::TickOutcome;
use crate::config::Config;
use crate::conn::Conn;
use crate::encoding::TextCodec;
use crate::formatter::Registry;
use crate::network::Network;
use crate::pipe::Pipe;

/// Per-tick budget for draining one Bot's inbound socket (spec §5(i): "up to
/// ~200ms blocking wait" bounds one tick's I/O so no single slow connection
/// starves the others).
const POLL_BUDGET: Duration = Duration::from_millis(200);

pub struct Supervisor {
    networks: Vec<Network>,
    network_names: Vec<String>,
    pipes: Vec<Pipe>,
    formatters: Registry,
    test_mode: bool,
    config_path: std::path::PathBuf,
    watcher: crate::config::ConfigWatcher,
}

impl Supervisor {
    pub fn from_config(config_path: impl Into<std::path::PathBuf>, config: Config) -> Self {
        let config_path = config_path.into();
        let formatters = Registry::with_builtins();

        let network_names: Vec<String> = config.network.iter().map(|n| n.name.clone()).collect();
        let mut networks: Vec<Network> = config
            .network
            .iter()
            .map(|n| Network::new(n.name.clone(), TextCodec::for_label(&n.encoding), n.buffer_timeout, 20))
            .collect();

        for bot_cfg in &config.bot {
            let Some(net_idx) = network_names.iter().position(|n| n == &bot_cfg.network) else {
                continue;
            };
            let network_cfg = &config.network[net_idx];
            let conn = Conn::new(
                network_cfg,
                bot_cfg.nickname.clone(),
                bot_cfg.username.clone(),
                bot_cfg.realname.clone(),
            );
            let bot = Bot::new(conn, Duration::from_secs(bot_cfg.reconnect_interval));
            networks[net_idx].add_bot(bot);
        }

        let mut pipes: Vec<Pipe> = config
            .pipe
            .iter()
            .map(|pipe_cfg| {
                let formatter = formatters
                    .get(&pipe_cfg.formatter)
                    .unwrap_or_else(|| formatters.get("standard").expect("standard formatter always registered"));
                Pipe::from_config(
                    pipe_cfg,
                    |name| network_names.iter().position(|n| n == name).expect("validated at config load"),
                    formatter,
                )
            })
            .collect();

        for pipe in &mut pipes {
            pipe.attach_all(&mut networks);
        }

        let watcher = crate::config::ConfigWatcher::new(&config_path, config.version);
        Self {
            networks,
            network_names,
            pipes,
            formatters,
            test_mode: config.test,
            config_path,
            watcher,
        }
    }

    /// Run forever: each iteration polls every bot's inbound socket, routes
    /// observed events through every pipe, drains each bot's outbound queues
    /// under flood control, runs each pipe's weight-sync tick, and checks the
    /// config file for a reload.
    pub async fn run(&mut self) -> ! {
        loop {
            self.tick().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn tick(&mut self) {
        self.poll_inbound().await;
        self.drain_outbound().await;
        for pipe in &mut self.pipes {
            pipe.on_tick(&mut self.networks);
        }
        self.poll_config_reload();
    }

    async fn poll_inbound(&mut self) {
        for net_idx in 0..self.networks.len() {
            let bot_count = self.networks[net_idx].bots.len();
            for bot_idx in 0..bot_count {
                let events = self.networks[net_idx].bots[bot_idx].poll_inbound(POLL_BUDGET).await;
                for event in &events {
                    for pipe in &mut self.pipes {
                        dispatch_to_pipe(pipe, net_idx, bot_idx, event, &mut self.networks, &self.network_names[net_idx]);
                    }
                    self.networks[net_idx].bots[bot_idx].apply_membership(event);
                }
            }
        }
    }

    async fn drain_outbound(&mut self) {
        for net_idx in 0..self.networks.len() {
            let bot_count = self.networks[net_idx].bots.len();
            for bot_idx in 0..bot_count {
                if self.test_mode {
                    if let Some(message) = self.networks[net_idx].bots[bot_idx].drain_for_log() {
                        tracing::info!(
                            network = %self.network_names[net_idx],
                            nickname = %self.networks[net_idx].bots[bot_idx].nickname(),
                            command = %message.command,
                            arguments = ?message.arguments,
                            "test mode: would send"
                        );
                    }
                    continue;
                }

                match self.networks[net_idx].bots[bot_idx].flood_control().await {
                    TickOutcome::Sent => {
                        tracing::debug!(network = %self.network_names[net_idx], "sent outbound message");
                    }
                    TickOutcome::Reconnecting => {
                        self.reconnect(net_idx, bot_idx).await;
                    }
                    TickOutcome::Idle => {}
                }
            }
        }
    }

    async fn reconnect(&mut self, net_idx: usize, bot_idx: usize) {
        let bot = &mut self.networks[net_idx].bots[bot_idx];
        bot.mark_reconnect_attempted();
        tracing::info!(network = %self.network_names[net_idx], nickname = %bot.nickname(), "attempting reconnect");
        match bot.conn.connect().await {
            Ok(()) => {
                bot.mark_connected();
                tracing::info!(network = %self.network_names[net_idx], nickname = %bot.nickname(), "reconnected");
            }
            Err(err) => {
                tracing::warn!(network = %self.network_names[net_idx], error = %err, "reconnect failed");
            }
        }
    }

    fn poll_config_reload(&mut self) {
        match self.watcher.poll() {
            Ok(Some(new_config)) => {
                tracing::info!(version = new_config.version, "reloading configuration");
                self.reload(new_config);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "config reload failed, keeping running configuration");
            }
        }
    }

    /// Rebuild the Pipe graph from a newly loaded config, detaching every
    /// existing pipe's buffers before reattaching under the new topology.
    /// Existing Bot connections and channel memberships are left untouched —
    /// only buffer routing changes (spec §7: reload must not drop
    /// connections).
    fn reload(&mut self, config: Config) {
        for pipe in &mut self.pipes {
            pipe.detach_all(&mut self.networks);
        }

        self.test_mode = config.test;

        let mut pipes: Vec<Pipe> = config
            .pipe
            .iter()
            .map(|pipe_cfg| {
                let formatter = self
                    .formatters
                    .get(&pipe_cfg.formatter)
                    .unwrap_or_else(|| self.formatters.get("standard").expect("standard formatter always registered"));
                let names = &self.network_names;
                Pipe::from_config(
                    pipe_cfg,
                    |name| names.iter().position(|n| n == name).expect("validated at config load"),
                    formatter,
                )
            })
            .collect();

        for pipe in &mut pipes {
            pipe.attach_all(&mut self.networks);
        }
        self.pipes = pipes;
    }
}

/// Runs one pipe's handler for one event, catching a panic the way spec
/// §7's "Handler exception" case requires: log it, treat the event as
/// unhandled by that pipe, and let the caller's loop keep running.
fn dispatch_to_pipe(
    pipe: &mut Pipe,
    net_idx: usize,
    bot_idx: usize,
    event: &crate::conn::InboundEvent,
    networks: &mut Vec<Network>,
    network_name: &str,
) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pipe.handle_event(net_idx, bot_idx, event, networks);
    }));
    if let Err(payload) = result {
        let err = crate::error::BridgeError::HandlerPanic {
            event: event.type_name().to_string(),
            network: network_name.to_string(),
            message: panic_message(&payload),
        };
        tracing::error!(error = %err, "handler panicked, treating event as unhandled");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Resolve the CLI's single optional positional profile argument to a
/// `<profile>.toml` path in the working directory (spec §6), defaulting to
/// `config.toml` when no profile is given.
pub fn resolve_config_path(profile: Option<&str>) -> std::path::PathBuf {
    let profile = profile.unwrap_or("config");
    std::path::PathBuf::from(format!("{profile}.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_config_path_defaults_to_config_toml() {
        assert_eq!(resolve_config_path(None), std::path::PathBuf::from("config.toml"));
    }

    #[test]
    fn resolve_config_path_uses_given_profile() {
        assert_eq!(resolve_config_path(Some("staging")), std::path::PathBuf::from("staging.toml"));
    }

    fn sample_config() -> Config {
        let toml = r#"
version = 1

[[network]]
name = "a"
server = [{ host = "irc.a.example", port = 6667 }]

[[network]]
name = "b"
server = [{ host = "irc.b.example", port = 6697 }]

[[bot]]
network = "a"
nickname = "bridge1"

[[bot]]
network = "b"
nickname = "bridge2"

[[pipe]]
network = ["a", "b"]
channel = "#x"
weight = 1
"#;
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn builds_network_and_pipe_graph_from_config() {
        let config = sample_config();
        let supervisor = Supervisor::from_config("test.toml", config);
        assert_eq!(supervisor.networks.len(), 2);
        assert_eq!(supervisor.networks[0].bots.len(), 1);
        assert_eq!(supervisor.pipes.len(), 1);
    }

    #[test]
    fn dispatch_to_pipe_catches_a_handler_panic_without_propagating() {
        let config = sample_config();
        let mut supervisor = Supervisor::from_config("test.toml", config);
        let event = crate::conn::InboundEvent::Join {
            nick: "someone".into(),
            channel: "#x".into(),
        };
        // An empty `networks` slice makes the handler index out of bounds,
        // standing in for whatever bug might someday panic inside a handler.
        let mut empty_networks: Vec<Network> = Vec::new();
        let pipe = &mut supervisor.pipes[0];
        dispatch_to_pipe(pipe, 0, 0, &event, &mut empty_networks, "a");
    }

    #[test]
    fn panic_message_extracts_str_and_string_payloads() {
        let str_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(str_payload.as_ref()), "boom");

        let string_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("also boom"));
        assert_eq!(panic_message(string_payload.as_ref()), "also boom");

        let other_payload: Box<dyn std::any::Any + Send> = Box::new(42i32);
        assert_eq!(panic_message(other_payload.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_mode_drains_without_a_live_connection() {
        let mut config = sample_config();
        config.test = true;
        let mut supervisor = Supervisor::from_config("test.toml", config);
        supervisor.networks[0].bots[0]
            .private
            .push(crate::message::Message::new(
                crate::message::Command::Privmsg,
                vec!["#x".into(), "hi".into()],
            ));
        supervisor.drain_outbound().await;
        assert!(supervisor.networks[0].bots[0].private.is_empty());
    }
}
