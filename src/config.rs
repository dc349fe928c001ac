//! Configuration loading, validation, and mtime-triggered hot-reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;

use crate::error::ConfigError;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// One `(host, port, password?)` fallback entry for a network's server list.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub server: Vec<ServerAddr>,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default = "default_buffer_timeout")]
    pub buffer_timeout: f64,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_buffer_timeout() -> f64 {
    crate::buffer::DEFAULT_TIMEOUT
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub network: String,
    pub nickname: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,
}

fn default_username() -> String {
    "bridge".to_string()
}

fn default_realname() -> String {
    "IRC Bridge".to_string()
}

fn default_reconnect_interval() -> u64 {
    60
}

/// `channel` may be given in the TOML source as a single string (applied to
/// every listed network) or a list (indexed positionally); both deserialize
/// into this enum, and [`PipeConfig::channel_for`] normalizes the lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChannelSpec {
    Single(String),
    PerNetwork(Vec<Option<String>>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipeConfig {
    pub network: Vec<String>,
    pub channel: ChannelSpec,
    #[serde(default)]
    pub password: Vec<Option<String>>,
    #[serde(default)]
    pub disabled: Vec<bool>,
    #[serde(default)]
    pub always: Vec<String>,
    #[serde(default)]
    pub never: Vec<String>,
    #[serde(default = "default_formatter")]
    pub formatter: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default = "default_buffer_timeout")]
    pub buffer_timeout: f64,
    #[serde(default = "default_channel_limit")]
    pub bot_channel_limit: usize,
}

fn default_formatter() -> String {
    "standard".to_string()
}

fn default_weight() -> u32 {
    1
}

fn default_channel_limit() -> usize {
    20
}

impl PipeConfig {
    /// The channel name this pipe uses on the network at `index` in
    /// [`PipeConfig::network`], if the pipe is active there.
    pub fn channel_for(&self, index: usize) -> Option<&str> {
        match &self.channel {
            ChannelSpec::Single(name) => Some(name.as_str()),
            ChannelSpec::PerNetwork(names) => names.get(index).and_then(|o| o.as_deref()),
        }
    }

    pub fn password_for(&self, index: usize) -> Option<&str> {
        self.password.get(index).and_then(|o| o.as_deref())
    }

    pub fn disabled_for(&self, index: usize) -> bool {
        self.disabled.get(index).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub test: bool,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    pub network: Vec<NetworkConfig>,
    pub bot: Vec<BotConfig>,
    pub pipe: Vec<PipeConfig>,
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Config {
    /// Load and structurally validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let known: HashMap<&str, ()> = self.network.iter().map(|n| (n.name.as_str(), ())).collect();

        for bot in &self.bot {
            if !known.contains_key(bot.network.as_str()) {
                return Err(ConfigError::UnknownNetworkForBot {
                    network: bot.network.clone(),
                });
            }
        }

        for pipe in &self.pipe {
            for net in &pipe.network {
                if !known.contains_key(net.as_str()) {
                    return Err(ConfigError::UnknownNetwork {
                        pipe: pipe_label(pipe),
                        network: net.clone(),
                    });
                }
            }
            if let ChannelSpec::PerNetwork(names) = &pipe.channel {
                if names.len() != pipe.network.len() {
                    return Err(ConfigError::ChannelListLengthMismatch {
                        pipe: pipe_label(pipe),
                        networks: pipe.network.len(),
                        channels: names.len(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn pipe_label(pipe: &PipeConfig) -> String {
    pipe.network.join("+")
}

/// Watches a config file's mtime and reloads it only when both the mtime has
/// increased and the newly parsed `version` is strictly greater than the
/// currently running one (spec: configuration version regression is
/// ignored silently).
pub struct ConfigWatcher {
    path: PathBuf,
    last_mtime: Option<SystemTime>,
    running_version: u64,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, running_version: u64) -> Self {
        Self {
            path: path.into(),
            last_mtime: None,
            running_version,
        }
    }

    /// Check the file's mtime and return a freshly loaded [`Config`] if it
    /// changed and carries a newer version. Parse failures are logged by the
    /// caller and leave the watcher's state untouched so the previous
    /// configuration keeps running.
    pub fn poll(&mut self) -> Result<Option<Config>, ConfigError> {
        let metadata = std::fs::metadata(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let mtime = metadata.modified().map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        if Some(mtime) == self.last_mtime {
            return Ok(None);
        }
        self.last_mtime = Some(mtime);

        let config = Config::load(&self.path)?;
        if config.version <= self.running_version {
            return Ok(None);
        }
        self.running_version = config.version;
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
version = 1

[[network]]
name = "a"
server = [{ host = "irc.a.example", port = 6667 }]

[[network]]
name = "b"
server = [{ host = "irc.b.example", port = 6697 }]
use_ssl = true
encoding = "cp949"

[[bot]]
network = "a"
nickname = "bridge1"

[[bot]]
network = "b"
nickname = "bridge2"

[[pipe]]
network = ["a", "b"]
channel = "#x"
weight = 2
"#
    }

    #[test]
    fn loads_and_validates_a_well_formed_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.network.len(), 2);
        assert_eq!(config.pipe[0].weight, 2);
    }

    #[test]
    fn single_channel_string_applies_to_every_network() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        let pipe = &config.pipe[0];
        assert_eq!(pipe.channel_for(0), Some("#x"));
        assert_eq!(pipe.channel_for(1), Some("#x"));
    }

    #[test]
    fn per_network_channel_list_is_indexed_positionally() {
        let toml = sample_toml().replace(r#"channel = "#x""#, r#"channel = ["#x", "#y"]"#);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        let pipe = &config.pipe[0];
        assert_eq!(pipe.channel_for(0), Some("#x"));
        assert_eq!(pipe.channel_for(1), Some("#y"));
    }

    #[test]
    fn bot_referencing_unknown_network_is_rejected() {
        let toml = sample_toml().replace(r#"network = "a""#, r#"network = "ghost""#);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "unknown_network_for_bot");
    }

    #[test]
    fn watcher_ignores_version_regression() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();
        let mut watcher = ConfigWatcher::new(file.path(), 5);
        // version 1 in the fixture is not greater than the running version 5.
        let result = watcher.poll().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn watcher_reloads_on_newer_version_and_mtime_change() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();
        let mut watcher = ConfigWatcher::new(file.path(), 0);
        let reloaded = watcher.poll().unwrap();
        assert!(reloaded.is_some());
        // Same mtime, same content: no further reload.
        assert!(watcher.poll().unwrap().is_none());
    }
}
