//! Error hierarchy for the bridge core.
//!
//! Per the error handling design: nothing in here aborts the process except
//! a startup configuration load failure. Everything else is logged and the
//! offending message is re-pushed or dropped per its specific contract.

use thiserror::Error;

/// Errors surfaced by a single send attempt from a Bot's flood control.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(#[from] slirc_proto::error::ProtocolError),
}

impl SendError {
    /// `true` for the transient "not connected" case, which also triggers a
    /// reconnect attempt; `false` for anything else, which is just logged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Transport(_) => "transport_error",
        }
    }
}

/// Errors raised while establishing or maintaining a Bot's connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no server addresses configured for network {0:?}")]
    NoServers(String),

    #[error("all server addresses exhausted for network {0:?}")]
    ServersExhausted(String),

    #[error("io error connecting to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls error connecting to {addr}: {source}")]
    Tls {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registration handshake failed: {0}")]
    Handshake(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] slirc_proto::error::ProtocolError),
}

/// Errors loading or hot-reloading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("pipe {pipe:?} has {networks} network(s) but channel list has {channels} entries")]
    ChannelListLengthMismatch {
        pipe: String,
        networks: usize,
        channels: usize,
    },

    #[error("pipe {pipe:?} references unknown network {network:?}")]
    UnknownNetwork { pipe: String, network: String },

    #[error("bot entry references unknown network {network:?}")]
    UnknownNetworkForBot { network: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Parse { .. } => "parse",
            Self::ChannelListLengthMismatch { .. } => "channel_list_length_mismatch",
            Self::UnknownNetwork { .. } => "unknown_network",
            Self::UnknownNetworkForBot { .. } => "unknown_network_for_bot",
        }
    }
}

/// Top-level error returned from fallible core operations that don't fit a
/// more specific error type above.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("handler for {event} on {network:?} panicked: {message}")]
    HandlerPanic {
        event: String,
        network: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_error_transience() {
        assert!(SendError::NotConnected.is_transient());
        assert_eq!(SendError::NotConnected.error_code(), "not_connected");
    }

    #[test]
    fn config_error_codes() {
        let err = ConfigError::UnknownNetwork {
            pipe: "p".into(),
            network: "n".into(),
        };
        assert_eq!(err.error_code(), "unknown_network");
    }

    #[test]
    fn handler_panic_display_includes_event_network_and_message() {
        let err = BridgeError::HandlerPanic {
            event: "join".into(),
            network: "a".into(),
            message: "index out of bounds".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("join"));
        assert!(rendered.contains("\"a\""));
        assert!(rendered.contains("index out of bounds"));
    }
}
