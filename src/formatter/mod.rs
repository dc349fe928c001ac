//! Formatter registry: renders an inbound channel event into the display
//! line relayed to peer networks (spec §4.7).
//!
//! Grounded on `examples/original_source/formatter/standard.py`'s
//! `format_event`/`repr_nickname`, generalized from a single hardcoded
//! module load into a name-keyed registry the way spec §9's "dynamic
//! dispatch for formatters" design note asks for.

pub mod standard;

use std::collections::HashMap;
use std::sync::Arc;

/// Nick adornment, precomputed by the caller from the observing bot's
/// [`crate::channel_table::ChannelTable`] before formatting, so the
/// formatter itself stays a pure function of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adornment {
    Oper,
    Voice,
    None,
}

impl Adornment {
    pub fn prefix(self) -> char {
        match self {
            Adornment::Oper => '@',
            Adornment::Voice => '+',
            Adornment::None => ' ',
        }
    }
}

/// Everything a [`Formatter`] needs to render one event into a line.
pub struct FormatInput<'a> {
    /// Lowercase event-type name (`privmsg`, `join`, `kick`, ...).
    pub event_type: &'a str,
    /// Raw source nickname.
    pub nick: &'a str,
    /// The source nick's channel-mode adornment.
    pub adornment: Adornment,
    /// Decoded event arguments, in wire order.
    pub args: &'a [String],
}

impl FormatInput<'_> {
    fn adorned_nick(&self) -> String {
        format!("{}{}", self.adornment.prefix(), self.nick)
    }

    fn args_joined(&self) -> String {
        self.args.join(" ")
    }
}

/// A pure `(event, channel-state, encoding) -> line` rendering function,
/// keyed by name in the [`Registry`].
pub trait Formatter: Send + Sync {
    fn format(&self, input: &FormatInput) -> String;
}

/// Name-keyed formatter registry, populated at startup (spec §9: replaces
/// the original's runtime module load with a registry of a small
/// polymorphic capability).
#[derive(Clone)]
pub struct Registry {
    formatters: HashMap<String, Arc<dyn Formatter>>,
}

impl Registry {
    /// A registry pre-populated with the built-in `standard` formatter.
    pub fn with_builtins() -> Self {
        let mut formatters: HashMap<String, Arc<dyn Formatter>> = HashMap::new();
        formatters.insert("standard".to_string(), Arc::new(standard::StandardFormatter));
        Self { formatters }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Formatter>> {
        self.formatters.get(name).cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_standard_by_name() {
        let registry = Registry::with_builtins();
        assert!(registry.get("standard").is_some());
        assert!(registry.get("nonexistent").is_none());
    }
}
