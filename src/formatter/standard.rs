//! The `standard` formatter (spec §4.7), grounded on
//! `examples/original_source/formatter/standard.py`'s `format_event`.

use super::{FormatInput, Formatter};

pub struct StandardFormatter;

impl Formatter for StandardFormatter {
    fn format(&self, input: &FormatInput) -> String {
        match input.event_type {
            "privmsg" | "pubmsg" => {
                format!("<{}> {}", input.adorned_nick(), input.args.first().map(String::as_str).unwrap_or(""))
            }
            "privnotice" | "pubnotice" => {
                format!(">{}< {}", input.adorned_nick(), input.args.first().map(String::as_str).unwrap_or(""))
            }
            "action" => format!("\u{2}* {}\u{2} {}", input.nick, input.args_joined()),
            "join" => format!("! {} join", input.nick),
            "topic" => format!(
                "! {} topic \"{}\"",
                input.nick,
                input.args.first().map(String::as_str).unwrap_or("")
            ),
            "kick" => format!(
                "! {} kick {} ({})",
                input.nick,
                input.args.first().map(String::as_str).unwrap_or(""),
                input.args.get(1).map(String::as_str).unwrap_or("")
            ),
            "mode" => format!("! {} mode {}", input.nick, input.args_joined()),
            "part" | "quit" => format!("! {} {} \"{}\"", input.nick, input.event_type, input.args_joined()),
            other => format!("! {} {} {}", input.nick, other, input.args_joined()),
        }
    }
}
