//! Per-network lossy text encoding, for bridging networks that don't all
//! speak UTF-8 on the wire.
//!
//! Wraps `encoding_rs` (the same crate `slirc-proto` pulls in internally for
//! `line::LineCodec`, but keeps private) the way that codec wraps it: decode
//! is always lossy (unmappable sequences become U+FFFD), but encode needs to
//! go further than `encoding_rs`'s single-replacement-character behavior to
//! match what networks bridged from the original implementation expect —
//! unmappable characters are substituted with a numeric character reference
//! (`&#<codepoint>;`), mirroring Python's `str.encode(enc, 'xmlcharrefreplace')`.

use encoding_rs::Encoding;

/// A network's configured text encoding, defaulting to UTF-8.
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    encoding: &'static Encoding,
}

impl Default for TextCodec {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
        }
    }
}

impl TextCodec {
    /// Resolve an encoding by its label (e.g. `"utf-8"`, `"iso-8859-1"`,
    /// `"shift_jis"`). Unknown labels fall back to UTF-8.
    pub fn for_label(label: &str) -> Self {
        Self {
            encoding: Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8),
        }
    }

    /// Decode raw bytes off the wire into a `String`, lossily substituting
    /// malformed sequences with U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (cow, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        cow.into_owned()
    }

    /// Encode text for the wire. Characters the target encoding can't
    /// represent are replaced one at a time with their numeric character
    /// reference rather than `encoding_rs`'s default single-byte substitute,
    /// so the receiving network still gets readable ASCII for the
    /// unmappable span instead of a run of `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        if self.encoding == encoding_rs::UTF_8 {
            return text.as_bytes().to_vec();
        }

        let mut out = Vec::with_capacity(text.len());
        for ch in text.chars() {
            let mut buf = [0u8; 4];
            let s = ch.encode_utf8(&mut buf);
            let (encoded, _enc, had_errors) = self.encoding.encode(s);
            if had_errors {
                out.extend_from_slice(format!("&#{};", ch as u32).as_bytes());
            } else {
                out.extend_from_slice(&encoded);
            }
        }
        out
    }

    /// The underlying `encoding_rs` label, for logging/config round-trips.
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Rewrite `text` so every character the target encoding can't
    /// represent is replaced by its numeric character reference, leaving
    /// representable characters untouched. Unlike [`TextCodec::encode`],
    /// this returns a `String` (not target-charset bytes): it's meant to
    /// run before the wire codec's own per-network encode step (which
    /// `slirc_proto::Transport` performs internally and does not expose a
    /// hook into), so that step sees only characters it can already
    /// represent and never falls back to its own lossy substitution.
    pub fn sanitize_for_wire(&self, text: &str) -> String {
        if self.encoding == encoding_rs::UTF_8 {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            let mut buf = [0u8; 4];
            let s = ch.encode_utf8(&mut buf);
            let (_, _enc, had_errors) = self.encoding.encode(s);
            if had_errors {
                out.push_str(&format!("&#{};", ch as u32));
            } else {
                out.push(ch);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_utf8() {
        let codec = TextCodec::default();
        assert_eq!(codec.name(), "UTF-8");
    }

    #[test]
    fn unknown_label_falls_back_to_utf8() {
        let codec = TextCodec::for_label("not-a-real-encoding");
        assert_eq!(codec.name(), "UTF-8");
    }

    #[test]
    fn utf8_round_trips_exactly() {
        let codec = TextCodec::default();
        let text = "héllo wörld 日本語";
        let bytes = codec.encode(text);
        assert_eq!(codec.decode(&bytes), text);
    }

    #[test]
    fn latin1_encode_substitutes_unmappable_chars_with_numeric_refs() {
        let codec = TextCodec::for_label("iso-8859-1");
        let bytes = codec.encode("caf\u{e9} \u{65e5}");
        let s = String::from_utf8_lossy(&bytes);
        assert!(s.contains("caf"));
        assert!(s.contains("&#26085;"));
    }

    #[test]
    fn sanitize_for_wire_leaves_representable_chars_as_unicode() {
        let codec = TextCodec::for_label("iso-8859-1");
        let sanitized = codec.sanitize_for_wire("caf\u{e9} \u{65e5}");
        assert_eq!(sanitized, "caf\u{e9} &#26085;");
    }

    #[test]
    fn decode_is_lossy_for_malformed_sequences() {
        let codec = TextCodec::default();
        let malformed = [0xff, 0xfe, b'h', b'i'];
        let decoded = codec.decode(&malformed);
        assert!(decoded.ends_with("hi"));
    }
}
