//! Worker output cleanup
//!
//! The worker writes colourised text and ends every reply with a `>` prompt.
//! Both are terminal artefacts and are removed before a response is handed out.

use regex::Regex;
use std::sync::OnceLock;

/// Character the worker prints when it is ready for the next line
pub const PROMPT_MARKER: char = '>';

fn escape_sequence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // CSI sequences: ESC [ params intermediates final-byte (covers SGR colour codes)
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("escape pattern is valid"))
}

fn trailing_prompt() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*>\s*$").expect("prompt pattern is valid"))
}

/// Strip escape sequences and the trailing prompt, then trim.
pub fn sanitize(raw: &str) -> String {
    let without_escapes = escape_sequence().replace_all(raw, "");
    let without_prompt = trailing_prompt().replace(&without_escapes, "");
    without_prompt.trim().to_string()
}

/// Whether `text` is nothing but the prompt marker
pub fn is_bare_prompt(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some(PROMPT_MARKER) && chars.next().is_none()
}
