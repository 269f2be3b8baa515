use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,;:])").unwrap());
static HORIZONTAL_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Collapse absorbed element text to a single line.
///
/// Control characters become spaces, whitespace runs collapse, and the space
/// in front of `. , ; :` is dropped.
pub fn normalize_inline(text: &str) -> String {
    let text = CONTROL_RE.replace_all(text, " ");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT_RE.replace_all(&text, "$1");
    text.trim().to_string()
}

/// The `text_clean` form stored next to `text_raw`. Keeps paragraph breaks.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = HORIZONTAL_WS_RE.replace_all(&text, " ");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Accumulates the pieces of one element's text.
///
/// Adjacent raw text is concatenated as-is. A finished child part is joined with
/// a single space when both sides of the join are alphanumeric, so that
/// `<p>foo</p><p>bar</p>` reads `foo bar` rather than `foobar`.
#[derive(Debug, Default)]
pub struct TextParts {
    buf: String,
    last_was_raw: bool,
}

impl TextParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.last_was_raw {
            self.buf.push_str(text);
        } else {
            self.join(text);
        }
        self.last_was_raw = true;
    }

    pub fn push_part(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.join(text);
        self.last_was_raw = false;
    }

    /// A child that contributes no text sits here. Raw text pushed next is
    /// joined, not glued to the run before it.
    pub fn mark_boundary(&mut self) {
        self.last_was_raw = false;
    }

    fn join(&mut self, text: &str) {
        let prev_alnum = self.buf.chars().last().is_some_and(char::is_alphanumeric);
        let next_alnum = text.chars().next().is_some_and(char::is_alphanumeric);
        if prev_alnum && next_alnum {
            self.buf.push(' ');
        }
        self.buf.push_str(text);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Normalized text of everything pushed so far.
    pub fn finish(self) -> String {
        normalize_inline(&self.buf)
    }
}
