//! Post-processing: deterministic cleanup of vision-model output.
//!
//! Vision models occasionally wrap their answer in a code fence even when the
//! prompt says not to, answer with Windows line endings, or pad the text
//! with zero-width characters and runs of blank lines. None of that should
//! reach the speech synthesiser. Each rule is a pure `&str → String` pass.
//!
//! ## Rule Order
//!
//! Fences are stripped on the trimmed input before line endings are
//! normalised, so a fence followed by `\r\n` is still recognised.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to one raw vision response.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence (with or without a language tag)
/// 2. Normalise line endings (CRLF/CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 1
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, ...)
/// 6. Trim outer whitespace
///
/// An answer made only of whitespace and fences comes back empty; callers
/// treat that as an empty response.
pub fn clean_vision_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
