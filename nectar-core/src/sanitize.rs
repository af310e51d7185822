//! Payload sanitization and repair.
//!
//! Every value the core caches or returns passes through here first.
//! The danger set is the control range that breaks JSON columns in the
//! downstream relational store: `U+0000–U+0008`, `U+000B–U+000C`,
//! `U+000E–U+001F`, `U+007F–U+009F`. Safe whitespace (tab, newline,
//! carriage return, space) is preserved in non-strict mode.
//!
//! Nothing in this module panics; malformed input degrades to empty or
//! sentinel values with a debug-level log.

use serde_json::Value;
use tracing::debug;

/// Policy knobs for [`sanitize_str`].
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// Strict mode removes every control code point, safe whitespace
    /// included, regardless of `preserve_whitespace`.
    pub strict: bool,
    /// Keep tab, newline, and carriage return (non-strict mode only).
    pub preserve_whitespace: bool,
    /// Replacement emitted for each removed code point.
    pub replacement: String,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            strict: false,
            preserve_whitespace: true,
            replacement: String::new(),
        }
    }
}

impl SanitizeOptions {
    /// Strict policy: every control code point removed, nothing preserved.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            strict: true,
            preserve_whitespace: false,
            replacement: String::new(),
        }
    }
}

/// C0 controls, DEL, and C1 controls.
const fn is_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

/// The subset of controls the downstream store cannot tolerate.
/// Excludes tab, newline, and carriage return.
const fn in_danger_set(c: char) -> bool {
    matches!(
        c,
        '\u{0000}'..='\u{0008}'
            | '\u{000B}'
            | '\u{000C}'
            | '\u{000E}'..='\u{001F}'
            | '\u{007F}'..='\u{009F}'
    )
}

const fn is_safe_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | ' ')
}

/// Remove control code points from `text` per the given policy.
#[must_use]
pub fn sanitize_str(text: &str, opts: &SanitizeOptions) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(text.len());
    let mut removed = 0usize;
    for c in text.chars() {
        if is_control(c) {
            if !opts.strict && opts.preserve_whitespace && is_safe_whitespace(c) {
                out.push(c);
            } else {
                out.push_str(&opts.replacement);
                removed += 1;
            }
        } else {
            out.push(c);
        }
    }
    if removed > 0 {
        debug!(
            target: "nectar::sanitize",
            removed,
            "removed control code points from string"
        );
    }
    out
}

/// Recursively sanitize every string leaf of a JSON value, keys included.
///
/// This is the canonical pre-storage step: arrays and objects are
/// recursed, non-string primitives pass through unchanged.
#[must_use]
pub fn sanitize_json_tree(value: &Value) -> Value {
    let opts = SanitizeOptions::default();
    sanitize_tree_with(value, &opts)
}

fn sanitize_tree_with(value: &Value, opts: &SanitizeOptions) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(s, opts)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| sanitize_tree_with(v, opts)).collect())
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(sanitize_str(key, opts), sanitize_tree_with(item, opts));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Sanitize a JSON text, repairing it when malformed.
///
/// Valid input parses, gets its tree sanitized, and is re-serialized in
/// compact form. Malformed input runs through [`repair_json`] and is
/// retried; if still unparseable the raw text is strict-sanitized and
/// returned as-is.
#[must_use]
pub fn sanitize_json_text(text: &str) -> String {
    if let Ok(tree) = serde_json::from_str::<Value>(text) {
        return to_compact(&sanitize_json_tree(&tree));
    }

    let repaired = repair_json(text);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(tree) => to_compact(&sanitize_json_tree(&tree)),
        Err(err) => {
            debug!(
                target: "nectar::sanitize",
                %err,
                "payload unrepairable, falling back to strict string sanitization"
            );
            sanitize_str(text, &SanitizeOptions::strict())
        }
    }
}

fn to_compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Sanitize a filename for storage as metadata.
///
/// Strict control removal, path-traversal sequences and separators
/// stripped, trimmed, truncated to 512 code points.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let cleaned = sanitize_str(name, &SanitizeOptions::strict());
    let cleaned = cleaned
        .replace("../", "")
        .replace("..\\", "")
        .replace(['/', '\\'], "");
    cleaned.trim().chars().take(512).collect()
}

/// Sanitize a URL: strict control removal, trimmed, truncated to 1024
/// code points.
#[must_use]
pub fn sanitize_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let cleaned = sanitize_str(url, &SanitizeOptions::strict());
    cleaned.trim().chars().take(1024).collect()
}

/// Check whether `text` is safe to hand to the downstream store.
///
/// Both raw danger-set code points and embedded JSON escape sequences
/// denoting them (`\u0000` through `\u009f`) must be absent, because the store
/// may re-serialize JSON to text and resurface the escape.
#[must_use]
pub fn is_safe_for_store(text: &str) -> bool {
    if text.chars().any(in_danger_set) {
        return false;
    }
    !contains_danger_escape(text)
}

fn contains_danger_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 5 < bytes.len() {
        if bytes[i] == b'\\' && (bytes[i + 1] == b'u' || bytes[i + 1] == b'U') {
            let hex = &bytes[i + 2..i + 6];
            if hex.iter().all(u8::is_ascii_hexdigit) {
                // All-ASCII slice, safe to decode.
                let hex = std::str::from_utf8(hex).unwrap_or("");
                if let Ok(code) = u32::from_str_radix(hex, 16)
                    && let Some(c) = char::from_u32(code)
                    && in_danger_set(c)
                {
                    return true;
                }
            }
        }
        i += 1;
    }
    false
}

// ---------------------------------------------------------------------------
// JSON repair heuristics
// ---------------------------------------------------------------------------

/// Best-effort repair of commonly malformed JSON.
///
/// Applies, in order: control-character removal, unescaped-quote
/// escaping, trailing-comma removal, unclosed-string closing, and
/// brace/bracket balancing. Each step is idempotent.
#[must_use]
pub fn repair_json(content: &str) -> String {
    let content = sanitize_str(content, &SanitizeOptions::default());
    let content = fix_unescaped_quotes(&content);
    let content = fix_trailing_commas(&content);
    let content = fix_unclosed_strings(&content);
    fix_unclosed_braces(&content)
}

fn count_unescaped_quotes(line: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => count += 1,
            _ => {}
        }
    }
    count
}

/// Escape stray quotes inside string values, line by line.
///
/// Targets lines of the form `"key": "value with "inner" quotes"` where
/// the unescaped quote count is odd.
fn fix_unescaped_quotes(content: &str) -> String {
    let mut lines = Vec::new();
    for line in content.split('\n') {
        let quotes = count_unescaped_quotes(line);
        if quotes % 2 == 1 && quotes >= 4 {
            if let Some(pos) = line.find(": \"") {
                let (head, value) = line.split_at(pos + 3);
                let fixed = if let Some(inner) = value.strip_suffix("\",") {
                    format!("{head}{}\",", inner.replace('"', "\\\""))
                } else if let Some(inner) = value.strip_suffix('"') {
                    format!("{head}{}\"", inner.replace('"', "\\\""))
                } else {
                    format!("{head}{}", value.replace('"', "\\\""))
                };
                lines.push(fixed);
                continue;
            }
        }
        lines.push(line.to_string());
    }
    lines.join("\n")
}

/// Drop commas that directly precede a closing brace or bracket.
fn fix_trailing_commas(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Close an unterminated string literal by appending a quote.
fn fix_unclosed_strings(content: &str) -> String {
    if count_unescaped_quotes(content) % 2 == 1 {
        let mut out = String::with_capacity(content.len() + 1);
        out.push_str(content);
        out.push('"');
        return out;
    }
    content.to_string()
}

/// Append missing closing braces/brackets in the order they were opened.
fn fix_unclosed_braces(content: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in content.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    if stack.is_empty() {
        return content.to_string();
    }
    let mut out = String::with_capacity(content.len() + stack.len());
    out.push_str(content);
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
