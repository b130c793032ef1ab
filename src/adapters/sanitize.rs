//! Log sanitization for exposure notification secrets.
//!
//! Log lines must never carry material that links a device to a test result
//! or to its diagnosis keys. This module redacts:
//! - Registration tokens (GUIDs)
//! - TANs
//! - Temporary exposure keys (base64, 16 bytes)
//! - Hex encoded key material and digests
//! - `token=`/`key=` style contextual secrets
//!
//! # Performance / DoS
//!
//! `sanitize()` caps its input size (see `EXPOSURE_RISK_SANITIZE_MAX_BYTES`).

use regex::{Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static SECRET_PATTERNS: OnceLock<SecretPatterns> = OnceLock::new();

/// Defaults to 16 KiB; can be overridden via `EXPOSURE_RISK_SANITIZE_MAX_BYTES`.
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

struct SecretPattern {
    regex: Regex,
    replacement: &'static str,
}

struct SecretPatterns {
    set: RegexSet,
    patterns: Vec<SecretPattern>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }

    let mut end = max_bytes.min(input.len());
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("EXPOSURE_RISK_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn get_patterns() -> &'static SecretPatterns {
    SECRET_PATTERNS.get_or_init(|| {
        // Order matters: contextual rules run before the broad ones.
        let rules: Vec<(&'static str, &'static str)> = vec![
            (
                r"(?i)\b(?:registration[_-]?token|token|tan|key|signature)\b\s*[:=]\s*[A-Za-z0-9+/_-]{10,}={0,2}",
                "[REDACTED-SECRET]",
            ),
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-TOKEN]",
            ),
            // TAN alphabet excludes 0, 1, I, L and O
            (r"\b[2-9A-HJKMNP-Z]{10}\b", "[REDACTED-TAN]"),
            (r"\b[A-Za-z0-9+/]{22}==", "[REDACTED-KEY]"),
            (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
        ];

        let set = RegexSet::new(rules.iter().map(|(p, _)| *p)).expect("Valid regex set");
        let patterns = rules
            .into_iter()
            .map(|(pattern, replacement)| SecretPattern {
                regex: Regex::new(pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        SecretPatterns { set, patterns }
    })
}

/// Sanitize a string by replacing secret patterns.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = get_patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in patterns.set.matches(prefix).into_iter() {
        let pattern = &patterns.patterns[idx];
        result = pattern
            .regex
            .replace_all(&result, pattern.replacement)
            .to_string();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check if a string contains something `sanitize()` would redact.
#[must_use]
pub fn contains_secret(input: &str) -> bool {
    let (prefix, _truncated) = truncate_to_char_boundary(input, max_sanitize_bytes());
    get_patterns().set.is_match(prefix)
}

/// A `tracing_subscriber` writer wrapper that sanitizes formatted log output
/// before it is written to the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            let sanitized = sanitize(&String::from_utf8_lossy(&line));
            self.inner.write_all(sanitized.as_bytes())?;
        }
        Ok(())
    }
}

impl<W> std::io::Write for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A line without newline is not buffered forever.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.inner.write_all(b"\n[TRUNCATED]\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;

        if !self.buffer.is_empty() {
            let sanitized = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(sanitized.as_bytes())?;
            self.buffer.clear();
        }

        self.inner.flush()
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sanitize_registration_token() {
        let sanitized = sanitize("Polling with 550e8400-e29b-41d4-a716-446655440000");
        assert!(sanitized.contains("[REDACTED-TOKEN]"));
        assert!(!sanitized.contains("550e8400"));
    }

    #[test]
    fn test_sanitize_tan() {
        let sanitized = sanitize("Submitting TAN 3HKRT9WXZ2 now");
        assert_eq!(sanitized, "Submitting TAN [REDACTED-TAN] now");
    }

    #[test]
    fn test_sanitize_temporary_exposure_key() {
        let sanitized = sanitize("Key data z5qO7hBYBf9AknN7ewzORw==, rolling period 144");
        assert!(sanitized.contains("[REDACTED-KEY]"));
        assert!(!sanitized.contains("z5qO7hBYBf9AknN7ewzORw"));
    }

    #[test]
    fn test_sanitize_hex_digest() {
        let input = "Package 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08 written";
        let sanitized = sanitize(input);
        assert_eq!(sanitized, "Package [REDACTED-KEY] written");
    }

    #[test]
    fn test_sanitize_contextual_secret() {
        let sanitized = sanitize("registrationToken=abcdefghijklmnop");
        assert!(sanitized.contains("[REDACTED-SECRET]"));
    }

    #[test]
    fn test_plain_text_untouched() {
        let input = "Risk calculated: INCREASED for region DE";
        assert_eq!(sanitize(input), input);
        assert!(!contains_secret(input));
        assert!(contains_secret("token: 0123456789abcdef"));
    }

    #[test]
    fn test_sanitize_truncates_large_inputs() {
        let input = "prefix 0123456789abcdef0123456789abcdef suffix";
        let sanitized = sanitize_with_limit(input, 16);
        assert!(sanitized.ends_with("[TRUNCATED]"));
        assert!(sanitized.starts_with("prefix 012345678"));
    }

    #[test]
    fn test_writer_sanitizes_lines() {
        let mut out = Vec::new();
        {
            let mut writer = SanitizingWriter::new(&mut out);
            writer
                .write_all(b"token = 550e8400-e29b-41d4-a716-446655440000\nsecond ")
                .expect("Should write");
            writer.write_all(b"line\n").expect("Should write");
            writer.flush().expect("Should flush");
        }

        let written = String::from_utf8(out).expect("Valid UTF-8");
        assert_eq!(written, "[REDACTED-SECRET]\nsecond line\n");
    }
}
