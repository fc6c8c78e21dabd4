use anyhow::{Context, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

/// Return the body of the first fenced code block, or the trimmed input when
/// there is none.
pub fn strip_code_fences(raw: &str) -> &str {
    match FENCED_BLOCK.captures(raw).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => raw.trim(),
    }
}

/// Parse JSON out of a model reply, tolerating code fences and prose around
/// a single top-level object.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = strip_code_fences(raw);

    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let object = body
                .find('{')
                .zip(body.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &body[start..=end]);

            match object {
                Some(object) if object.len() < body.len() => serde_json::from_str(object)
                    .context("Model output is not valid JSON"),
                _ => Err(first_err).context("Model output is not valid JSON"),
            }
        }
    }
}

/// Truncate to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
