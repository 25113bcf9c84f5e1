//! Rendering of outbound traffic for debug logs. Credentials never reach the
//! log when redaction is on, and bodies are cut to a bounded length.

use reqwest::Url;
use reqwest::header::HeaderValue;
use serde_json::Value;

pub const REDACTED: &str = "***REDACTED***";

const SENSITIVE_KEYS: [&str; 9] = [
    "key",
    "api_key",
    "apikey",
    "token",
    "access_token",
    "authorization",
    "secret",
    "password",
    "x-api-key",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl HttpDebugConfig {
    pub const DEFAULT_MAX_BODY_CHARS: usize = 4_000;

    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: Self::DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }

    pub fn show_url(&self, url: &Url) -> String {
        if !self.redact_secrets || url.query().is_none() {
            return url.as_str().to_string();
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let shown = if is_sensitive(&key) {
                    REDACTED.to_string()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), shown)
            })
            .collect();

        let mut shown = url.clone();
        shown.set_query(None);
        if !pairs.is_empty() {
            let mut query = shown.query_pairs_mut();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
        }
        shown.as_str().to_string()
    }

    pub fn show_header(&self, name: &str, value: &HeaderValue) -> String {
        if self.redact_secrets && is_sensitive(name) {
            return REDACTED.to_string();
        }
        value
            .to_str()
            .map(str::to_string)
            .unwrap_or_else(|_| "<non-utf8>".to_string())
    }

    /// Redacts sensitive JSON keys at any depth, then truncates. Non-JSON
    /// bodies are only truncated.
    pub fn show_body(&self, raw: &str) -> String {
        let body = if self.redact_secrets {
            match serde_json::from_str::<Value>(raw) {
                Ok(mut json) => {
                    redact_json(&mut json);
                    serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
                }
                Err(_) => raw.to_string(),
            }
        } else {
            raw.to_string()
        };
        truncate(&body, self.max_body_chars)
    }
}

fn truncate(input: &str, max_chars: usize) -> String {
    let count = input.chars().count();
    if count <= max_chars {
        return input.to_string();
    }
    let head: String = input.chars().take(max_chars).collect();
    format!("{head}... <truncated {} chars>", count - max_chars)
}

fn redact_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if is_sensitive(key) {
                    *item = Value::String(REDACTED.to_string());
                } else {
                    redact_json(item);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(key))
}
