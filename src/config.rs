use crate::error::ConfigError;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CUTOFF_DATE_FORMAT: &str = "%Y/%m/%d";
pub const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com";

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    pub archive_path: PathBuf,
    pub ledger_path: PathBuf,
    pub favorite_threshold: u64,
    pub retweet_threshold: u64,
    /// Tweets created after the start of this day are always kept.
    pub cutoff: NaiveDate,
    pub api_base_url: String,
}

impl Config {
    /// Load from a `key=value` properties file, or a flat TOML table when the
    /// file name ends in `.toml`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml(&content)
        } else {
            Self::from_properties(&content)
        }
    }

    pub fn from_properties(content: &str) -> Result<Self, ConfigError> {
        Self::from_map(&parse_properties(content))
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = content.parse()?;
        let values: HashMap<String, String> = table
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        Self::from_map(&values)
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .ok_or(ConfigError::MissingKey(key))
        };

        let path = |key: &'static str| -> Result<PathBuf, ConfigError> {
            let value = required(key)?;
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key,
                    value,
                    reason: "path is empty".to_string(),
                });
            }
            Ok(PathBuf::from(value))
        };

        let threshold = |key: &'static str| -> Result<u64, ConfigError> {
            let value = required(key)?;
            value.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
                value,
            })
        };

        let cutoff_value = required("cutOffDate")?;
        let cutoff = NaiveDate::parse_from_str(&cutoff_value, CUTOFF_DATE_FORMAT).map_err(|e| {
            ConfigError::InvalidValue {
                key: "cutOffDate",
                value: cutoff_value.clone(),
                reason: format!("{} (expected yyyy/MM/dd)", e),
            }
        })?;

        Ok(Self {
            consumer_key: required("consumerKey")?,
            consumer_secret: required("consumerSecret")?,
            access_token: required("accessToken")?,
            access_token_secret: required("accessTokenSecret")?,
            archive_path: path("tweetsToDeletePath")?,
            ledger_path: path("deletedTweetsPath")?,
            favorite_threshold: threshold("favoritesThreshold")?,
            retweet_threshold: threshold("retweetsThreshold")?,
            cutoff,
            api_base_url: values
                .get("apiBaseUrl")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &redact(&self.consumer_secret))
            .field("access_token", &redact(&self.access_token))
            .field("access_token_secret", &redact(&self.access_token_secret))
            .field("archive_path", &self.archive_path)
            .field("ledger_path", &self.ledger_path)
            .field("favorite_threshold", &self.favorite_threshold)
            .field("retweet_threshold", &self.retweet_threshold)
            .field("cutoff", &self.cutoff.format(CUTOFF_DATE_FORMAT).to_string())
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Parse Java-style properties: one `key=value` (or `key:value`) per logical
/// line, `#` and `!` start comments. A line ending in an odd number of
/// backslashes continues on the next one, and backslash escapes (`\\`, `\=`,
/// `\:`, `\t`, `\n`, `\uXXXX`, ...) are decoded in keys and values. Later keys
/// win.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut logical = line.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        if let Some((key, value)) = split_key_value(&logical) {
            values.insert(unescape(key.trim()), unescape(value.trim()));
        }
    }
    values
}

fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// Split on the first `=` or `:` that is not escaped.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '=' | ':' => return Some((&line[..i], &line[i + 1..])),
            _ => {}
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = Some(&hex)
                    .filter(|h| h.len() == 4 && h.chars().all(|c| c.is_ascii_hexdigit()))
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    None => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
