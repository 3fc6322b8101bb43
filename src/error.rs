use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Missing required config key `{0}`")]
    MissingKey(&'static str),
    #[error("Invalid value for `{key}`: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed archive: {0}")]
    Syntax(String),
    #[error("Malformed archive entry #{index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid field `{field}` in archive entry #{index}: {reason}")]
    Field {
        index: usize,
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed ledger {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Failed to build API client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
