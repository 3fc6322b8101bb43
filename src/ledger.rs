//! Append-only CSV ledger of deleted tweets.
//!
//! Each row carries its own keys as `field:value` cells, so rows written by
//! older versions with a different field set still load.

use crate::error::LedgerError;
use crate::record::Record;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Encode a record as ledger cells in the record's field order.
pub fn encode_row(record: &Record) -> Vec<String> {
    record
        .fields()
        .into_iter()
        .map(|(name, value)| format!("{}:{}", name, value))
        .collect()
}

/// Decode a ledger row back into its field map. Cells are split on the first
/// `:` only; cells without one are dropped.
pub fn decode_row(row: &csv::StringRecord) -> HashMap<String, String> {
    row.iter()
        .filter_map(|cell| cell.split_once(':'))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Read the ids of every previously deleted tweet, creating an empty ledger
/// if none exists yet.
pub fn load_ids(path: impl AsRef<Path>) -> Result<HashSet<String>, LedgerError> {
    let path = path.as_ref();
    let io_err = |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        File::create(path).map_err(io_err)?;
        tracing::info!(path = %path.display(), "Created empty ledger");
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LedgerError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut ids = HashSet::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|source| LedgerError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        match decode_row(&row).remove("id") {
            Some(id) => {
                ids.insert(id);
            }
            None => tracing::warn!(row = line + 1, "Ledger row has no id, ignoring"),
        }
    }

    tracing::debug!(path = %path.display(), count = ids.len(), "Loaded ledger");
    Ok(ids)
}

/// Appends one flushed row per deleted tweet.
pub struct LedgerWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl LedgerWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| LedgerError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        // A run killed mid-row leaves no terminator; start a fresh line so the
        // next row is not glued onto it.
        if ends_without_newline(&mut file).map_err(io_err)? {
            tracing::warn!(path = %path.display(), "Ledger ends with an unterminated row");
            file.write_all(b"\n").map_err(io_err)?;
        }

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        Ok(Self { path, writer })
    }

    pub fn append(&mut self, record: &Record) -> Result<(), LedgerError> {
        self.writer
            .write_record(encode_row(record))
            .map_err(|source| LedgerError::Csv {
                path: self.path.clone(),
                source,
            })?;
        self.writer.flush().map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn finish(mut self) -> Result<(), LedgerError> {
        self.writer.flush().map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn ends_without_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
