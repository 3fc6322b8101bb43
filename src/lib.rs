//! Resumable bulk deletion of old, low-engagement tweets from a Twitter/X
//! archive export.

pub mod archive;
pub mod config;
pub mod deleter;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod record;
pub mod retention;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{execute, DeletionOutcome, RunSummary};
