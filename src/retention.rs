use crate::config::Config;
use crate::record::Record;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    AlreadyDeleted,
    AfterCutoff,
    TooPopular,
}

/// Decides which archived tweets may be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub cutoff: DateTime<Utc>,
    pub favorite_threshold: u64,
    pub retweet_threshold: u64,
}

impl RetentionPolicy {
    /// The cutoff instant is midnight UTC at the start of `cutoff`.
    pub fn new(cutoff: NaiveDate, favorite_threshold: u64, retweet_threshold: u64) -> Self {
        Self {
            cutoff: cutoff.and_time(chrono::NaiveTime::MIN).and_utc(),
            favorite_threshold,
            retweet_threshold,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.cutoff,
            config.favorite_threshold,
            config.retweet_threshold,
        )
    }

    pub fn verdict(&self, record: &Record, prior_ids: &HashSet<String>) -> Verdict {
        if prior_ids.contains(&record.id) {
            return Verdict::AlreadyDeleted;
        }
        if record.created > self.cutoff {
            return Verdict::AfterCutoff;
        }
        if record.favorite_count < self.favorite_threshold
            && record.retweet_count < self.retweet_threshold
        {
            Verdict::Eligible
        } else {
            Verdict::TooPopular
        }
    }

    pub fn can_delete(&self, record: &Record, prior_ids: &HashSet<String>) -> bool {
        self.verdict(record, prior_ids) == Verdict::Eligible
    }
}
