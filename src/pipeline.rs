use crate::archive::ArchiveReader;
use crate::config::Config;
use crate::deleter::x::XClient;
use crate::deleter::{DryRun, StatusDeleter};
use crate::error::{ArchiveError, Result};
use crate::ledger::{self, LedgerWriter};
use crate::record::Record;
use crate::retention::{RetentionPolicy, Verdict};
use std::collections::HashSet;
use std::fmt;

/// What happened to one eligible tweet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    /// Position among eligible tweets, starting at zero.
    pub index: usize,
    pub record_id: String,
    pub deleted: bool,
    pub message: String,
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} tweet {}: {} ({})",
            self.index,
            self.record_id,
            if self.deleted { "deleted" } else { "kept" },
            self.message
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub eligible: usize,
    pub deleted: usize,
    pub failed: usize,
}

pub struct Pipeline<'a> {
    policy: RetentionPolicy,
    prior_ids: HashSet<String>,
    deleter: &'a dyn StatusDeleter,
    ledger: LedgerWriter,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        policy: RetentionPolicy,
        prior_ids: HashSet<String>,
        deleter: &'a dyn StatusDeleter,
        ledger: LedgerWriter,
    ) -> Self {
        Self {
            policy,
            prior_ids,
            deleter,
            ledger,
        }
    }

    /// Stream `records` in order, deleting the eligible ones and recording each
    /// success in the ledger before moving on. The first archive error aborts
    /// the run; rows already appended stay in the ledger.
    pub async fn run<I, F>(mut self, records: I, mut report: F) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<Record, ArchiveError>>,
        F: FnMut(&DeletionOutcome),
    {
        let mut summary = RunSummary::default();

        for record in records {
            let record = record?;
            summary.scanned += 1;

            let verdict = self.policy.verdict(&record, &self.prior_ids);
            if verdict != Verdict::Eligible {
                tracing::trace!(id = %record.id, ?verdict, "Skipping tweet");
                continue;
            }

            let index = summary.eligible;
            summary.eligible += 1;

            let result = self.deleter.delete(record.status_id).await;
            let outcome = DeletionOutcome {
                index,
                record_id: record.id.clone(),
                deleted: result.deleted,
                message: result.message,
            };
            report(&outcome);

            if outcome.deleted {
                self.ledger.append(&record)?;
                summary.deleted += 1;
            } else {
                tracing::warn!(id = %record.id, message = %outcome.message, "Tweet not deleted");
                summary.failed += 1;
            }
        }

        self.ledger.finish()?;
        Ok(summary)
    }
}

/// Load the ledger, open the archive and run the pipeline for `config`.
pub async fn execute<F>(config: &Config, dry_run: bool, report: F) -> Result<RunSummary>
where
    F: FnMut(&DeletionOutcome),
{
    let deleter: Box<dyn StatusDeleter> = if dry_run {
        Box::new(DryRun)
    } else {
        Box::new(XClient::from_config(config)?)
    };

    let prior_ids = ledger::load_ids(&config.ledger_path)?;
    tracing::info!(
        count = prior_ids.len(),
        ledger = %config.ledger_path.display(),
        "Loaded previously deleted tweets"
    );

    let records = ArchiveReader::open(&config.archive_path)?;
    let writer = LedgerWriter::open(&config.ledger_path)?;

    let summary = Pipeline::new(
        RetentionPolicy::from_config(config),
        prior_ids,
        deleter.as_ref(),
        writer,
    )
    .run(records, report)
    .await?;

    tracing::info!(
        scanned = summary.scanned,
        eligible = summary.eligible,
        deleted = summary.deleted,
        failed = summary.failed,
        "Run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deleter::DeleteResult;
    use crate::error::Error;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Deletes everything unless a scripted result says otherwise.
    #[derive(Default)]
    struct FakeDeleter {
        scripted: HashMap<u64, DeleteResult>,
        calls: Mutex<Vec<u64>>,
    }

    impl FakeDeleter {
        fn with(mut self, id: u64, result: DeleteResult) -> Self {
            self.scripted.insert(id, result);
            self
        }

        fn calls(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusDeleter for FakeDeleter {
        async fn delete(&self, status_id: u64) -> DeleteResult {
            self.calls.lock().unwrap().push(status_id);
            self.scripted
                .get(&status_id)
                .cloned()
                .unwrap_or_else(|| DeleteResult::deleted("Deleted"))
        }
    }

    fn entry(id: u64, created_at: &str, favorites: u64, retweets: u64) -> String {
        format!(
            r#"{{"tweet": {{"id": "{}", "full_text": "tweet {}", "created_at": "{}", "retweet_count": "{}", "favorite_count": "{}", "lang": "en"}}}}"#,
            id, id, created_at, retweets, favorites
        )
    }

    fn archive(entries: &[String]) -> String {
        format!("[\n{}\n]", entries.join(",\n"))
    }

    const JUNE_2019: &str = "Sat Jun 01 12:00:00 +0000 2019";
    const JAN_2021: &str = "Fri Jan 01 12:00:00 +0000 2021";

    fn policy() -> RetentionPolicy {
        RetentionPolicy::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 10, 10)
    }

    async fn run_once(
        archive: &str,
        ledger_path: &Path,
        deleter: &FakeDeleter,
    ) -> (Result<RunSummary>, Vec<DeletionOutcome>) {
        let prior = ledger::load_ids(ledger_path).unwrap();
        let writer = LedgerWriter::open(ledger_path).unwrap();
        let mut outcomes = Vec::new();
        let result = Pipeline::new(policy(), prior, deleter, writer)
            .run(ArchiveReader::new(archive.as_bytes()), |o| {
                outcomes.push(o.clone())
            })
            .await;
        (result, outcomes)
    }

    fn ledger_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_only_eligible_tweets_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("deleted.csv");
        let input = archive(&[
            entry(1, JUNE_2019, 5, 2),
            entry(2, JUNE_2019, 50, 2),
            entry(3, JAN_2021, 0, 0),
        ]);
        let deleter = FakeDeleter::default();

        let (result, outcomes) = run_once(&input, &ledger_path, &deleter).await;
        let summary = result.unwrap();

        assert_eq!(deleter.calls(), vec![1]);
        assert_eq!(
            summary,
            RunSummary {
                scanned: 3,
                eligible: 1,
                deleted: 1,
                failed: 0
            }
        );
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].index, 0);
        assert_eq!(outcomes[0].record_id, "1");

        let lines = ledger_lines(&ledger_path);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("id:1,"));
    }

    #[tokio::test]
    async fn test_not_found_is_recorded_in_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("deleted.csv");
        let input = archive(&[entry(7, JUNE_2019, 0, 0)]);
        let deleter =
            FakeDeleter::default().with(7, DeleteResult::deleted("Already gone: Not found"));

        let (result, outcomes) = run_once(&input, &ledger_path, &deleter).await;
        assert_eq!(result.unwrap().deleted, 1);
        assert!(outcomes[0].deleted);
        assert!(ledger::load_ids(&ledger_path).unwrap().contains("7"));
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("deleted.csv");
        let input = archive(&[entry(1, JUNE_2019, 0, 0), entry(2, JUNE_2019, 0, 0)]);
        let deleter = FakeDeleter::default().with(1, DeleteResult::failed("rate limited"));

        let (result, outcomes) = run_once(&input, &ledger_path, &deleter).await;
        let summary = result.unwrap();

        assert_eq!(deleter.calls(), vec![1, 2]);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(
            outcomes[0],
            DeletionOutcome {
                index: 0,
                record_id: "1".to_string(),
                deleted: false,
                message: "rate limited".to_string(),
            }
        );
        assert_eq!(outcomes[1].index, 1);

        let ids = ledger::load_ids(&ledger_path).unwrap();
        assert_eq!(ids, HashSet::from(["2".to_string()]));
    }

    #[tokio::test]
    async fn test_second_run_deletes_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("deleted.csv");
        let input = archive(&[
            entry(1, JUNE_2019, 0, 0),
            entry(2, JUNE_2019, 0, 0),
            entry(3, JUNE_2019, 99, 0),
        ]);

        let first = FakeDeleter::default();
        let (result, _) = run_once(&input, &ledger_path, &first).await;
        assert_eq!(result.unwrap().deleted, 2);
        let after_first = ledger_lines(&ledger_path);

        let second = FakeDeleter::default();
        let (result, outcomes) = run_once(&input, &ledger_path, &second).await;
        let summary = result.unwrap();

        assert!(second.calls().is_empty());
        assert!(outcomes.is_empty());
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.eligible, 0);
        assert_eq!(ledger_lines(&ledger_path), after_first);
    }

    #[tokio::test]
    async fn test_resumes_after_failed_deletions() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("deleted.csv");
        let input = archive(&[entry(1, JUNE_2019, 0, 0), entry(2, JUNE_2019, 0, 0)]);

        let first = FakeDeleter::default().with(2, DeleteResult::failed("rate limited"));
        run_once(&input, &ledger_path, &first).await.0.unwrap();

        let second = FakeDeleter::default();
        run_once(&input, &ledger_path, &second).await.0.unwrap();

        assert_eq!(second.calls(), vec![2]);
        assert_eq!(ledger_lines(&ledger_path).len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_entry_aborts_but_keeps_ledger_rows() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("deleted.csv");
        let input = archive(&[
            entry(1, JUNE_2019, 0, 0),
            r#"{"tweet": {"id": "2", "full_text": "no counts"}}"#.to_string(),
            entry(3, JUNE_2019, 0, 0),
        ]);
        let deleter = FakeDeleter::default();

        let (result, _) = run_once(&input, &ledger_path, &deleter).await;

        assert!(matches!(
            result,
            Err(Error::Archive(ArchiveError::Entry { index: 1, .. }))
        ));
        assert_eq!(deleter.calls(), vec![1]);
        assert_eq!(ledger_lines(&ledger_path).len(), 1);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = DeletionOutcome {
            index: 3,
            record_id: "42".to_string(),
            deleted: false,
            message: "rate limited".to_string(),
        };
        assert_eq!(outcome.to_string(), "#3 tweet 42: kept (rate limited)");
    }

    #[tokio::test]
    async fn test_execute_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("tweets.js");
        let ledger_path = dir.path().join("out").join("deleted.csv");
        std::fs::write(
            &archive_path,
            format!(
                "window.YTD.tweets.part0 = {}",
                archive(&[entry(1, JUNE_2019, 0, 0), entry(2, JAN_2021, 0, 0)])
            ),
        )
        .unwrap();

        let config = Config {
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            access_token: "at".to_string(),
            access_token_secret: "ats".to_string(),
            archive_path,
            ledger_path: ledger_path.clone(),
            favorite_threshold: 10,
            retweet_threshold: 10,
            cutoff: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            api_base_url: "http://127.0.0.1:1".to_string(),
        };

        let mut outcomes = Vec::new();
        let summary = execute(&config, true, |o| outcomes.push(o.clone()))
            .await
            .unwrap();

        assert_eq!(summary.eligible, 1);
        assert_eq!(summary.deleted, 0);
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].deleted);
        assert!(ledger_path.exists());
        assert!(ledger_lines(&ledger_path).is_empty());
    }

    #[tokio::test]
    async fn test_execute_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            access_token: "at".to_string(),
            access_token_secret: "ats".to_string(),
            archive_path: dir.path().join("missing.json"),
            ledger_path: dir.path().join("deleted.csv"),
            favorite_threshold: 10,
            retweet_threshold: 10,
            cutoff: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            api_base_url: "http://127.0.0.1:1".to_string(),
        };

        let result = execute(&config, true, |_| {}).await;
        assert!(matches!(result, Err(Error::Archive(ArchiveError::Open { .. }))));
    }
}
