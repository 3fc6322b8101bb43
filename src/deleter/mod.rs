pub mod oauth;
pub mod x;

use async_trait::async_trait;

/// Result of a single delete call. Per-tweet failures are values, never errors,
/// so one bad response cannot stop a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted: bool,
    pub message: String,
}

impl DeleteResult {
    pub fn deleted(message: impl Into<String>) -> Self {
        Self {
            deleted: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            deleted: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait StatusDeleter: Send + Sync {
    async fn delete(&self, status_id: u64) -> DeleteResult;
}

/// Reports every tweet as not deleted without calling the API.
pub struct DryRun;

#[async_trait]
impl StatusDeleter for DryRun {
    async fn delete(&self, status_id: u64) -> DeleteResult {
        tracing::debug!(status_id, "Dry run, skipping delete");
        DeleteResult::failed("Dry run, not deleted")
    }
}
