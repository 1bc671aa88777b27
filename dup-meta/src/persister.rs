//! Durable persistence of staged duplication state.
//!
//! The [`MetaPersister`] is the only component writing duplication state to the meta store.
//! It writes what is staged in a [`DuplicationInfo`] and commits the staged values back into
//! it once the write succeeded. A failed write leaves the stage untouched, so the next flush
//! retries it.

use bytes::Bytes;
use dup_config::shared::DuplicationConfig;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::duplication::info::DuplicationInfo;
use crate::duplication::status::DuplicationStatus;
use crate::error::{DupError, DupResult, ErrorKind};
use crate::metrics::{APP_ID, DUP_ID, DUP_PERSIST_FAILURES_TOTAL, TARGET, register_metrics};
use crate::store::base::MetaStore;
use crate::store::path::progress_path;
use crate::types::{Decree, PartitionIndex};
use crate::dup_error;
#[cfg(feature = "failpoints")]
use crate::failpoints::{
    PERSIST_PROGRESS_BEFORE_WRITE, PERSIST_STATUS_BEFORE_WRITE, dup_fail_point,
};

/// What a write persists, used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteTarget {
    Status,
    Progress,
}

impl WriteTarget {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Progress => "progress",
        }
    }
}

/// Result of flushing one duplication.
#[derive(Debug, Default)]
pub struct FlushOutcome {
    /// The status committed by this flush, if a staged status was persisted.
    pub committed_status: Option<DuplicationStatus>,
    /// Partitions whose progress was persisted, with the decree written for each.
    pub persisted_progress: Vec<(PartitionIndex, Decree)>,
    /// Writes that failed after exhausting their retries. Their stages are left pending.
    pub errors: Vec<DupError>,
}

/// Writes staged duplication state to a [`MetaStore`] and commits it on success.
#[derive(Debug, Clone)]
pub struct MetaPersister<S> {
    store: S,
    config: Arc<DuplicationConfig>,
}

impl<S> MetaPersister<S>
where
    S: MetaStore + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, config: Arc<DuplicationConfig>) -> Self {
        register_metrics();

        Self { store, config }
    }

    /// Persists the staged status and the due progress of `dup`.
    ///
    /// Status and progress are written independently, a failure of one does not prevent the
    /// other from being persisted.
    pub async fn flush_entry(&self, dup: &DuplicationInfo, now_ms: u64) -> FlushOutcome {
        let _flush_guard = dup.lock_flush().await;
        let mut outcome = FlushOutcome::default();

        match self.flush_status(dup).await {
            Ok(committed_status) => outcome.committed_status = committed_status,
            Err(err) => outcome.errors.push(err),
        }

        // Progress of a removed duplication is deleted together with it.
        if dup.status().await == DuplicationStatus::Removed {
            return outcome;
        }

        let due = dup
            .progress_to_persist(now_ms, self.config.progress_update_period_ms)
            .await;
        for (partition_index, decree) in due {
            match self.flush_progress(dup, partition_index, decree).await {
                Ok(()) => outcome.persisted_progress.push((partition_index, decree)),
                Err(err) => outcome.errors.push(err),
            }
        }

        outcome
    }

    async fn flush_status(&self, dup: &DuplicationInfo) -> DupResult<Option<DuplicationStatus>> {
        if !dup.is_altering().await {
            return Ok(None);
        }

        // No other status change can be staged until this one is committed, so the blob and
        // the commit below refer to the same stage.
        let blob = dup.to_json_blob().await?;
        self.write_with_retry(dup, WriteTarget::Status, &dup.store_path, blob)
            .await?;

        Ok(dup.persist_status().await)
    }

    async fn flush_progress(
        &self,
        dup: &DuplicationInfo,
        partition_index: PartitionIndex,
        decree: Decree,
    ) -> DupResult<()> {
        let path = progress_path(&dup.store_path, partition_index);
        let value = Bytes::from(decree.to_string());
        self.write_with_retry(dup, WriteTarget::Progress, &path, value)
            .await?;

        dup.persist_progress(partition_index, decree).await;

        debug!(
            app_id = dup.app_id,
            dup_id = dup.id,
            partition = partition_index,
            "persisted progress at decree {decree}"
        );

        Ok(())
    }

    /// Writes `value` at `path`, retrying with exponential backoff as configured.
    async fn write_with_retry(
        &self,
        dup: &DuplicationInfo,
        target: WriteTarget,
        path: &str,
        value: Bytes,
    ) -> DupResult<()> {
        let retry = &self.config.retry;
        let mut attempt = 1;
        loop {
            match self.write(target, path, value.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    counter!(
                        DUP_PERSIST_FAILURES_TOTAL,
                        APP_ID => dup.app_id.to_string(),
                        DUP_ID => dup.id.to_string(),
                        TARGET => target.as_str()
                    )
                    .increment(1);

                    if attempt >= retry.max_attempts {
                        warn!(
                            app_id = dup.app_id,
                            dup_id = dup.id,
                            error = %err,
                            "giving up writing {} to {path} after {attempt} attempts, will retry on next flush",
                            target.as_str()
                        );

                        return Err(dup_error!(
                            ErrorKind::PersistenceFailure,
                            "Failed to write duplication state to the meta store",
                            format!("{} write to {path} failed: {err}", target.as_str())
                        ));
                    }

                    let delay = retry.delay_for_attempt(attempt);
                    warn!(
                        app_id = dup.app_id,
                        dup_id = dup.id,
                        error = %err,
                        "failed to write {} to {path}, retrying in {delay:?}",
                        target.as_str()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn write(&self, target: WriteTarget, path: &str, value: Bytes) -> DupResult<()> {
        #[cfg(feature = "failpoints")]
        match target {
            WriteTarget::Status => dup_fail_point(PERSIST_STATUS_BEFORE_WRITE)?,
            WriteTarget::Progress => dup_fail_point(PERSIST_PROGRESS_BEFORE_WRITE)?,
        }
        #[cfg(not(feature = "failpoints"))]
        let _ = target;

        self.store.set(path, value).await
    }
}
