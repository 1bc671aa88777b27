use metrics::counter;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::bail;
use crate::duplication::progress::{PartitionProgress, ProgressLedger};
use crate::duplication::status::{DuplicationStatus, FailMode};
use crate::error::{DupResult, ErrorKind};
use crate::metrics::{DUP_STATUS_CHANGES_TOTAL, STATUS};
use crate::types::{AppId, Decree, DupId, PartitionIndex, now_ms};

/// Mutable state of a [`DuplicationInfo`], guarded as a single unit.
#[derive(Debug, Serialize)]
pub(crate) struct Inner {
    pub(crate) status: DuplicationStatus,
    pub(crate) next_status: DuplicationStatus,
    pub(crate) fail_mode: FailMode,
    pub(crate) next_fail_mode: FailMode,
    /// Whether a status change is staged and waiting for its durable write.
    pub(crate) is_altering: bool,
    pub(crate) progress: ProgressLedger,
    pub(crate) last_progress_report_ms: u64,
}

/// State of one duplication of a table to a remote cluster.
///
/// Status changes and progress updates are staged in memory first and committed only after
/// the persistence worker confirmed their durable write, see [`DuplicationInfo::persist_status`]
/// and [`DuplicationInfo::persist_progress`]. Only committed state is externally visible.
///
/// All mutable fields live behind one reader/writer lock.
#[derive(Debug)]
pub struct DuplicationInfo {
    pub id: DupId,
    pub app_id: AppId,
    /// Name of the remote cluster the table is duplicated to.
    pub remote: String,
    /// Path of the encoded duplication in the meta store.
    pub store_path: String,
    pub create_timestamp_ms: u64,
    inner: RwLock<Inner>,
    /// Serializes flushes of this duplication to the meta store. Never taken while `inner`
    /// is held.
    flush_lock: Mutex<()>,
}

impl DuplicationInfo {
    /// Creates a duplication in status [`DuplicationStatus::Init`] with `partition_count`
    /// uninitialized partitions.
    pub fn new(
        id: DupId,
        app_id: AppId,
        partition_count: i32,
        create_timestamp_ms: u64,
        remote: String,
        store_path: String,
    ) -> Self {
        Self::with_status(
            id,
            app_id,
            partition_count,
            create_timestamp_ms,
            remote,
            store_path,
            DuplicationStatus::Init,
            FailMode::default(),
        )
    }

    #[expect(clippy::too_many_arguments)]
    pub(crate) fn with_status(
        id: DupId,
        app_id: AppId,
        partition_count: i32,
        create_timestamp_ms: u64,
        remote: String,
        store_path: String,
        status: DuplicationStatus,
        fail_mode: FailMode,
    ) -> Self {
        let inner = Inner {
            status,
            next_status: status,
            fail_mode,
            next_fail_mode: fail_mode,
            is_altering: false,
            progress: ProgressLedger::with_partitions(partition_count),
            last_progress_report_ms: 0,
        };

        Self {
            id,
            app_id,
            remote,
            store_path,
            create_timestamp_ms,
            inner: RwLock::new(inner),
            flush_lock: Mutex::new(()),
        }
    }

    pub(crate) async fn read_inner(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().await
    }

    pub(crate) async fn write_inner(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().await
    }

    pub(crate) async fn lock_flush(&self) -> MutexGuard<'_, ()> {
        self.flush_lock.lock().await
    }

    /// Stages the transition into [`DuplicationStatus::Start`] of a newly created duplication.
    ///
    /// This bypasses the transition table and only fails if another change is in flight.
    pub async fn start(&self) -> DupResult<()> {
        let mut inner = self.inner.write().await;
        if inner.is_altering {
            bail!(
                ErrorKind::InvalidTransition,
                "A status change is already in flight",
                format!(
                    "duplication {} of app {} is altering to {}",
                    self.id, self.app_id, inner.next_status
                )
            );
        }

        inner.next_status = DuplicationStatus::Start;
        inner.is_altering = true;

        Ok(())
    }

    /// Stages a change of status and fail mode.
    ///
    /// Fails with [`ErrorKind::InvalidTransition`] when a change is already in flight, when the
    /// duplication is removed, or when `to_status` is not reachable from the current status.
    /// Asking for the current status and fail mode succeeds without staging anything.
    pub async fn alter_status(
        &self,
        to_status: DuplicationStatus,
        to_fail_mode: FailMode,
    ) -> DupResult<()> {
        let mut inner = self.inner.write().await;
        if inner.is_altering {
            bail!(
                ErrorKind::InvalidTransition,
                "A status change is already in flight",
                format!(
                    "duplication {} of app {} is altering to {}",
                    self.id, self.app_id, inner.next_status
                )
            );
        }

        if inner.status.is_terminal() {
            bail!(
                ErrorKind::InvalidTransition,
                "The duplication is removed",
                format!("duplication {} of app {} is removed", self.id, self.app_id)
            );
        }

        if !inner.status.can_transition_to(to_status) {
            bail!(
                ErrorKind::InvalidTransition,
                "The status change is not allowed",
                format!(
                    "duplication {} of app {} cannot change from {} to {}",
                    self.id, self.app_id, inner.status, to_status
                )
            );
        }

        if inner.status == to_status && inner.fail_mode == to_fail_mode {
            return Ok(());
        }

        inner.next_status = to_status;
        inner.next_fail_mode = to_fail_mode;
        inner.is_altering = true;

        debug!(
            app_id = self.app_id,
            dup_id = self.id,
            "staged status change from {}/{} to {}/{}",
            inner.status,
            inner.fail_mode,
            to_status,
            to_fail_mode
        );

        Ok(())
    }

    /// Commits the staged status and fail mode. Must only be called after the staged encoding
    /// has been durably written.
    ///
    /// Returns the committed status, or `None` if nothing was staged.
    pub async fn persist_status(&self) -> Option<DuplicationStatus> {
        let mut inner = self.inner.write().await;
        if !inner.is_altering {
            warn!(
                app_id = self.app_id,
                dup_id = self.id,
                "ignoring status persist since no status change is staged"
            );
            return None;
        }

        info!(
            app_id = self.app_id,
            dup_id = self.id,
            "status changed from {}/{} to {}/{}",
            inner.status,
            inner.fail_mode,
            inner.next_status,
            inner.next_fail_mode
        );

        inner.status = inner.next_status;
        inner.fail_mode = inner.next_fail_mode;
        inner.is_altering = false;

        counter!(DUP_STATUS_CHANGES_TOTAL, STATUS => inner.status.to_string()).increment(1);

        Some(inner.status)
    }

    pub async fn status(&self) -> DuplicationStatus {
        self.inner.read().await.status
    }

    pub async fn fail_mode(&self) -> FailMode {
        self.inner.read().await.fail_mode
    }

    /// Returns `true` if the committed status is one of the active duplication statuses.
    pub async fn is_valid(&self) -> bool {
        self.inner.read().await.status.is_valid()
    }

    pub async fn is_altering(&self) -> bool {
        self.inner.read().await.is_altering
    }

    /// Initializes the progress of a partition to the durable decree `confirmed`.
    pub async fn init_progress(&self, partition_index: PartitionIndex, confirmed: Decree) {
        let mut inner = self.inner.write().await;
        inner.progress.init(partition_index, confirmed);

        debug!(
            app_id = self.app_id,
            dup_id = self.id,
            partition = partition_index,
            "initialized progress to decree {confirmed}"
        );
    }

    /// Stages `decree` as the confirmed decree of a partition.
    ///
    /// Returns `false` without changing anything if `decree` is stale or the partition is not
    /// initialized, `true` if the partition now has progress waiting to be persisted.
    pub async fn alter_progress(&self, partition_index: PartitionIndex, decree: Decree) -> bool {
        let mut inner = self.inner.write().await;
        inner.progress.alter(partition_index, decree, now_ms())
    }

    /// Commits `persisted_decree`, the snapshot returned by
    /// [`DuplicationInfo::progress_to_persist`], after its durable write.
    pub async fn persist_progress(&self, partition_index: PartitionIndex, persisted_decree: Decree) {
        let mut inner = self.inner.write().await;
        if !inner.progress.persist(partition_index, persisted_decree) {
            warn!(
                app_id = self.app_id,
                dup_id = self.id,
                partition = partition_index,
                "ignoring progress persist of an uninitialized partition"
            );
        }
    }

    /// Returns the partitions whose progress is due to be persisted with the decree to write
    /// for each of them.
    pub async fn progress_to_persist(
        &self,
        now_ms: u64,
        update_period_ms: u64,
    ) -> Vec<(PartitionIndex, Decree)> {
        let mut inner = self.inner.write().await;
        inner.progress.take_due(now_ms, update_period_ms)
    }

    /// Returns a copy of the progress of a partition.
    pub async fn partition_progress(
        &self,
        partition_index: PartitionIndex,
    ) -> Option<PartitionProgress> {
        self.inner.read().await.progress.get(partition_index).copied()
    }

    /// Returns the stored decree of every initialized partition.
    pub async fn stored_decrees(&self) -> BTreeMap<PartitionIndex, Decree> {
        self.inner.read().await.progress.stored_decrees()
    }

    pub async fn partition_count(&self) -> usize {
        self.inner.read().await.progress.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_dup(partition_count: i32) -> DuplicationInfo {
        DuplicationInfo::new(
            1,
            2,
            partition_count,
            1_000,
            "slave-cluster".to_string(),
            "/meta/apps/2/duplication/1".to_string(),
        )
    }

    async fn started_dup(partition_count: i32) -> DuplicationInfo {
        let dup = new_dup(partition_count);
        dup.start().await.unwrap();
        dup.persist_status().await;
        dup
    }

    #[tokio::test]
    async fn start_is_staged_until_persisted() {
        let dup = new_dup(4);

        dup.start().await.unwrap();
        assert!(dup.is_altering().await);
        assert_eq!(dup.status().await, DuplicationStatus::Init);
        assert!(!dup.is_valid().await);

        assert_eq!(dup.persist_status().await, Some(DuplicationStatus::Start));
        assert!(!dup.is_altering().await);
        assert_eq!(dup.status().await, DuplicationStatus::Start);
        assert!(dup.is_valid().await);
    }

    #[tokio::test]
    async fn second_status_change_in_flight_is_rejected() {
        let dup = started_dup(1).await;

        dup.alter_status(DuplicationStatus::Pause, FailMode::FailSlow)
            .await
            .unwrap();

        for to in [
            DuplicationStatus::Init,
            DuplicationStatus::Start,
            DuplicationStatus::Pause,
            DuplicationStatus::Removed,
        ] {
            let err = dup.alter_status(to, FailMode::FailFast).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        }
        assert!(dup.start().await.is_err());

        // The stage is untouched by the rejected calls.
        assert_eq!(dup.persist_status().await, Some(DuplicationStatus::Pause));
        assert_eq!(dup.fail_mode().await, FailMode::FailSlow);
    }

    #[tokio::test]
    async fn removed_duplication_cannot_change() {
        let dup = started_dup(1).await;
        dup.alter_status(DuplicationStatus::Removed, FailMode::FailSlow)
            .await
            .unwrap();
        dup.persist_status().await;

        for to in [
            DuplicationStatus::Init,
            DuplicationStatus::Start,
            DuplicationStatus::Pause,
            DuplicationStatus::Removed,
        ] {
            let err = dup.alter_status(to, FailMode::FailSlow).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        }
        assert!(!dup.is_altering().await);
    }

    #[tokio::test]
    async fn unreachable_status_is_rejected() {
        let dup = new_dup(1);

        let err = dup
            .alter_status(DuplicationStatus::Pause, FailMode::FailSlow)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(!dup.is_altering().await);
    }

    #[tokio::test]
    async fn same_status_only_stages_fail_mode_changes() {
        let dup = started_dup(1).await;

        dup.alter_status(DuplicationStatus::Start, FailMode::FailSlow)
            .await
            .unwrap();
        assert!(!dup.is_altering().await);

        dup.alter_status(DuplicationStatus::Start, FailMode::FailFast)
            .await
            .unwrap();
        assert!(dup.is_altering().await);
        assert_eq!(dup.fail_mode().await, FailMode::FailSlow);

        dup.persist_status().await;
        assert_eq!(dup.fail_mode().await, FailMode::FailFast);
    }

    #[tokio::test]
    async fn persist_status_without_stage_is_a_noop() {
        let dup = started_dup(1).await;

        assert_eq!(dup.persist_status().await, None);
        assert_eq!(dup.status().await, DuplicationStatus::Start);
    }

    #[tokio::test]
    async fn four_partition_scenario() {
        let dup = new_dup(4);
        for partition in 0..4 {
            dup.init_progress(partition, 0).await;
        }
        dup.start().await.unwrap();
        dup.persist_status().await;
        assert_eq!(dup.status().await, DuplicationStatus::Start);

        assert!(dup.alter_progress(0, 100).await);
        let progress = dup.partition_progress(0).await.unwrap();
        assert_eq!(progress.volatile_decree(), 100);
        assert_eq!(progress.stored_decree(), 0);

        assert!(!dup.alter_progress(0, 50).await);
        assert_eq!(dup.partition_progress(0).await.unwrap(), progress);

        let due = dup.progress_to_persist(now_ms(), 0).await;
        assert_eq!(due, vec![(0, 100)]);
        dup.persist_progress(0, 100).await;

        let progress = dup.partition_progress(0).await.unwrap();
        assert_eq!(progress.stored_decree(), 100);
        assert!(!progress.is_altering());
    }

    #[tokio::test]
    async fn repeated_progress_is_idempotent() {
        let dup = started_dup(1).await;
        dup.init_progress(0, 0).await;

        assert!(dup.alter_progress(0, 10).await);
        let after_first = dup.partition_progress(0).await.unwrap();

        assert!(!dup.alter_progress(0, 10).await);
        assert!(!dup.alter_progress(0, 10).await);
        assert_eq!(dup.partition_progress(0).await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn monotonic_progress_under_interleaved_persists() {
        let dup = started_dup(1).await;
        dup.init_progress(0, 0).await;

        let mut last_stored = 0;
        let pushes = [5, 3, 9, 9, 12, 1, 20, 15, 30];
        for (step, decree) in pushes.into_iter().enumerate() {
            dup.alter_progress(0, decree).await;

            if step % 2 == 0 {
                for (partition, snapshot) in dup.progress_to_persist(now_ms(), 0).await {
                    dup.persist_progress(partition, snapshot).await;
                }
            }

            let progress = dup.partition_progress(0).await.unwrap();
            assert!(progress.stored_decree() >= last_stored);
            assert!(progress.stored_decree() <= progress.volatile_decree());
            last_stored = progress.stored_decree();
        }
    }
}
