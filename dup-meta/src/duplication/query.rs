use serde::Serialize;
use std::collections::BTreeMap;

use crate::app::AppState;
use crate::duplication::info::{DuplicationInfo, Inner};
use crate::duplication::status::{DuplicationStatus, FailMode};
use crate::types::{Decree, DupId, PartitionIndex};

/// Read-only view of a duplication returned to query callers.
///
/// Only committed state is exposed: the committed status and fail mode, and the stored decree
/// of every initialized partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicationEntry {
    pub dupid: DupId,
    pub create_ts: u64,
    pub remote: String,
    pub status: DuplicationStatus,
    pub fail_mode: FailMode,
    pub progress: BTreeMap<PartitionIndex, Decree>,
}

impl DuplicationInfo {
    /// Builds the query view of this duplication from a single read of its state.
    pub async fn to_duplication_entry(&self) -> DuplicationEntry {
        let inner = self.read_inner().await;
        self.entry_from(&inner)
    }

    /// Appends the query view of this duplication to `entries` if the duplication is valid and
    /// `app` is the available table owning it. Skips it silently otherwise.
    pub async fn append_if_valid_for_query(
        &self,
        app: &AppState,
        entries: &mut Vec<DuplicationEntry>,
    ) {
        if !app.is_available() || app.app_id != self.app_id {
            return;
        }

        let inner = self.read_inner().await;
        if !inner.status.is_valid() {
            return;
        }

        entries.push(self.entry_from(&inner));
    }

    fn entry_from(&self, inner: &Inner) -> DuplicationEntry {
        DuplicationEntry {
            dupid: self.id,
            create_ts: self.create_timestamp_ms,
            remote: self.remote.clone(),
            status: inner.status,
            fail_mode: inner.fail_mode,
            progress: inner.progress.stored_decrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppStatus;

    fn new_dup(app_id: i32) -> DuplicationInfo {
        DuplicationInfo::new(
            1,
            app_id,
            4,
            1_000,
            "dc2".to_string(),
            format!("/meta/apps/{app_id}/duplication/1"),
        )
    }

    #[tokio::test]
    async fn entry_reports_only_durable_progress() {
        let dup = new_dup(2);
        dup.start().await.unwrap();
        dup.persist_status().await;
        dup.init_progress(0, 10).await;
        dup.init_progress(2, 30).await;
        dup.alter_progress(0, 15).await;

        let entry = dup.to_duplication_entry().await;

        assert_eq!(entry.dupid, 1);
        assert_eq!(entry.create_ts, 1_000);
        assert_eq!(entry.remote, "dc2");
        assert_eq!(entry.status, DuplicationStatus::Start);
        assert_eq!(entry.progress, BTreeMap::from([(0, 10), (2, 30)]));
    }

    #[tokio::test]
    async fn entry_reports_committed_status_only() {
        let dup = new_dup(2);
        dup.start().await.unwrap();
        dup.persist_status().await;
        dup.alter_status(DuplicationStatus::Pause, FailMode::FailFast)
            .await
            .unwrap();

        let entry = dup.to_duplication_entry().await;

        assert_eq!(entry.status, DuplicationStatus::Start);
        assert_eq!(entry.fail_mode, FailMode::FailSlow);
    }

    #[tokio::test]
    async fn appended_entry_matches_the_query_view() {
        let app = AppState::new(2, "temp", 4);
        let dup = new_dup(2);
        dup.start().await.unwrap();
        dup.persist_status().await;
        dup.init_progress(1, 8).await;
        let mut entries = Vec::new();

        dup.append_if_valid_for_query(&app, &mut entries).await;

        assert_eq!(entries, vec![dup.to_duplication_entry().await]);
    }

    #[tokio::test]
    async fn invalid_duplications_are_not_appended() {
        let app = AppState::new(2, "temp", 4);
        let dup = new_dup(2);
        let mut entries = Vec::new();

        dup.append_if_valid_for_query(&app, &mut entries).await;
        dup.start().await.unwrap();
        dup.append_if_valid_for_query(&app, &mut entries).await;
        assert!(entries.is_empty());

        dup.persist_status().await;
        dup.append_if_valid_for_query(&app, &mut entries).await;
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn duplications_of_unavailable_or_foreign_apps_are_skipped() {
        let dup = new_dup(2);
        dup.start().await.unwrap();
        dup.persist_status().await;
        let mut entries = Vec::new();

        let mut dropped = AppState::new(2, "temp", 4);
        dropped.status = AppStatus::Dropped;
        dup.append_if_valid_for_query(&dropped, &mut entries).await;

        let other = AppState::new(3, "other", 4);
        dup.append_if_valid_for_query(&other, &mut entries).await;

        assert!(entries.is_empty());
    }
}
