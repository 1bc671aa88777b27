use serde::Serialize;

use crate::duplication::info::{DuplicationInfo, Inner};
use crate::error::DupResult;
use crate::types::{AppId, DupId};

/// Full state of a duplication, staged values and per-partition bookkeeping included.
#[derive(Debug, Serialize)]
struct DuplicationState<'a> {
    id: DupId,
    app_id: AppId,
    remote: &'a str,
    store_path: &'a str,
    create_timestamp_ms: u64,
    #[serde(flatten)]
    inner: &'a Inner,
}

impl DuplicationInfo {
    /// Dumps the whole state of this duplication as JSON.
    ///
    /// Unlike [`DuplicationInfo::to_duplication_entry`] this exposes uncommitted state, it is
    /// meant for debug logs and for comparing duplications in tests.
    pub async fn dump_state(&self) -> DupResult<String> {
        let inner = self.read_inner().await;
        let state = DuplicationState {
            id: self.id,
            app_id: self.app_id,
            remote: &self.remote,
            store_path: &self.store_path,
            create_timestamp_ms: self.create_timestamp_ms,
            inner: &inner,
        };

        Ok(serde_json::to_string(&state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplication::status::{DuplicationStatus, FailMode};

    fn new_dup() -> DuplicationInfo {
        DuplicationInfo::new(
            4,
            2,
            2,
            1_000,
            "dc2".to_string(),
            "/meta/apps/2/duplication/4".to_string(),
        )
    }

    #[tokio::test]
    async fn dump_exposes_staged_state() {
        let dup = new_dup();
        dup.start().await.unwrap();
        dup.persist_status().await;
        dup.init_progress(1, 7).await;
        dup.alter_status(DuplicationStatus::Pause, FailMode::FailFast)
            .await
            .unwrap();
        dup.alter_progress(1, 9).await;

        let dump = dup.dump_state().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&dump).unwrap();

        assert_eq!(value["id"], 4);
        assert_eq!(value["remote"], "dc2");
        assert_eq!(value["status"], "DS_START");
        assert_eq!(value["next_status"], "DS_PAUSE");
        assert_eq!(value["next_fail_mode"], "FAIL_FAST");
        assert_eq!(value["is_altering"], true);
        assert_eq!(value["progress"]["1"]["volatile_decree"], 9);
        assert_eq!(value["progress"]["1"]["stored_decree"], 7);
        assert_eq!(value["progress"]["0"]["is_inited"], false);
    }

    #[tokio::test]
    async fn equal_states_dump_equally() {
        let first = new_dup();
        let second = new_dup();
        assert_eq!(
            first.dump_state().await.unwrap(),
            second.dump_state().await.unwrap()
        );

        first.start().await.unwrap();
        assert_ne!(
            first.dump_state().await.unwrap(),
            second.dump_state().await.unwrap()
        );

        second.start().await.unwrap();
        assert_eq!(
            first.dump_state().await.unwrap(),
            second.dump_state().await.unwrap()
        );
    }
}
