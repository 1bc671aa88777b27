use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::duplication::info::DuplicationInfo;
use crate::duplication::status::{DuplicationStatus, FailMode};
use crate::error::DupResult;
use crate::types::{AppId, DupId};

/// Layout of the blob stored at [`DuplicationInfo::store_path`].
///
/// Per-partition progress is not part of the blob, it is stored under one key per partition.
#[derive(Debug, Serialize, Deserialize)]
struct DuplicationBlob {
    remote: String,
    status: DuplicationStatus,
    create_timestamp_ms: u64,
    #[serde(default)]
    fail_mode: FailMode,
}

impl DuplicationInfo {
    /// Encodes the duplication into the blob stored in the meta store.
    ///
    /// The blob carries the staged status and fail mode rather than the committed ones, so a
    /// restart between the write and [`DuplicationInfo::persist_status`] recovers into the
    /// staged status.
    pub async fn to_json_blob(&self) -> DupResult<Bytes> {
        let blob = {
            let inner = self.read_inner().await;
            DuplicationBlob {
                remote: self.remote.clone(),
                status: inner.next_status,
                create_timestamp_ms: self.create_timestamp_ms,
                fail_mode: inner.next_fail_mode,
            }
        };

        Ok(Bytes::from(serde_json::to_vec(&blob)?))
    }

    /// Rebuilds a duplication from a blob produced by [`DuplicationInfo::to_json_blob`].
    ///
    /// All partitions start uninitialized.
    pub fn decode_from_blob(
        id: DupId,
        app_id: AppId,
        partition_count: i32,
        store_path: String,
        json: &[u8],
    ) -> DupResult<DuplicationInfo> {
        let blob: DuplicationBlob = serde_json::from_slice(json)?;

        Ok(DuplicationInfo::with_status(
            id,
            app_id,
            partition_count,
            blob.create_timestamp_ms,
            blob.remote,
            store_path,
            blob.status,
            blob.fail_mode,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn new_dup() -> DuplicationInfo {
        DuplicationInfo::new(
            7,
            3,
            8,
            1_586_345_000_000,
            "dc2".to_string(),
            "/meta/apps/3/duplication/7".to_string(),
        )
    }

    #[tokio::test]
    async fn blob_carries_staged_status() {
        let dup = new_dup();
        dup.start().await.unwrap();

        let blob = dup.to_json_blob().await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();

        assert_eq!(value["remote"], "dc2");
        assert_eq!(value["status"], "DS_START");
        assert_eq!(value["fail_mode"], "FAIL_SLOW");
        assert_eq!(value["create_timestamp_ms"], 1_586_345_000_000u64);
    }

    #[tokio::test]
    async fn decode_restores_encoded_fields() {
        let dup = new_dup();
        dup.start().await.unwrap();
        dup.persist_status().await;
        dup.alter_status(DuplicationStatus::Pause, FailMode::FailFast)
            .await
            .unwrap();
        let blob = dup.to_json_blob().await.unwrap();

        let decoded =
            DuplicationInfo::decode_from_blob(7, 3, 8, dup.store_path.clone(), &blob).unwrap();

        assert_eq!(decoded.remote, "dc2");
        assert_eq!(decoded.create_timestamp_ms, dup.create_timestamp_ms);
        assert_eq!(decoded.status().await, DuplicationStatus::Pause);
        assert_eq!(decoded.fail_mode().await, FailMode::FailFast);
        assert!(!decoded.is_altering().await);
        assert_eq!(decoded.partition_count().await, 8);
        assert!(decoded.stored_decrees().await.is_empty());
    }

    #[tokio::test]
    async fn blob_without_fail_mode_defaults_to_fail_slow() {
        let json = br#"{"remote":"dc2","status":"DS_PAUSE","create_timestamp_ms":12}"#;

        let decoded = DuplicationInfo::decode_from_blob(1, 1, 2, "/p".to_string(), json).unwrap();

        assert_eq!(decoded.status().await, DuplicationStatus::Pause);
        assert_eq!(decoded.fail_mode().await, FailMode::FailSlow);
    }

    #[test]
    fn malformed_blob_is_a_decode_failure() {
        let blobs: [&[u8]; 3] = [
            b"not json",
            br#"{"remote":"dc2"}"#,
            br#"{"remote":"dc2","status":"DS_UNKNOWN","create_timestamp_ms":1}"#,
        ];

        for json in blobs {
            let err = DuplicationInfo::decode_from_blob(1, 1, 2, "/p".to_string(), json)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        }
    }
}
