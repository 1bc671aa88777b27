use metrics::gauge;
use tracing::info;

use crate::duplication::info::DuplicationInfo;
use crate::metrics::{APP_ID, DUP_ID, DUP_STORED_DECREE, PARTITION};

impl DuplicationInfo {
    /// Logs the stored progress of this duplication if at least `report_period_ms` passed since
    /// the last report. Returns whether a report was emitted.
    ///
    /// Reporting is diagnostic only and never changes the duplication's state machine.
    pub async fn report_progress_if_time_up(&self, now_ms: u64, report_period_ms: u64) -> bool {
        let mut inner = self.write_inner().await;
        if inner.last_progress_report_ms.saturating_add(report_period_ms) > now_ms {
            return false;
        }
        inner.last_progress_report_ms = now_ms;

        let stored_decrees = inner.progress.stored_decrees();
        for (partition, decree) in &stored_decrees {
            gauge!(
                DUP_STORED_DECREE,
                APP_ID => self.app_id.to_string(),
                DUP_ID => self.id.to_string(),
                PARTITION => partition.to_string()
            )
            .set(*decree as f64);
        }

        info!(
            app_id = self.app_id,
            dup_id = self.id,
            remote = %self.remote,
            status = %inner.status,
            fail_mode = %inner.fail_mode,
            "duplication sync progress: {stored_decrees:?}"
        );

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT_PERIOD_MS: u64 = 5 * 60 * 1_000;

    #[tokio::test]
    async fn reports_are_throttled() {
        let dup = DuplicationInfo::new(1, 1, 2, 0, "dc2".to_string(), "/p".to_string());
        dup.init_progress(0, 5).await;

        let start = 10 * REPORT_PERIOD_MS;
        assert!(dup.report_progress_if_time_up(start, REPORT_PERIOD_MS).await);
        assert!(!dup.report_progress_if_time_up(start + 1, REPORT_PERIOD_MS).await);
        assert!(
            !dup.report_progress_if_time_up(start + REPORT_PERIOD_MS - 1, REPORT_PERIOD_MS)
                .await
        );
        assert!(
            dup.report_progress_if_time_up(start + REPORT_PERIOD_MS, REPORT_PERIOD_MS)
                .await
        );
    }

    #[tokio::test]
    async fn report_does_not_touch_progress() {
        let dup = DuplicationInfo::new(1, 1, 1, 0, "dc2".to_string(), "/p".to_string());
        dup.init_progress(0, 5).await;
        dup.alter_progress(0, 8).await;
        let before = dup.partition_progress(0).await;

        dup.report_progress_if_time_up(REPORT_PERIOD_MS, REPORT_PERIOD_MS)
            .await;

        assert_eq!(dup.partition_progress(0).await, before);
    }
}
