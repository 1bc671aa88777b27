//! Table metadata as seen by the duplication service.
//!
//! Tables are owned by the meta server's table service, the duplication service only reads
//! their identity, partition count and availability.

use crate::types::AppId;

/// Availability of a table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppStatus {
    Available,
    Dropping,
    Dropped,
}

/// Snapshot of a table's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub app_id: AppId,
    pub app_name: String,
    pub partition_count: i32,
    pub status: AppStatus,
}

impl AppState {
    pub fn new(app_id: AppId, app_name: impl Into<String>, partition_count: i32) -> Self {
        Self {
            app_id,
            app_name: app_name.into(),
            partition_count,
            status: AppStatus::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == AppStatus::Available
    }
}
