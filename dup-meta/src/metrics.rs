use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};

static REGISTER_METRICS: Once = Once::new();

pub const DUP_STORED_DECREE: &str = "dup_stored_decree";
pub const DUP_PERSIST_FAILURES_TOTAL: &str = "dup_persist_failures_total";
pub const DUP_STATUS_CHANGES_TOTAL: &str = "dup_status_changes_total";
pub const APP_ID: &str = "app_id";
pub const DUP_ID: &str = "dup_id";
pub const PARTITION: &str = "partition";
pub const TARGET: &str = "target";
pub const STATUS: &str = "status";

/// Registers the metrics emitted by the duplication service. Safe to call multiple times,
/// registration happens only once.
pub(crate) fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_gauge!(
            DUP_STORED_DECREE,
            Unit::Count,
            "Last decree of a partition confirmed durable in the meta store"
        );

        describe_counter!(
            DUP_PERSIST_FAILURES_TOTAL,
            Unit::Count,
            "Total number of failed writes of duplication state to the meta store"
        );

        describe_counter!(
            DUP_STATUS_CHANGES_TOTAL,
            Unit::Count,
            "Total number of duplication status changes committed after a durable write"
        );
    });
}
