//! Identifiers and primitive types shared across the duplication state machine.

/// Identifier of a duplication, unique within its owning table.
pub type DupId = i32;

/// Identifier of a table (an "app" in the meta server's vocabulary).
pub type AppId = i32;

/// Index of a partition within a table.
pub type PartitionIndex = i32;

/// A position in the replicated write history of a partition.
pub type Decree = i64;

/// Decree of a partition that has not confirmed any write yet.
pub const INVALID_DECREE: Decree = -1;

/// Returns the current wall clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
