use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{Decree, INVALID_DECREE, PartitionIndex};

/// Replication progress of a single partition.
///
/// `volatile_decree` is the latest decree confirmed by the remote cluster as known in memory,
/// `stored_decree` is the latest one confirmed durable in the meta store. The invariant
/// `stored_decree <= volatile_decree` holds after every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionProgress {
    volatile_decree: Decree,
    stored_decree: Decree,
    is_altering: bool,
    /// When `volatile_decree` last advanced. Diagnostic only, persists are gated by
    /// `last_persist_ms`.
    last_update_ms: u64,
    /// When the last persist of this partition was dispatched.
    last_persist_ms: u64,
    is_inited: bool,
}

impl PartitionProgress {
    pub fn volatile_decree(&self) -> Decree {
        self.volatile_decree
    }

    pub fn stored_decree(&self) -> Decree {
        self.stored_decree
    }

    /// Returns `true` if the partition has progress that is not durable yet.
    pub fn is_altering(&self) -> bool {
        self.is_altering
    }

    /// Returns when the volatile decree last advanced. It plays no part in deciding whether a
    /// persist is due.
    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    pub fn is_inited(&self) -> bool {
        self.is_inited
    }
}

impl Default for PartitionProgress {
    fn default() -> Self {
        Self {
            volatile_decree: INVALID_DECREE,
            stored_decree: INVALID_DECREE,
            is_altering: false,
            last_update_ms: 0,
            last_persist_ms: 0,
            is_inited: false,
        }
    }
}

/// Per-partition progress of one duplication.
///
/// The ledger is not synchronized on its own, it lives inside the lock of its owning
/// [`crate::duplication::info::DuplicationInfo`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProgressLedger {
    partitions: BTreeMap<PartitionIndex, PartitionProgress>,
}

impl ProgressLedger {
    /// Creates a ledger with `partition_count` uninitialized partitions.
    pub fn with_partitions(partition_count: i32) -> Self {
        let partitions = (0..partition_count)
            .map(|index| (index, PartitionProgress::default()))
            .collect();

        Self { partitions }
    }

    pub fn get(&self, partition_index: PartitionIndex) -> Option<&PartitionProgress> {
        self.partitions.get(&partition_index)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Creates or resets the progress of a partition to the durable decree `confirmed`.
    pub fn init(&mut self, partition_index: PartitionIndex, confirmed: Decree) {
        let progress = self.partitions.entry(partition_index).or_default();
        progress.volatile_decree = confirmed;
        progress.stored_decree = confirmed;
        progress.is_altering = false;
        progress.is_inited = true;
    }

    /// Moves the volatile decree of a partition forward to `decree`.
    ///
    /// Returns `false` when the partition is unknown or uninitialized, or when `decree` does not
    /// advance the volatile decree. Returns `true` if the partition now has unpersisted progress.
    pub fn alter(&mut self, partition_index: PartitionIndex, decree: Decree, now_ms: u64) -> bool {
        let Some(progress) = self.partitions.get_mut(&partition_index) else {
            return false;
        };

        if !progress.is_inited || decree <= progress.volatile_decree {
            return false;
        }

        progress.volatile_decree = decree;
        progress.last_update_ms = now_ms;
        progress.is_altering = true;

        true
    }

    /// Commits `persisted_decree`, the volatile decree snapshot taken when the write was
    /// dispatched, as the stored decree of a partition.
    ///
    /// The partition stays altering if the volatile decree moved past the snapshot meanwhile.
    /// Returns `false` if the partition is unknown or uninitialized.
    pub fn persist(&mut self, partition_index: PartitionIndex, persisted_decree: Decree) -> bool {
        let Some(progress) = self.partitions.get_mut(&partition_index) else {
            return false;
        };

        if !progress.is_inited {
            return false;
        }

        // A snapshot can never exceed the volatile decree it was taken from, unless the
        // partition was re-initialized in between.
        let persisted_decree = persisted_decree.min(progress.volatile_decree);
        progress.stored_decree = progress.stored_decree.max(persisted_decree);
        progress.is_altering = progress.volatile_decree > progress.stored_decree;

        true
    }

    /// Snapshots the volatile decree of every altering partition whose last persist was
    /// dispatched at least `update_period_ms` ago, and marks them as dispatched at `now_ms`.
    pub fn take_due(&mut self, now_ms: u64, update_period_ms: u64) -> Vec<(PartitionIndex, Decree)> {
        let mut due = Vec::new();
        for (index, progress) in self.partitions.iter_mut() {
            if !progress.is_inited || !progress.is_altering {
                continue;
            }

            if progress.last_persist_ms.saturating_add(update_period_ms) > now_ms {
                continue;
            }

            progress.last_persist_ms = now_ms;
            due.push((*index, progress.volatile_decree));
        }

        due
    }

    /// Returns the stored decree of every initialized partition.
    pub fn stored_decrees(&self) -> BTreeMap<PartitionIndex, Decree> {
        self.partitions
            .iter()
            .filter(|(_, progress)| progress.is_inited)
            .map(|(index, progress)| (*index, progress.stored_decree))
            .collect()
    }
}
