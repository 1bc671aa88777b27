//! Duplication state machine of the meta server.
//!
//! Tracks, for every table duplicated to a remote cluster, the lifecycle status of the
//! duplication and the replication progress of each partition. Changes are staged in memory,
//! written to a durable [`store::base::MetaStore`] by the [`persister::MetaPersister`] and only
//! committed once the write succeeded.

pub mod app;
pub mod concurrency;
pub mod duplication;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
mod macros;
pub mod metrics;
pub mod persister;
pub mod registry;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
