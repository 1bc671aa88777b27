//! The duplication state machine.
//!
//! A [`info::DuplicationInfo`] tracks the lifecycle [`status::DuplicationStatus`] of one
//! duplication and the replication progress of each of its partitions. Both are staged in
//! memory and committed once their durable write to the meta store succeeded.

mod codec;
mod dump;
pub mod info;
pub mod progress;
pub mod query;
mod report;
pub mod status;
