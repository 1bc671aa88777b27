//! Access to the durable meta store holding duplication state.
//!
//! Each duplication is stored under its own path, with one child key per partition holding the
//! partition's persisted progress:
//!
//! ```text
//! {meta_root}/{app_id}/duplication/{dup_id}        -> JSON blob (remote, status, ...)
//! {meta_root}/{app_id}/duplication/{dup_id}/{pidx} -> decimal decree
//! ```

pub mod base;
pub mod memory;
pub mod path;
