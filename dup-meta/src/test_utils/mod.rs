//! Helpers for testing the duplication state machine against a misbehaving meta store.
pub mod fixtures;
pub mod store;
