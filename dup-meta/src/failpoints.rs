//! Failpoints used by tests to simulate failing writes against the meta store.

use fail::fail_point;

use crate::bail;
use crate::error::{DupResult, ErrorKind};

pub const PERSIST_STATUS_BEFORE_WRITE: &str = "persist_status.before_write";
pub const PERSIST_PROGRESS_BEFORE_WRITE: &str = "persist_progress.before_write";

/// Returns an error when the failpoint `name` is configured to return, `Ok(())` otherwise.
pub fn dup_fail_point(name: &str) -> DupResult<()> {
    fail_point!(name, |_| {
        bail!(
            ErrorKind::FailpointTriggered,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
