use std::future::Future;

use crate::error::DupResult;

/// A trait for types that can be started as background workers.
///
/// `H` is the handle returned once the worker runs and `S` the state reachable through it.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    type Error;

    /// Starts the worker and returns its handle.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// A handle to a running worker.
pub trait WorkerHandle<S> {
    /// Returns the current state of the worker.
    fn state(&self) -> S;

    /// Returns a future that resolves when the worker completes.
    fn wait(self) -> impl Future<Output = DupResult<()>> + Send;
}
