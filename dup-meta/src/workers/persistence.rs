use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::dup_error;
use crate::error::{DupError, DupResult, ErrorKind};
use crate::registry::DuplicationRegistry;
use crate::store::base::MetaStore;
use crate::types::now_ms;
use crate::workers::base::{Worker, WorkerHandle};

/// Handle of a running [`PersistenceWorker`].
#[derive(Debug)]
pub struct PersistenceWorkerHandle {
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle<()> for PersistenceWorkerHandle {
    fn state(&self) {}

    async fn wait(mut self) -> DupResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            dup_error!(
                ErrorKind::PersistenceWorkerPanic,
                "The persistence worker panicked",
                err
            )
        })
    }
}

/// Background worker that periodically persists the staged state of every duplication in a
/// [`DuplicationRegistry`] and reports their progress.
///
/// Failed writes are logged and retried on the next cycle, they never stop the worker. The
/// worker runs until the shutdown signal fires.
#[derive(Debug)]
pub struct PersistenceWorker<S> {
    registry: Arc<DuplicationRegistry<S>>,
    shutdown_rx: ShutdownRx,
}

impl<S> PersistenceWorker<S> {
    pub fn new(registry: Arc<DuplicationRegistry<S>>, shutdown_rx: ShutdownRx) -> Self {
        Self {
            registry,
            shutdown_rx,
        }
    }
}

impl<S> Worker<PersistenceWorkerHandle, ()> for PersistenceWorker<S>
where
    S: MetaStore + Clone + Send + Sync + 'static,
{
    type Error = DupError;

    async fn start(mut self) -> Result<PersistenceWorkerHandle, Self::Error> {
        info!("starting duplication persistence worker");

        let persist_interval = self.registry.config().persist_interval();
        let persistence_worker_span = tracing::info_span!("persistence_worker");
        let persistence_worker = async move {
            let mut interval = tokio::time::interval(persist_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    // Shutdown signal received or sender dropped, exit loop.
                    _ = self.shutdown_rx.changed() => {
                        info!("shutting down duplication persistence worker");
                        break;
                    }

                    _ = interval.tick() => {
                        let failed_writes = self.registry.persist_all(now_ms()).await;
                        if failed_writes > 0 {
                            warn!("{failed_writes} duplication writes failed, retrying on next cycle");
                        } else {
                            debug!("persistence cycle completed");
                        }
                    }
                }
            }
        }
        .instrument(persistence_worker_span);

        let handle = tokio::spawn(persistence_worker);

        Ok(PersistenceWorkerHandle {
            handle: Some(handle),
        })
    }
}
