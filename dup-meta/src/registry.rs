//! Registry of all duplications known to the meta server.
//!
//! The registry is the entry point of the admin path (adding duplications and changing their
//! status), the sync driver (pushing confirmed decrees), the query path and recovery. It owns a
//! [`MetaPersister`] through which every durable write goes.

use dup_config::shared::DuplicationConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::duplication::info::DuplicationInfo;
use crate::duplication::query::DuplicationEntry;
use crate::duplication::status::{DuplicationStatus, FailMode};
use crate::error::{DupResult, ErrorKind};
use crate::persister::{FlushOutcome, MetaPersister};
use crate::store::base::MetaStore;
use crate::store::path::{duplication_path, duplication_root, progress_path};
use crate::types::{AppId, Decree, DupId, INVALID_DECREE, PartitionIndex, now_ms};
use crate::{bail, dup_error};

type AppDuplications = BTreeMap<DupId, Arc<DuplicationInfo>>;

/// Registry of the duplications of every table, backed by a [`MetaStore`].
#[derive(Debug)]
pub struct DuplicationRegistry<S> {
    config: Arc<DuplicationConfig>,
    store: S,
    persister: MetaPersister<S>,
    duplications: RwLock<BTreeMap<AppId, AppDuplications>>,
}

impl<S> DuplicationRegistry<S>
where
    S: MetaStore + Clone + Send + Sync + 'static,
{
    /// Creates an empty registry. Call [`DuplicationRegistry::recover`] to load persisted
    /// duplications.
    pub fn new(store: S, config: Arc<DuplicationConfig>) -> DupResult<Self> {
        config.validate()?;

        Ok(Self {
            persister: MetaPersister::new(store.clone(), config.clone()),
            config,
            store,
            duplications: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &DuplicationConfig {
        &self.config
    }

    /// Adds a duplication of `app` to `remote` and starts it.
    ///
    /// Every partition starts at [`INVALID_DECREE`]. The new duplication becomes visible to
    /// queries once its start is durable.
    pub async fn add_duplication(&self, app: &AppState, remote: &str) -> DupResult<DupId> {
        if !app.is_available() {
            bail!(
                ErrorKind::AppNotAvailable,
                "The app is not available",
                format!("app {} ({}) is {:?}", app.app_id, app.app_name, app.status)
            );
        }

        let dup = {
            let mut duplications = self.duplications.write().await;
            let app_duplications = duplications.entry(app.app_id).or_default();

            if let Some(existing) = app_duplications.values().find(|dup| dup.remote == remote) {
                bail!(
                    ErrorKind::DuplicationAlreadyExists,
                    "A duplication to this remote cluster already exists",
                    format!(
                        "app {} is already duplicated to {remote} by duplication {}",
                        app.app_id, existing.id
                    )
                );
            }

            let create_timestamp_ms = now_ms();
            let mut dup_id = dup_id_from_timestamp(create_timestamp_ms)?;
            while app_duplications.contains_key(&dup_id) {
                dup_id = dup_id.checked_add(1).ok_or_else(|| {
                    dup_error!(
                        ErrorKind::InvalidData,
                        "No dupid left for the duplication",
                        format!("app {} has no free dupid after {dup_id}", app.app_id)
                    )
                })?;
            }

            let dup = Arc::new(DuplicationInfo::new(
                dup_id,
                app.app_id,
                app.partition_count,
                create_timestamp_ms,
                remote.to_string(),
                duplication_path(&self.config.meta_root, app.app_id, dup_id),
            ));
            for partition_index in 0..app.partition_count {
                dup.init_progress(partition_index, INVALID_DECREE).await;
            }
            dup.start().await?;

            app_duplications.insert(dup_id, dup.clone());
            dup
        };

        info!(
            app_id = app.app_id,
            dup_id = dup.id,
            "added duplication of app {} to {remote}",
            app.app_name
        );

        self.flush(&dup).await;

        Ok(dup.id)
    }

    /// Stages a status change of a duplication and tries to persist it right away.
    ///
    /// Only the validation of the change is reported to the caller. A failed write is retried
    /// by the persistence worker.
    pub async fn change_status(
        &self,
        app_id: AppId,
        dup_id: DupId,
        to_status: DuplicationStatus,
        to_fail_mode: FailMode,
    ) -> DupResult<()> {
        let dup = self.get_or_fail(app_id, dup_id).await?;
        dup.alter_status(to_status, to_fail_mode).await?;

        self.flush(&dup).await;

        Ok(())
    }

    /// Stages the confirmed decrees reported by the sync driver for a duplication.
    ///
    /// Returns how many partitions advanced. Stale decrees are dropped silently.
    pub async fn sync_progress(
        &self,
        app_id: AppId,
        dup_id: DupId,
        confirmed: &[(PartitionIndex, Decree)],
    ) -> DupResult<usize> {
        let dup = self.get_or_fail(app_id, dup_id).await?;
        if !dup.is_valid().await {
            debug!(app_id, dup_id, "ignoring progress of an inactive duplication");
            return Ok(0);
        }

        let mut advanced = 0;
        for (partition_index, decree) in confirmed {
            if dup.alter_progress(*partition_index, *decree).await {
                advanced += 1;
            }
        }

        Ok(advanced)
    }

    /// Initializes the progress of one partition, e.g. after the partition count of the
    /// table grew.
    pub async fn init_partition_progress(
        &self,
        app_id: AppId,
        dup_id: DupId,
        partition_index: PartitionIndex,
        confirmed: Decree,
    ) -> DupResult<()> {
        let dup = self.get_or_fail(app_id, dup_id).await?;
        dup.init_progress(partition_index, confirmed).await;

        Ok(())
    }

    /// Returns the query view of every valid duplication of `app`.
    pub async fn query_duplications(&self, app: &AppState) -> Vec<DuplicationEntry> {
        let mut entries = Vec::new();
        for dup in self.app_duplications(app.app_id).await {
            dup.append_if_valid_for_query(app, &mut entries).await;
        }

        entries
    }

    pub async fn get(&self, app_id: AppId, dup_id: DupId) -> Option<Arc<DuplicationInfo>> {
        let duplications = self.duplications.read().await;
        duplications.get(&app_id)?.get(&dup_id).cloned()
    }

    /// Returns every registered duplication.
    pub async fn entries(&self) -> Vec<Arc<DuplicationInfo>> {
        let duplications = self.duplications.read().await;
        duplications
            .values()
            .flat_map(|app_duplications| app_duplications.values().cloned())
            .collect()
    }

    /// Returns the duplications the sync driver should work on.
    pub async fn valid_duplications(&self) -> Vec<Arc<DuplicationInfo>> {
        let mut valid = Vec::new();
        for dup in self.entries().await {
            if dup.is_valid().await {
                valid.push(dup);
            }
        }

        valid
    }

    pub async fn app_duplications(&self, app_id: AppId) -> Vec<Arc<DuplicationInfo>> {
        let duplications = self.duplications.read().await;
        duplications
            .get(&app_id)
            .map(|app_duplications| app_duplications.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops a duplication from the registry without touching the meta store.
    pub async fn remove(&self, app_id: AppId, dup_id: DupId) -> Option<Arc<DuplicationInfo>> {
        let mut duplications = self.duplications.write().await;
        let app_duplications = duplications.get_mut(&app_id)?;
        let removed = app_duplications.remove(&dup_id);
        if app_duplications.is_empty() {
            duplications.remove(&app_id);
        }

        removed
    }

    /// Persists whatever is staged in `dup`.
    ///
    /// Once a removal is durable the duplication is dropped from the registry and its keys are
    /// deleted from the meta store.
    pub async fn flush(&self, dup: &DuplicationInfo) -> FlushOutcome {
        let outcome = self.persister.flush_entry(dup, now_ms()).await;

        if outcome.committed_status == Some(DuplicationStatus::Removed) {
            self.remove(dup.app_id, dup.id).await;
            if let Err(err) = self.store.delete(&dup.store_path).await {
                // Recovery deletes removed duplications it finds, so this is not fatal.
                warn!(
                    app_id = dup.app_id,
                    dup_id = dup.id,
                    error = %err,
                    "failed to delete the keys of a removed duplication"
                );
            }
            info!(app_id = dup.app_id, dup_id = dup.id, "removed duplication");
        }

        outcome
    }

    /// Flushes every registered duplication and reports progress of those whose report period
    /// elapsed. Returns the number of failed writes.
    pub async fn persist_all(&self, now_ms: u64) -> usize {
        let mut failed_writes = 0;
        for dup in self.entries().await {
            let outcome = self.flush(&dup).await;
            failed_writes += outcome.errors.len();

            dup.report_progress_if_time_up(now_ms, self.config.progress_report_period_ms)
                .await;
        }

        failed_writes
    }

    /// Loads the persisted duplications of `apps` into the registry.
    ///
    /// Duplications that fail to decode are logged and skipped, removed duplications are
    /// deleted from the store. Returns the number of recovered duplications.
    pub async fn recover(&self, apps: &[AppState]) -> DupResult<usize> {
        let mut recovered = 0;
        for app in apps {
            if !app.is_available() {
                continue;
            }

            let root = duplication_root(&self.config.meta_root, app.app_id);
            for child in self.store.get_children(&root).await? {
                match self.recover_duplication(app, &child).await {
                    Ok(Some(dup)) => {
                        let mut duplications = self.duplications.write().await;
                        duplications
                            .entry(app.app_id)
                            .or_default()
                            .insert(dup.id, Arc::new(dup));
                        recovered += 1;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        error!(
                            app_id = app.app_id,
                            error = %err,
                            "failed to recover duplication {child}, skipping it"
                        );
                    }
                }
            }
        }

        info!("recovered {recovered} duplications from the meta store");

        Ok(recovered)
    }

    async fn recover_duplication(
        &self,
        app: &AppState,
        child: &str,
    ) -> DupResult<Option<DuplicationInfo>> {
        let dup_id = child.parse::<DupId>().map_err(|err| {
            dup_error!(
                ErrorKind::InvalidData,
                "The duplication node is not named by a dupid",
                format!("node {child} of app {}: {err}", app.app_id)
            )
        })?;
        let store_path = duplication_path(&self.config.meta_root, app.app_id, dup_id);
        let Some(blob) = self.store.get(&store_path).await? else {
            return Ok(None);
        };

        let dup = DuplicationInfo::decode_from_blob(
            dup_id,
            app.app_id,
            app.partition_count,
            store_path,
            &blob,
        )?;

        if dup.status().await == DuplicationStatus::Removed {
            info!(
                app_id = app.app_id,
                dup_id,
                "deleting duplication whose removal was persisted before restart"
            );
            self.store.delete(&dup.store_path).await?;
            return Ok(None);
        }

        for partition_index in 0..app.partition_count {
            let confirmed = match self
                .store
                .get(&progress_path(&dup.store_path, partition_index))
                .await?
            {
                Some(value) => std::str::from_utf8(&value)?.parse::<Decree>()?,
                None => INVALID_DECREE,
            };
            dup.init_progress(partition_index, confirmed).await;
        }

        debug!(
            app_id = app.app_id,
            dup_id,
            "recovered duplication to {} in status {}",
            dup.remote,
            dup.status().await
        );

        Ok(Some(dup))
    }

    async fn get_or_fail(&self, app_id: AppId, dup_id: DupId) -> DupResult<Arc<DuplicationInfo>> {
        self.get(app_id, dup_id).await.ok_or_else(|| {
            dup_error!(
                ErrorKind::DuplicationNotFound,
                "The duplication does not exist",
                format!("no duplication {dup_id} for app {app_id}")
            )
        })
    }
}

/// Derives a dupid from a creation time, the number of seconds since the epoch.
fn dup_id_from_timestamp(create_timestamp_ms: u64) -> DupResult<DupId> {
    DupId::try_from(create_timestamp_ms / 1_000).map_err(|err| {
        dup_error!(
            ErrorKind::InvalidData,
            "The creation time does not fit in a dupid",
            format!("creation time {create_timestamp_ms}ms: {err}")
        )
    })
}
