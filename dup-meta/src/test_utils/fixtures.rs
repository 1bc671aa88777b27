use dup_config::shared::{DuplicationConfig, RetryConfig};
use std::sync::Arc;

use crate::app::AppState;
use crate::registry::DuplicationRegistry;
use crate::store::base::MetaStore;

pub const TEST_META_ROOT: &str = "/meta/apps";

/// Configuration persisting on every cycle without waiting and retrying writes only once.
pub fn test_config() -> DuplicationConfig {
    DuplicationConfig {
        meta_root: TEST_META_ROOT.to_string(),
        persist_interval_ms: 10,
        progress_update_period_ms: 0,
        progress_report_period_ms: 5 * 60 * 1_000,
        retry: RetryConfig {
            max_attempts: 1,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_factor: 1.0,
        },
    }
}

pub fn test_app(app_id: i32, partition_count: i32) -> AppState {
    AppState::new(app_id, format!("app_{app_id}"), partition_count)
}

pub fn create_registry<S>(store: S) -> Arc<DuplicationRegistry<S>>
where
    S: MetaStore + Clone + Send + Sync + 'static,
{
    create_registry_with_config(store, test_config())
}

pub fn create_registry_with_config<S>(
    store: S,
    config: DuplicationConfig,
) -> Arc<DuplicationRegistry<S>>
where
    S: MetaStore + Clone + Send + Sync + 'static,
{
    Arc::new(DuplicationRegistry::new(store, Arc::new(config)).expect("valid test config"))
}
