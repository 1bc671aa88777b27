use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{DupResult, ErrorKind};
use crate::store::base::MetaStore;

#[derive(Debug, Default)]
struct Inner {
    /// Number of upcoming writes that fail.
    failing_writes: usize,
    /// Fail every write until cleared, regardless of `failing_writes`.
    fail_all_writes: bool,
    write_attempts: usize,
    failed_writes: usize,
}

/// A [`MetaStore`] wrapper that fails writes on demand.
///
/// Reads and deletes are always forwarded to the wrapped store.
#[derive(Debug, Clone)]
pub struct FaultyMetaStore<S> {
    store: S,
    inner: Arc<Mutex<Inner>>,
}

impl<S> FaultyMetaStore<S> {
    pub fn wrap(store: S) -> Self {
        Self {
            store,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn get_inner(&self) -> &S {
        &self.store
    }

    /// Makes the next `count` writes fail.
    pub async fn fail_next_writes(&self, count: usize) {
        self.inner.lock().await.failing_writes = count;
    }

    /// Makes every write fail until called again with `false`.
    pub async fn fail_all_writes(&self, fail: bool) {
        self.inner.lock().await.fail_all_writes = fail;
    }

    pub async fn write_attempts(&self) -> usize {
        self.inner.lock().await.write_attempts
    }

    pub async fn failed_writes(&self) -> usize {
        self.inner.lock().await.failed_writes
    }
}

impl<S> MetaStore for FaultyMetaStore<S>
where
    S: MetaStore + Send + Sync,
{
    async fn get(&self, path: &str) -> DupResult<Option<Bytes>> {
        self.store.get(path).await
    }

    async fn set(&self, path: &str, value: Bytes) -> DupResult<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.write_attempts += 1;

            if inner.fail_all_writes || inner.failing_writes > 0 {
                inner.failing_writes = inner.failing_writes.saturating_sub(1);
                inner.failed_writes += 1;

                bail!(
                    ErrorKind::PersistenceFailure,
                    "Injected write failure",
                    format!("write to {path} failed")
                );
            }
        }

        self.store.set(path, value).await
    }

    async fn delete(&self, path: &str) -> DupResult<()> {
        self.store.delete(path).await
    }

    async fn get_children(&self, path: &str) -> DupResult<Vec<String>> {
        self.store.get_children(path).await
    }
}
