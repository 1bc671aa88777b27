use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::DupResult;
use crate::store::base::MetaStore;

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<String, Bytes>,
}

/// In-memory [`MetaStore`].
///
/// Clones share the same nodes, which lets tests simulate a restart by building a new registry
/// over a clone of the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetaStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored key and value.
    pub async fn nodes(&self) -> BTreeMap<String, Bytes> {
        self.inner.lock().await.nodes.clone()
    }
}

fn child_prefix(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

impl MetaStore for MemoryMetaStore {
    async fn get(&self, path: &str) -> DupResult<Option<Bytes>> {
        let inner = self.inner.lock().await;

        Ok(inner.nodes.get(path).cloned())
    }

    async fn set(&self, path: &str, value: Bytes) -> DupResult<()> {
        let mut inner = self.inner.lock().await;
        inner.nodes.insert(path.to_string(), value);

        Ok(())
    }

    async fn delete(&self, path: &str) -> DupResult<()> {
        let mut inner = self.inner.lock().await;
        let prefix = child_prefix(path);
        inner
            .nodes
            .retain(|key, _| key != path && !key.starts_with(&prefix));

        Ok(())
    }

    async fn get_children(&self, path: &str) -> DupResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let prefix = child_prefix(path);

        let children: BTreeSet<&str> = inner
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| key[prefix.len()..].split('/').next())
            .collect();

        Ok(children.into_iter().map(str::to_string).collect())
    }
}
