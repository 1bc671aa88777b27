use bytes::Bytes;
use std::future::Future;

use crate::error::DupResult;

/// A hierarchical key-value store where duplication state is made durable.
///
/// A `set` is atomic for its key, nothing is transactional across keys. Implementations must
/// be safe to share between the persistence worker and the admin path.
pub trait MetaStore {
    /// Returns the value stored at `path`, if any.
    fn get(&self, path: &str) -> impl Future<Output = DupResult<Option<Bytes>>> + Send;

    /// Stores `value` at `path`, creating or overwriting it.
    fn set(&self, path: &str, value: Bytes) -> impl Future<Output = DupResult<()>> + Send;

    /// Deletes `path` and every key below it.
    fn delete(&self, path: &str) -> impl Future<Output = DupResult<()>> + Send;

    /// Returns the names of the direct children of `path`.
    fn get_children(&self, path: &str) -> impl Future<Output = DupResult<Vec<String>>> + Send;
}
