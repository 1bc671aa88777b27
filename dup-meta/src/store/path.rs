use crate::types::{AppId, DupId, PartitionIndex};

/// Name of the node under an app that groups its duplications.
const DUPLICATION_NODE: &str = "duplication";

pub fn app_path(meta_root: &str, app_id: AppId) -> String {
    format!("{}/{app_id}", meta_root.trim_end_matches('/'))
}

/// Path under which all duplications of an app are stored.
pub fn duplication_root(meta_root: &str, app_id: AppId) -> String {
    format!("{}/{DUPLICATION_NODE}", app_path(meta_root, app_id))
}

/// Path of the blob of a single duplication.
pub fn duplication_path(meta_root: &str, app_id: AppId, dup_id: DupId) -> String {
    format!("{}/{dup_id}", duplication_root(meta_root, app_id))
}

/// Path of the persisted progress of a partition of the duplication stored at `store_path`.
pub fn progress_path(store_path: &str, partition_index: PartitionIndex) -> String {
    format!("{store_path}/{partition_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_nested() {
        assert_eq!(app_path("/meta/apps/", 3), "/meta/apps/3");
        assert_eq!(duplication_root("/meta/apps", 3), "/meta/apps/3/duplication");
        let store_path = duplication_path("/meta/apps", 3, 1586);
        assert_eq!(store_path, "/meta/apps/3/duplication/1586");
        assert_eq!(progress_path(&store_path, 7), "/meta/apps/3/duplication/1586/7");
    }
}
