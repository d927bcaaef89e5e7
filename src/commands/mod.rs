pub mod import;
pub mod list;
pub mod plots;
pub mod status;
pub mod table;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::registry::Registry;
use crate::store::{FilePlotCache, SqliteStore};
use crate::util::ensure_directory;

const DB_FILE_NAME: &str = "benchboard.sqlite";
const PLOT_DIR_NAME: &str = "plots";

fn db_path(cache_root: &Path, db_path: Option<&Path>) -> PathBuf {
    db_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_root.join(DB_FILE_NAME))
}

fn open_store(cache_root: &Path, explicit: Option<&Path>) -> Result<SqliteStore> {
    let path = db_path(cache_root, explicit);
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }
    debug!(path = %path.display(), "opening metadata store");
    SqliteStore::open(&path)
}

fn plot_cache(cache_root: &Path) -> FilePlotCache {
    FilePlotCache::new(cache_root.join(PLOT_DIR_NAME))
}

fn load_registry(registry_path: Option<&Path>) -> Result<Registry> {
    match registry_path {
        Some(path) => {
            let registry = Registry::load(path)?;
            debug!(
                path = %path.display(),
                weight_maps = registry.weight_map_count(),
                default_sets = registry.default_set_count(),
                "loaded registry"
            );
            Ok(registry)
        }
        None => Ok(Registry::builtin()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::db_path;

    #[test]
    fn db_path_defaults_under_cache_root() {
        assert_eq!(
            db_path(Path::new(".cache/benchboard"), None),
            Path::new(".cache/benchboard/benchboard.sqlite")
        );
        assert_eq!(
            db_path(Path::new(".cache/benchboard"), Some(Path::new("/tmp/x.sqlite"))),
            Path::new("/tmp/x.sqlite")
        );
    }
}
