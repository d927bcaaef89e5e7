use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{db_path, load_registry, open_store, plot_cache};
use crate::cli::StatusArgs;
use crate::store::SqliteStore;

const TABLES: [&str; 3] = ["benchmarks", "systems", "datasets"];

pub fn run(args: StatusArgs) -> Result<()> {
    let path = db_path(&args.cache_root, args.db_path.as_deref());
    info!(cache_root = %args.cache_root.display(), "status requested");

    if path.exists() {
        let store = open_store(&args.cache_root, Some(path.as_path()))?;
        let counts = table_counts(&store)?;
        info!(
            path = %path.display(),
            benchmarks = counts[0],
            systems = counts[1],
            datasets = counts[2],
            "database status"
        );
    } else {
        warn!(path = %path.display(), "database file missing");
    }

    let cache = plot_cache(&args.cache_root);
    info!(entries = cache.entry_count()?, "plot cache status");

    let registry = load_registry(args.registry_path.as_deref())?;
    info!(
        weight_maps = registry.weight_map_count(),
        default_sets = registry.default_set_count(),
        "registry status"
    );

    Ok(())
}

fn table_counts(store: &SqliteStore) -> Result<[i64; TABLES.len()]> {
    let mut counts = [0_i64; TABLES.len()];
    for (count, table) in counts.iter_mut().zip(TABLES) {
        *count = store
            .count_rows(table)
            .with_context(|| format!("failed to count rows in {table}"))?;
    }
    Ok(counts)
}
