use std::fs;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::{db_path, open_store};
use crate::cli::ImportArgs;
use crate::model::{ImportBundle, ImportCounts, ImportRunManifest};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: ImportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("import_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = db_path(&args.cache_root, args.db_path.as_deref());

    info!(input = %args.input.display(), run_id = %run_id, "starting import");

    let raw = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let bundle: ImportBundle = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let warnings = bundle_warnings(&bundle);
    for warning in &warnings {
        warn!(warning = %warning, "import warning");
    }

    let mut store = open_store(&args.cache_root, Some(db_path.as_path()))?;
    let stats = store.import_bundle(&bundle)?;

    let counts = ImportCounts {
        benchmarks_upserted: stats.benchmarks,
        systems_upserted: stats.systems,
        datasets_upserted: stats.datasets,
        benchmarks_total: store.count_rows("benchmarks")?,
        systems_total: store.count_rows("systems")?,
        datasets_total: store.count_rows("datasets")?,
    };
    let manifest = ImportRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        input_path: args.input.display().to_string(),
        db_path: db_path.display().to_string(),
        counts,
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote import run manifest");
    info!(
        benchmarks = manifest.counts.benchmarks_total,
        systems = manifest.counts.systems_total,
        datasets = manifest.counts.datasets_total,
        "import completed"
    );
    Ok(())
}

fn bundle_warnings(bundle: &ImportBundle) -> Vec<String> {
    let mut warnings = Vec::new();
    for system in &bundle.systems {
        if system.dataset.is_none() {
            warnings.push(format!(
                "system {} has no dataset binding and will never appear in a benchmark",
                system.system_id
            ));
        }
    }
    for dataset in &bundle.datasets {
        if dataset.languages.is_empty() {
            warnings.push(format!(
                "dataset {} -- {} lists no languages",
                dataset.dataset_name,
                dataset.sub_dataset.as_deref().unwrap_or("None")
            ));
        }
    }
    warnings
}
