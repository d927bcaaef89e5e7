use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use super::{load_registry, open_store, plot_cache};
use crate::benchmark::plots;
use crate::cli::PlotsArgs;
use crate::util::write_json_stdout;

pub fn run(args: PlotsArgs) -> Result<()> {
    let store = open_store(&args.cache_root, args.db_path.as_deref())?;
    let registry = load_registry(args.registry_path.as_deref())?;
    let cache = plot_cache(&args.cache_root);

    let series = plots(
        &store,
        &cache,
        &registry,
        &args.benchmark,
        Duration::from_millis(args.plot_ttl_ms),
    )?;
    info!(benchmark = %args.benchmark, series = series.len(), "plots ready");

    if args.json {
        return write_json_stdout(&series);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for (view_name, points) in &series {
        writeln!(output, "{view_name}: {} points", points.len())?;
        for (date, value) in points {
            writeln!(output, "\t{date}\t{value:.6}")?;
        }
    }
    output.flush()?;
    Ok(())
}
