use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use super::open_store;
use crate::benchmark::list_configs;
use crate::cli::ListArgs;
use crate::model::BenchmarkConfig;
use crate::util::write_json_stdout;

#[derive(Debug, Clone, Serialize, PartialEq)]
struct BenchmarkSummary {
    id: String,
    parent: Option<String>,
    name: Option<String>,
    benchmark_type: Option<String>,
    view_count: usize,
}

impl From<&BenchmarkConfig> for BenchmarkSummary {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            id: config.id.clone(),
            parent: config.parent.clone(),
            name: config.name.clone(),
            benchmark_type: config.benchmark_type.clone(),
            view_count: config.views.len(),
        }
    }
}

pub fn run(args: ListArgs) -> Result<()> {
    let store = open_store(&args.cache_root, args.db_path.as_deref())?;
    let configs = list_configs(&store, args.parent.as_deref())?;
    let summaries = configs.iter().map(BenchmarkSummary::from).collect::<Vec<_>>();

    info!(
        parent = %args.parent.as_deref().unwrap_or("*"),
        benchmarks = summaries.len(),
        "listed benchmarks"
    );

    if args.json {
        return write_json_stdout(&summaries);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    for summary in &summaries {
        writeln!(
            output,
            "{}\t{}\t{}\tviews={}",
            summary.id,
            summary.name.as_deref().unwrap_or("-"),
            summary.benchmark_type.as_deref().unwrap_or("-"),
            summary.view_count
        )?;
    }
    output.flush()?;
    Ok(())
}
