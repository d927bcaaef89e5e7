use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::info;

use super::{load_registry, open_store, plot_cache};
use crate::benchmark::{
    GroupKey, build_long_table, generate_view_tables, load_systems, plots, resolve_config,
    to_table_data, validate_config,
};
use crate::cli::TableArgs;
use crate::model::TableData;
use crate::util::write_json_stdout;

pub fn run(args: TableArgs) -> Result<()> {
    let store = open_store(&args.cache_root, args.db_path.as_deref())?;
    let registry = load_registry(args.registry_path.as_deref())?;
    let cache = plot_cache(&args.cache_root);

    let config = resolve_config(&store, &args.benchmark)?;
    if config.is_abstract() {
        bail!("benchmark {} is abstract and has no leaderboard", config.id);
    }
    validate_config(&config, &registry)?;

    let systems = load_systems(&config, &store)?;
    let long_table = build_long_table(&config, &systems, &store, &registry)?;
    let views = generate_view_tables(&config, &long_table, args.by_creator, &registry)?;
    let plot_series = plots(
        &store,
        &cache,
        &registry,
        &args.benchmark,
        Duration::from_millis(args.plot_ttl_ms),
    )?;

    let row_column = GroupKey::identity_column(args.by_creator);
    let tables = views
        .iter()
        .map(|(view_name, table)| to_table_data(view_name, table, &plot_series, row_column))
        .collect::<Vec<_>>();

    info!(
        benchmark = %config.id,
        systems = systems.len(),
        rows = long_table.len(),
        views = tables.len(),
        by_creator = args.by_creator,
        "rendered benchmark tables"
    );

    if args.json {
        return write_json_stdout(&tables);
    }
    write_text_tables(&tables)
}

fn flatten_label(label: &str) -> String {
    label.replace('\n', " | ")
}

fn write_text_tables(tables: &[TableData]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for table in tables {
        writeln!(output, "== {} ==", table.name)?;
        if table.system_names.is_empty() {
            writeln!(output, "(no results)")?;
            writeln!(output)?;
            continue;
        }

        let header = table
            .column_names
            .iter()
            .map(|name| flatten_label(name))
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(output, "system\t{header}")?;
        for (system_name, scores) in table.system_names.iter().zip(&table.scores) {
            let cells = scores
                .iter()
                .map(|score| format!("{score:.4}"))
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(output, "{system_name}\t{cells}")?;
        }
        if !table.plot_x_values.is_empty() {
            writeln!(
                output,
                "trend: {} points, latest {} = {:.4}",
                table.plot_x_values.len(),
                table.plot_x_values.last().map(String::as_str).unwrap_or_default(),
                table.plot_y_values.last().copied().unwrap_or_default()
            )?;
        }
        writeln!(output)?;
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::flatten_label;

    #[test]
    fn multi_line_labels_flatten_for_text_output() {
        assert_eq!(
            flatten_label("score\nmetric=bleu\ntarget_language=fra"),
            "score | metric=bleu | target_language=fra"
        );
    }
}
