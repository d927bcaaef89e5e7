use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::model::{
    BenchmarkConfig, BenchmarkMetric, DEFAULT_SPLIT, DatasetConfig, DatasetKey, DatasetMetadata,
    SystemModel,
};
use crate::registry::Registry;
use crate::store::DatasetSource;
use crate::table::{Column, ColumnKind, Table, Value};

const IDENTITY_COLUMNS: [&str; 5] = [
    "system_name",
    "dataset_name",
    "sub_dataset",
    "dataset_split",
    "creator",
];
const SCORE_COLUMNS: [&str; 3] = ["metric", "metric_weight", "score"];
const SPLIT_COLUMN: &str = "split";
const FALLBACK_LANGUAGE: &str = "eng";

pub fn build_long_table<D>(
    config: &BenchmarkConfig,
    systems: &[SystemModel],
    datasets: &D,
    registry: &Registry,
) -> Result<Table>
where
    D: DatasetSource + ?Sized,
{
    let dataset_configs = resolve_dataset_configs(config, systems);

    let mut metadata = Vec::with_capacity(dataset_configs.len());
    for dataset_config in &dataset_configs {
        let found = datasets.find_dataset(
            &dataset_config.dataset_name,
            dataset_config.sub_dataset.as_deref(),
            true,
        )?;
        if found.is_none() {
            warn!(dataset = %dataset_config.key(), "could not find dataset");
        }
        metadata.push(found);
    }

    let table = fill_long_table(config, &dataset_configs, &metadata, systems, registry)?;
    debug!(
        benchmark = %config.id,
        datasets = dataset_configs.len(),
        rows = table.len(),
        "built long table"
    );
    Ok(table)
}

pub(crate) fn resolve_dataset_configs(
    config: &BenchmarkConfig,
    systems: &[SystemModel],
) -> Vec<DatasetConfig> {
    if let Some(datasets) = config.datasets.as_ref().filter(|datasets| !datasets.is_empty()) {
        return datasets.clone();
    }

    let mut seen = HashSet::new();
    systems
        .iter()
        .filter_map(|system| system.dataset.as_ref().map(|dataset| dataset.key()))
        .filter(|key| seen.insert(key.clone()))
        .map(|key| DatasetConfig::from_key(&key))
        .collect()
}

pub(crate) fn long_table_schema(
    config: &BenchmarkConfig,
    dataset_configs: &[DatasetConfig],
    registry: &Registry,
) -> Vec<Column> {
    let mut columns = IDENTITY_COLUMNS
        .iter()
        .map(|name| Column::text(name))
        .collect::<Vec<_>>();
    let reserved = |name: &str, columns: &[Column]| {
        columns.iter().any(|column| column.name == name)
            || SCORE_COLUMNS.contains(&name)
            || name == "metrics"
            || registry.is_weight_map_name(name)
    };

    let carries_split = dataset_configs
        .iter()
        .any(|dataset_config| dataset_config.split.is_some());
    if carries_split && !reserved(SPLIT_COLUMN, &columns) {
        columns.push(Column::text(SPLIT_COLUMN));
    }

    for dataset_config in dataset_configs {
        for key in dataset_config.extra.keys() {
            if reserved(key.as_str(), &columns) {
                continue;
            }
            columns.push(Column {
                name: key.clone(),
                kind: extra_column_kind(key, dataset_configs),
            });
        }
    }

    for view in &config.views {
        for operation in &view.operations {
            let op_keys = operation.weight.iter().chain(operation.group_by.iter());
            for key in op_keys {
                if !reserved(key.as_str(), &columns) {
                    columns.push(Column::text(key));
                }
            }
        }
    }

    columns.push(Column::text("metric"));
    columns.push(Column::numeric("metric_weight"));
    columns.push(Column::numeric("score"));
    columns
}

fn extra_column_kind(key: &str, dataset_configs: &[DatasetConfig]) -> ColumnKind {
    let mut values = dataset_configs
        .iter()
        .filter_map(|dataset_config| dataset_config.extra.get(key))
        .filter(|value| !value.is_null())
        .peekable();
    if values.peek().is_some() && values.all(serde_json::Value::is_number) {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

struct SystemSlots<'a> {
    name: &'a str,
    creator: &'a str,
    slots: Vec<Option<&'a SystemModel>>,
}

fn arrange_by_system<'a>(
    systems: &'a [SystemModel],
    dataset_index: &HashMap<DatasetKey, usize>,
) -> Vec<SystemSlots<'a>> {
    let mut arranged = Vec::<SystemSlots<'a>>::new();
    let mut positions = HashMap::<&str, usize>::new();

    for system in systems {
        let Some(slot) = system
            .dataset
            .as_ref()
            .and_then(|dataset| dataset_index.get(&dataset.key()))
        else {
            continue;
        };

        let position = *positions.entry(&system.system_name).or_insert_with(|| {
            arranged.push(SystemSlots {
                name: &system.system_name,
                creator: &system.creator,
                slots: vec![None; dataset_index.len()],
            });
            arranged.len() - 1
        });
        let entry = &mut arranged[position];
        entry.creator = &system.creator;
        entry.slots[*slot] = Some(system);
    }

    arranged
}

fn dataset_metrics<'a>(
    config: &'a BenchmarkConfig,
    dataset_config: &'a DatasetConfig,
) -> Result<&'a [BenchmarkMetric], ConfigError> {
    dataset_config
        .metrics
        .as_deref()
        .or(config.metrics.as_deref())
        .ok_or_else(|| {
            let key = dataset_config.key();
            ConfigError::MissingMetrics {
                dataset_name: key.dataset_name,
                sub_dataset: key.sub_dataset.unwrap_or_else(|| "None".to_string()),
                split: key.split,
            }
        })
}

fn language_fallback(metadata: &DatasetMetadata, first: bool) -> Value {
    let language = if first {
        metadata.languages.first()
    } else {
        metadata.languages.last()
    };
    match language {
        Some(language) => Value::from(language.as_str()),
        None => {
            warn!(dataset = %metadata.dataset_name, "no languages found for dataset");
            Value::from(FALLBACK_LANGUAGE)
        }
    }
}

pub(crate) fn fill_long_table(
    config: &BenchmarkConfig,
    dataset_configs: &[DatasetConfig],
    metadata: &[Option<DatasetMetadata>],
    systems: &[SystemModel],
    registry: &Registry,
) -> Result<Table, ConfigError> {
    let metric_lists = dataset_configs
        .iter()
        .map(|dataset_config| dataset_metrics(config, dataset_config))
        .collect::<Result<Vec<_>, _>>()?;

    let dataset_index = dataset_configs
        .iter()
        .enumerate()
        .map(|(index, dataset_config)| (dataset_config.key(), index))
        .collect::<HashMap<_, _>>();
    let arranged = arrange_by_system(systems, &dataset_index);

    let mut table = Table::new(long_table_schema(config, dataset_configs, registry));
    let column_names = table
        .column_names()
        .into_iter()
        .map(ToOwned::to_owned)
        .collect::<Vec<_>>();

    for entry in &arranged {
        for (index, dataset_config) in dataset_configs.iter().enumerate() {
            let Some(dataset_metadata) = metadata[index].as_ref() else {
                continue;
            };
            let metrics = metric_lists[index];
            let slot = entry.slots[index];
            let creator = slot.map_or(entry.creator, |system| system.creator.as_str());

            for metric in metrics {
                let metric_weight = metric.weight.unwrap_or(1.0 / metrics.len() as f64);
                let measured = slot.and_then(|system| system.best_score(&metric.name));
                let score = measured.or(metric.default).unwrap_or(0.0);

                let mut known = dataset_config
                    .extra
                    .iter()
                    .map(|(key, value)| (key.as_str(), Value::from_json(value)))
                    .collect::<BTreeMap<_, _>>();
                known.insert("system_name", Value::from(entry.name));
                known.insert("dataset_name", Value::from(dataset_config.dataset_name.as_str()));
                known.insert("creator", Value::from(creator));
                known.insert("metric", Value::from(metric.name.as_str()));
                known.insert("metric_weight", Value::Number(metric_weight));
                known.insert("score", Value::Number(score));
                if let Some(sub_dataset) = &dataset_config.sub_dataset {
                    known.insert("sub_dataset", Value::from(sub_dataset.as_str()));
                }
                if let Some(split) = &dataset_config.split {
                    known.insert("dataset_split", Value::from(split.as_str()));
                    known.insert(SPLIT_COLUMN, Value::from(split.as_str()));
                }

                let row = column_names
                    .iter()
                    .map(|name| match known.remove(name.as_str()) {
                        Some(value) => value,
                        None => fallback_value(name, dataset_metadata),
                    })
                    .collect();
                table.push_row(row);
            }
        }
    }

    Ok(table)
}

fn fallback_value(column: &str, metadata: &DatasetMetadata) -> Value {
    match column {
        "sub_dataset" => Value::Null,
        "dataset_split" => Value::from(DEFAULT_SPLIT),
        "source_language" => language_fallback(metadata, true),
        "target_language" => language_fallback(metadata, false),
        other => {
            warn!(column = %other, dataset = %metadata.dataset_name, "no value found for column");
            Value::Null
        }
    }
}
