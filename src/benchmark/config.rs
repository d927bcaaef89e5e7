use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::debug;

use super::trend::TIMES_KEY;
use crate::error::ConfigError;
use crate::model::{BenchmarkConfig, OpKind, Operation, SystemModel};
use crate::registry::Registry;
use crate::store::{BenchmarkSource, SystemFilter, SystemSource};

pub fn resolve_config<S>(source: &S, benchmark_id: &str) -> Result<BenchmarkConfig>
where
    S: BenchmarkSource + ?Sized,
{
    let mut chain = Vec::new();
    let document = resolve_document(source, benchmark_id, &mut chain)?;
    let config: BenchmarkConfig = serde_json::from_value(Value::Object(document))
        .with_context(|| format!("failed to parse benchmark {benchmark_id}"))?;
    debug!(benchmark = %benchmark_id, depth = chain.len(), "resolved benchmark config");
    Ok(config)
}

pub fn list_configs<S>(source: &S, parent: Option<&str>) -> Result<Vec<BenchmarkConfig>>
where
    S: BenchmarkSource + ?Sized,
{
    let documents = source.find_benchmark_documents(parent)?;
    let mut configs = Vec::with_capacity(documents.len());
    for document in documents {
        let benchmark_id = document
            .get("id")
            .and_then(Value::as_str)
            .context("stored benchmark is missing `id`")?;
        configs.push(resolve_config(source, benchmark_id)?);
    }
    Ok(configs)
}

fn resolve_document<S>(
    source: &S,
    benchmark_id: &str,
    chain: &mut Vec<String>,
) -> Result<Map<String, Value>>
where
    S: BenchmarkSource + ?Sized,
{
    if chain.iter().any(|seen| seen == benchmark_id) {
        return Err(ConfigError::ParentCycle(benchmark_id.to_string()).into());
    }
    chain.push(benchmark_id.to_string());

    let document = source
        .find_benchmark_document(benchmark_id)?
        .ok_or_else(|| ConfigError::BenchmarkNotFound(benchmark_id.to_string()))?;
    let Value::Object(child) = document else {
        anyhow::bail!("benchmark {benchmark_id} is not a json object");
    };

    let Some(parent_id) = child.get("parent").and_then(Value::as_str) else {
        return Ok(child);
    };
    let mut resolved = resolve_document(source, parent_id, chain)?;
    overlay_non_null(&mut resolved, &child);
    Ok(resolved)
}

pub fn overlay_non_null(dest: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if !value.is_null() {
            dest.insert(key.clone(), value.clone());
        }
    }
}

pub fn system_filter(config: &BenchmarkConfig) -> Result<SystemFilter, ConfigError> {
    if let Some(query) = &config.system_query {
        Ok(SystemFilter::from_query(query))
    } else if let Some(datasets) = &config.datasets {
        Ok(SystemFilter::from_datasets(datasets))
    } else {
        Err(ConfigError::MissingSystemSource(config.id.clone()))
    }
}

pub fn load_systems<S>(config: &BenchmarkConfig, source: &S) -> Result<Vec<SystemModel>>
where
    S: SystemSource + ?Sized,
{
    let filter = system_filter(config)?;
    let systems = source
        .find_systems(&filter)?
        .into_iter()
        .filter(|system| system.dataset.is_some())
        .collect::<Vec<_>>();
    debug!(benchmark = %config.id, systems = systems.len(), "loaded benchmark systems");
    Ok(systems)
}

pub(crate) fn required<'a, T: ?Sized>(
    value: Option<&'a T>,
    op: OpKind,
    param: &'static str,
) -> Result<&'a T, ConfigError> {
    value.ok_or(ConfigError::MissingParameter {
        op: op.as_str(),
        param,
    })
}

fn validate_operation(operation: &Operation, registry: &Registry) -> Result<(), ConfigError> {
    let op = operation.op;
    match op {
        OpKind::Multiply | OpKind::WeightedSum => {
            required(operation.weight.as_deref(), op, "weight")?;
            if let Some(spec) = &operation.weight_map {
                registry.weight_map(spec)?;
            }
        }
        OpKind::AddDefault => {
            required(operation.column.as_deref(), op, "column")?;
            let set_name = required(operation.default_set.as_deref(), op, "default_set")?;
            registry.default_set(set_name)?;
        }
        OpKind::Subtract => {
            required(operation.num.as_ref(), op, "num")?;
        }
        OpKind::Mean | OpKind::Sum | OpKind::Max | OpKind::Min | OpKind::Gini => {}
    }
    Ok(())
}

pub fn validate_config(config: &BenchmarkConfig, registry: &Registry) -> Result<(), ConfigError> {
    system_filter(config)?;

    if let Some(datasets) = &config.datasets {
        for dataset in datasets {
            if dataset.metrics.is_none() && config.metrics.is_none() {
                let key = dataset.key();
                return Err(ConfigError::MissingMetrics {
                    dataset_name: key.dataset_name,
                    sub_dataset: key.sub_dataset.unwrap_or_else(|| "None".to_string()),
                    split: key.split,
                });
            }
        }
    }

    for view in &config.views {
        if view.name == TIMES_KEY {
            return Err(ConfigError::ReservedViewName(view.name.clone()));
        }
        for operation in &view.operations {
            validate_operation(operation, registry)?;
        }
    }
    Ok(())
}
