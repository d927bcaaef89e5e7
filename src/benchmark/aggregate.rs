use std::cmp::Ordering;

use tracing::{debug, warn};

use super::config::required;
use super::gini::gini;
use super::group_key::{GroupKey, OVERALL_LABEL};
use crate::error::ConfigError;
use crate::model::{BenchmarkConfig, ORIGINAL_VIEW, OpKind, Operation, View};
use crate::registry::Registry;
use crate::table::{Column, Table, Value};

const SCORE_COLUMN: &str = "score";
const LOGIT_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    Table(Table),
    Aggregate(Vec<(String, f64)>),
}

impl Reduced {
    // A single aggregate row becomes a one-row table labelled "Overall".
    pub fn normalize(self, identity_column: &str) -> Table {
        match self {
            Self::Table(table) => table,
            Self::Aggregate(values) => {
                let mut table = Table::new(
                    values
                        .iter()
                        .map(|(name, _)| Column::numeric(name))
                        .collect(),
                );
                table.push_row(values.iter().map(|(_, value)| Value::Number(*value)).collect());
                table.stamp_column(Column::text(identity_column), Value::from(OVERALL_LABEL));
                table
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Sum,
    Max,
    Min,
}

impl Reduction {
    pub fn apply(self, values: impl IntoIterator<Item = f64>) -> f64 {
        let present = values
            .into_iter()
            .filter(|value| !value.is_nan())
            .collect::<Vec<_>>();
        match self {
            Self::Sum => present.iter().sum(),
            Self::Mean if present.is_empty() => f64::NAN,
            Self::Mean => present.iter().sum::<f64>() / present.len() as f64,
            Self::Max => present.into_iter().reduce(f64::max).unwrap_or(f64::NAN),
            Self::Min => present.into_iter().reduce(f64::min).unwrap_or(f64::NAN),
        }
    }
}

// Numbers sort before text, nulls sort last.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(_), Value::Text(_)) => Ordering::Less,
        (Value::Text(_), Value::Number(_)) => Ordering::Greater,
    }
}

fn compare_keys(left: &[Value], right: &[Value]) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(a, b)| compare_values(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn column_index(table: &Table, op: OpKind, column: &str) -> Result<usize, ConfigError> {
    table
        .column_index(column)
        .ok_or_else(|| ConfigError::MissingColumn {
            op: op.as_str(),
            column: column.to_string(),
        })
}

pub fn reduce(
    table: &Table,
    key: &GroupKey,
    reduction: Reduction,
    op: OpKind,
) -> Result<Reduced, ConfigError> {
    if key.is_empty() {
        let values = table
            .columns()
            .iter()
            .filter(|column| column.is_numeric())
            .filter_map(|column| {
                let values = table.numeric_values(&column.name)?;
                Some((column.name.clone(), reduction.apply(values)))
            })
            .collect();
        return Ok(Reduced::Aggregate(values));
    }

    let key_indices = key
        .columns()
        .iter()
        .map(|column| column_index(table, op, column))
        .collect::<Result<Vec<_>, _>>()?;
    let value_indices = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(index, column)| column.is_numeric() && !key_indices.contains(index))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    let mut columns = key_indices
        .iter()
        .map(|index| table.columns()[*index].clone())
        .collect::<Vec<_>>();
    columns.extend(value_indices.iter().map(|index| table.columns()[*index].clone()));
    let mut reduced = Table::new(columns);

    let row_keys = table
        .rows()
        .iter()
        .map(|row| key_indices.iter().map(|index| row[*index].clone()).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let mut order = (0..table.len())
        .filter(|index| !row_keys[*index].iter().any(|value| matches!(value, Value::Null)))
        .collect::<Vec<_>>();
    if order.len() < table.len() {
        debug!(dropped = table.len() - order.len(), "skipped rows with null group keys");
    }
    order.sort_by(|a, b| compare_keys(&row_keys[*a], &row_keys[*b]));

    for group in order.chunk_by(|a, b| compare_keys(&row_keys[*a], &row_keys[*b]).is_eq()) {
        let mut row = row_keys[group[0]].clone();
        for index in &value_indices {
            let values = group.iter().map(|member| {
                table.rows()[*member][*index]
                    .as_f64()
                    .unwrap_or(f64::NAN)
            });
            row.push(Value::Number(reduction.apply(values)));
        }
        reduced.push_row(row);
    }

    Ok(Reduced::Table(reduced))
}

pub(crate) fn sharpen_weights(weights: &[f64], multiplier: f64) -> Vec<f64> {
    let adjusted = weights
        .iter()
        .map(|weight| ((weight + LOGIT_EPSILON).ln() * multiplier).exp())
        .collect::<Vec<_>>();
    let total = adjusted.iter().sum::<f64>();
    adjusted.into_iter().map(|weight| weight / total).collect()
}

fn multiply(
    mut table: Table,
    operation: &Operation,
    registry: &Registry,
) -> Result<Table, ConfigError> {
    let op = operation.op;
    let weight_column = required(operation.weight.as_deref(), op, "weight")?;
    let weight_index = column_index(&table, op, weight_column)?;
    column_index(&table, op, SCORE_COLUMN)?;

    let mut weights = match &operation.weight_map {
        Some(spec) => {
            let weight_map = registry.weight_map(spec)?;
            let mut unmapped = 0usize;
            let weights = table
                .rows()
                .iter()
                .map(|row| match weight_map.get(&row[weight_index].label()) {
                    Some(weight) => *weight,
                    None => {
                        unmapped += 1;
                        0.0
                    }
                })
                .collect::<Vec<_>>();
            if unmapped > 0 {
                debug!(column = %weight_column, unmapped, "weight map left values unmapped, using 0");
            }
            weights
        }
        None => table.numeric_values(weight_column).unwrap_or_default(),
    };

    if let Some(multiplier) = operation.weight_logit_multiplier {
        weights = sharpen_weights(&weights, multiplier);
    }

    let scores = table
        .numeric_values(SCORE_COLUMN)
        .unwrap_or_default()
        .into_iter()
        .zip(&weights)
        .map(|(score, weight)| score * weight)
        .collect::<Vec<_>>();
    table.set_numeric_values(SCORE_COLUMN, &scores);
    Ok(table)
}

fn add_default(
    mut table: Table,
    operation: &Operation,
    registry: &Registry,
) -> Result<Table, ConfigError> {
    let op = operation.op;
    let column = required(operation.column.as_deref(), op, "column")?;
    let set_name = required(operation.default_set.as_deref(), op, "default_set")?;
    let defaults = registry.default_set(set_name)?;
    let target_index = column_index(&table, op, column)?;
    let score_index = column_index(&table, op, SCORE_COLUMN)?;

    let missing = defaults
        .iter()
        .map(|value| Value::from(value.as_str()))
        .filter(|value| !table.rows().iter().any(|row| &row[target_index] == value))
        .collect::<Vec<_>>();

    let width = table.columns().len();
    for value in missing {
        let mut row = vec![Value::Null; width];
        row[target_index] = value;
        row[score_index] = Value::Number(0.0);
        table.push_row(row);
    }
    Ok(table)
}

fn subtract(mut table: Table, operation: &Operation) -> Result<Table, ConfigError> {
    let op = operation.op;
    let num = *required(operation.num.as_ref(), op, "num")?;
    let scores = table
        .numeric_values(SCORE_COLUMN)
        .ok_or_else(|| ConfigError::MissingColumn {
            op: op.as_str(),
            column: SCORE_COLUMN.to_string(),
        })?
        .into_iter()
        .map(|score| num - score)
        .collect::<Vec<_>>();
    table.set_numeric_values(SCORE_COLUMN, &scores);
    Ok(table)
}

fn prune(table: &Table) -> Table {
    let mut keep = table
        .columns()
        .iter()
        .filter(|column| !column.is_numeric() && column.name != SCORE_COLUMN)
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>();
    keep.push(SCORE_COLUMN);
    table.select(&keep)
}

pub fn aggregate_view(
    table: &Table,
    view: &View,
    by_creator: bool,
    registry: &Registry,
) -> Result<Table, ConfigError> {
    if table.is_empty() {
        return Ok(table.clone());
    }

    let identity_column = GroupKey::identity_column(by_creator);
    let mut output = table.clone();
    for operation in &view.operations {
        let op = operation.op;
        let key = GroupKey::new(by_creator, operation.skip_group_system, &operation.group_by);

        let reduced = match op {
            OpKind::Mean => reduce(&output, &key, Reduction::Mean, op)?,
            OpKind::Sum => reduce(&output, &key, Reduction::Sum, op)?,
            OpKind::Max => reduce(&output, &key, Reduction::Max, op)?,
            OpKind::Min => reduce(&output, &key, Reduction::Min, op)?,
            OpKind::Gini => {
                if !key.is_empty() {
                    warn!(view = %view.name, "cannot group and gini, skipping grouping");
                }
                Reduced::Aggregate(gini(&output, true))
            }
            OpKind::Multiply => Reduced::Table(multiply(output, operation, registry)?),
            OpKind::WeightedSum => {
                let weighted = multiply(output, operation, registry)?;
                reduce(&weighted, &key, Reduction::Sum, op)?
            }
            OpKind::AddDefault => {
                output = add_default(output, operation, registry)?;
                debug!(view = %view.name, op = op.as_str(), rows = output.len(), "applied operation");
                continue;
            }
            OpKind::Subtract => Reduced::Table(subtract(output, operation)?),
        };

        output = reduced.normalize(identity_column);
        let replaced = output.fill_missing_numeric();
        if replaced > 0 {
            warn!(
                view = %view.name,
                op = op.as_str(),
                replaced,
                "operation resulted in NaN, replacing with 0"
            );
        }
        debug!(view = %view.name, op = op.as_str(), rows = output.len(), "applied operation");
    }

    Ok(prune(&output))
}

pub fn generate_view_tables(
    config: &BenchmarkConfig,
    table: &Table,
    by_creator: bool,
    registry: &Registry,
) -> Result<Vec<(String, Table)>, ConfigError> {
    let mut views = Vec::with_capacity(config.views.len() + 1);
    for view in &config.views {
        views.push((view.name.clone(), aggregate_view(table, view, by_creator, registry)?));
    }
    views.push((ORIGINAL_VIEW.to_string(), table.clone()));
    Ok(views)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Reduced, Reduction, aggregate_view, compare_values, sharpen_weights};
    use crate::benchmark::tests::{scored_table, view};
    use crate::error::ConfigError;
    use crate::registry::Registry;
    use crate::table::{Column, Value};

    #[test]
    fn reductions_skip_nan_and_handle_empty_groups() {
        let values = [1.0, f64::NAN, 3.0];
        assert_eq!(Reduction::Mean.apply(values), 2.0);
        assert_eq!(Reduction::Sum.apply(values), 4.0);
        assert_eq!(Reduction::Max.apply(values), 3.0);
        assert_eq!(Reduction::Min.apply(values), 1.0);
        assert_eq!(Reduction::Sum.apply([f64::NAN]), 0.0);
        assert!(Reduction::Mean.apply(Vec::new()).is_nan());
        assert!(Reduction::Max.apply(Vec::new()).is_nan());
    }

    #[test]
    fn null_keys_sort_last() {
        let mut values = vec![Value::Null, Value::from("b"), Value::from("a")];
        values.sort_by(compare_values);
        assert_eq!(values, vec![Value::from("a"), Value::from("b"), Value::Null]);
    }

    #[test]
    fn aggregate_normalizes_to_overall_row() {
        let table = Reduced::Aggregate(vec![("score".to_string(), 0.5)]).normalize("creator");
        assert_eq!(table.columns()[1], Column::text("creator"));
        assert_eq!(table.get(0, "creator"), Some(&Value::from("Overall")));
        assert_eq!(table.get(0, "score"), Some(&Value::Number(0.5)));
    }

    #[test]
    fn grouped_mean_sorts_groups_and_drops_text_columns() {
        let table = scored_table(&[
            ("beta", "fra", 0.2),
            ("alpha", "fra", 0.4),
            ("beta", "deu", 0.6),
            ("alpha", "deu", 0.8),
        ]);
        let output = aggregate_view(
            &table,
            &view(json!([{"op": "mean"}])),
            false,
            &Registry::builtin(),
        )
        .expect("mean should aggregate");

        assert_eq!(output.column_names(), vec!["system_name", "score"]);
        assert_eq!(output.get(0, "system_name"), Some(&Value::from("alpha")));
        assert!((output.numeric_values("score").expect("score")[0] - 0.6).abs() < 1e-12);
        assert!((output.numeric_values("score").expect("score")[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn ungrouped_mean_collapses_to_overall() {
        let table = scored_table(&[("alpha", "fra", 0.2), ("beta", "fra", 0.4)]);
        let output = aggregate_view(
            &table,
            &view(json!([{"op": "mean", "skip_group_system": true}])),
            true,
            &Registry::builtin(),
        )
        .expect("mean should aggregate");

        assert_eq!(output.column_names(), vec!["creator", "score"]);
        assert_eq!(output.len(), 1);
        assert_eq!(output.get(0, "creator"), Some(&Value::from("Overall")));
        assert!((output.numeric_values("score").expect("score")[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn weighted_sum_maps_weights_and_fills_unmapped_with_zero() {
        let table = scored_table(&[
            ("alpha", "fra", 0.5),
            ("alpha", "deu", 1.0),
            ("alpha", "xyz", 9.0),
        ]);
        let operations = json!([
            {"op": "weighted_sum", "weight": "target_language", "weight_map": {"fra": 0.25, "deu": 0.75}}
        ]);
        let output = aggregate_view(&table, &view(operations), false, &Registry::builtin())
            .expect("weighted sum should aggregate");

        assert_eq!(output.len(), 1);
        assert!((output.numeric_values("score").expect("score")[0] - 0.875).abs() < 1e-12);
    }

    #[test]
    fn gini_ignores_grouping_and_reports_overall() {
        let table = scored_table(&[("alpha", "fra", 0.0), ("beta", "fra", 1.0)]);
        let output = aggregate_view(
            &table,
            &view(json!([{"op": "gini"}])),
            false,
            &Registry::builtin(),
        )
        .expect("gini should aggregate");

        assert_eq!(output.get(0, "system_name"), Some(&Value::from("Overall")));
        assert!((output.numeric_values("score").expect("score")[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_gini_is_replaced_with_zero() {
        let table = scored_table(&[("alpha", "fra", 0.0), ("beta", "fra", 0.0)]);
        let output = aggregate_view(
            &table,
            &view(json!([{"op": "gini"}])),
            false,
            &Registry::builtin(),
        )
        .expect("gini should aggregate");
        assert_eq!(output.numeric_values("score"), Some(vec![0.0]));
    }

    #[test]
    fn non_numeric_weight_column_zeroes_scores() {
        let table = scored_table(&[("alpha", "fra", 0.5)]);
        let output = aggregate_view(
            &table,
            &view(json!([{"op": "multiply", "weight": "target_language"}])),
            false,
            &Registry::builtin(),
        )
        .expect("multiply should run");
        assert_eq!(output.numeric_values("score"), Some(vec![0.0]));
    }

    #[test]
    fn missing_weight_column_is_a_config_error() {
        let table = scored_table(&[("alpha", "fra", 0.5)]);
        let err = aggregate_view(
            &table,
            &view(json!([{"op": "multiply", "weight": "family"}])),
            false,
            &Registry::builtin(),
        )
        .expect_err("family is not a column");
        assert_eq!(
            err,
            ConfigError::MissingColumn {
                op: "multiply",
                column: "family".to_string()
            }
        );
    }

    #[test]
    fn add_default_pads_missing_values_only() {
        let registry = Registry::new().with_default_set(
            "langs",
            vec!["fra".to_string(), "deu".to_string(), "jpn".to_string()],
        );
        let table = scored_table(&[("alpha", "fra", 0.5)]);
        let output = aggregate_view(
            &table,
            &view(json!([{"op": "add_default", "column": "target_language", "default_set": "langs"}])),
            false,
            &registry,
        )
        .expect("add_default should run");

        assert_eq!(output.len(), 3);
        assert_eq!(output.get(1, "target_language"), Some(&Value::from("deu")));
        assert_eq!(output.get(1, "system_name"), Some(&Value::Null));
        assert_eq!(output.get(2, "score"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn padded_rows_never_form_a_nameless_group() {
        let registry = Registry::new().with_default_set(
            "langs",
            vec!["fra".to_string(), "deu".to_string(), "jpn".to_string()],
        );
        let table = scored_table(&[("alpha", "fra", 0.5), ("beta", "jpn", 0.7)]);
        let operations = json!([
            {"op": "add_default", "column": "target_language", "default_set": "langs"},
            {"op": "weighted_sum", "weight": "target_language", "weight_map": {"fra": 0.5, "deu": 0.5, "jpn": 0.5}}
        ]);
        let output = aggregate_view(&table, &view(operations), false, &registry)
            .expect("weighted sum should aggregate");

        assert_eq!(output.len(), 2);
        assert_eq!(output.get(0, "system_name"), Some(&Value::from("alpha")));
        assert_eq!(output.get(1, "system_name"), Some(&Value::from("beta")));
        let scores = output.numeric_values("score").expect("score column");
        assert!((scores[0] - 0.25).abs() < 1e-12);
        assert!((scores[1] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn sharpen_weights_renormalizes() {
        let weights = sharpen_weights(&[1.0, 3.0], 1.0);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((weights[0] - 0.25).abs() < 1e-6);
    }
}
