use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::model::{PlotSeries, TableData};
use crate::table::{Table, Value};

const SCORE_COLUMN: &str = "score";

fn empty_table_data(view_name: &str) -> TableData {
    TableData {
        name: view_name.to_string(),
        system_names: Vec::new(),
        column_names: Vec::new(),
        scores: vec![Vec::new()],
        plot_x_values: Vec::new(),
        plot_y_values: Vec::new(),
    }
}

fn column_label(element_names: &[(usize, &str)], row: &[Value]) -> String {
    let mut label = SCORE_COLUMN.to_string();
    for (index, name) in element_names {
        if let Some(text) = row[*index].as_str().filter(|text| !text.is_empty()) {
            label.push('\n');
            label.push_str(name);
            label.push('=');
            label.push_str(text);
        }
    }
    label
}

pub fn to_table_data(
    view_name: &str,
    table: &Table,
    plots: &PlotSeries,
    row_column: &str,
) -> TableData {
    let Some(row_index) = table.column_index(row_column) else {
        warn!(view = %view_name, column = %row_column, "row column missing from view table");
        return empty_table_data(view_name);
    };
    let score_index = table.column_index(SCORE_COLUMN);

    let element_names = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(index, column)| *index != row_index && column.name != SCORE_COLUMN)
        .map(|(index, column)| (index, column.name.as_str()))
        .collect::<Vec<_>>();

    let row_labels = table
        .rows()
        .iter()
        .map(|row| row[row_index].label())
        .collect::<Vec<_>>();
    let column_labels = table
        .rows()
        .iter()
        .map(|row| column_label(&element_names, row))
        .collect::<Vec<_>>();

    let system_names = row_labels.iter().cloned().collect::<BTreeSet<_>>();
    let column_names = column_labels.iter().cloned().collect::<BTreeSet<_>>();
    if system_names.is_empty() || column_names.is_empty() {
        return empty_table_data(view_name);
    }

    let row_positions = system_names
        .iter()
        .enumerate()
        .map(|(position, name)| (name.as_str(), position))
        .collect::<BTreeMap<_, _>>();
    let column_positions = column_names
        .iter()
        .enumerate()
        .map(|(position, name)| (name.as_str(), position))
        .collect::<BTreeMap<_, _>>();

    let mut scores = vec![vec![0.0; column_names.len()]; system_names.len()];
    let mut non_finite = 0usize;
    for ((row, row_label), column_label) in table.rows().iter().zip(&row_labels).zip(&column_labels) {
        let mut score = score_index
            .and_then(|index| row[index].as_f64())
            .unwrap_or(0.0);
        if !score.is_finite() {
            non_finite += 1;
            score = 0.0;
        }
        scores[row_positions[row_label.as_str()]][column_positions[column_label.as_str()]] = score;
    }
    if non_finite > 0 {
        warn!(view = %view_name, count = non_finite, "non-finite scores rendered as 0");
    }

    let mut ordered = system_names.into_iter().zip(scores).collect::<Vec<_>>();
    ordered.sort_by(|(_, left), (_, right)| right[0].total_cmp(&left[0]));
    let (system_names, scores): (Vec<_>, Vec<_>) = ordered.into_iter().unzip();

    let points = plots.get(view_name).map(Vec::as_slice).unwrap_or_default();
    TableData {
        name: view_name.to_string(),
        system_names,
        column_names: column_names.into_iter().collect(),
        scores,
        plot_x_values: points.iter().map(|(date, _)| date.clone()).collect(),
        plot_y_values: points.iter().map(|(_, value)| *value).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::to_table_data;
    use crate::model::PlotSeries;
    use crate::table::{Column, Table, Value};

    fn metric_table(rows: &[(&str, &str, f64)]) -> Table {
        let mut table = Table::new(vec![
            Column::text("system"),
            Column::text("metric"),
            Column::numeric("score"),
        ]);
        for (system, metric, score) in rows {
            table.push_row(vec![Value::from(*system), Value::from(*metric), Value::Number(*score)]);
        }
        table
    }

    #[test]
    fn pivots_and_sorts_rows_by_first_column_descending() {
        let table = metric_table(&[("A", "bleu", 1.0), ("B", "bleu", 2.0)]);
        let mut plots = PlotSeries::new();
        plots.insert("v".to_string(), vec![("2022-01-01".to_string(), 2.0)]);

        let data = to_table_data("v", &table, &plots, "system");
        assert_eq!(data.system_names, vec!["B", "A"]);
        assert_eq!(data.column_names, vec!["score\nmetric=bleu"]);
        assert_eq!(data.scores, vec![vec![2.0], vec![1.0]]);
        assert_eq!(data.plot_x_values, vec!["2022-01-01"]);
        assert_eq!(data.plot_y_values, vec![2.0]);
    }

    #[test]
    fn missing_cells_default_to_zero_and_empty_labels_are_skipped() {
        let table = metric_table(&[("A", "bleu", 0.3), ("A", "chrf", 0.6), ("B", "", 0.9)]);
        let data = to_table_data("v", &table, &PlotSeries::new(), "system");

        assert_eq!(data.column_names, vec!["score", "score\nmetric=bleu", "score\nmetric=chrf"]);
        assert_eq!(data.system_names, vec!["B", "A"]);
        assert_eq!(data.scores, vec![vec![0.9, 0.0, 0.0], vec![0.0, 0.3, 0.6]]);
        assert!(data.plot_x_values.is_empty());
    }

    #[test]
    fn empty_input_yields_single_empty_score_row() {
        let data = to_table_data("v", &metric_table(&[]), &PlotSeries::new(), "system");
        assert!(data.system_names.is_empty());
        assert_eq!(data.scores, vec![Vec::<f64>::new()]);

        let data = to_table_data("v", &metric_table(&[("A", "bleu", 1.0)]), &PlotSeries::new(), "creator");
        assert!(data.column_names.is_empty());
    }

    #[test]
    fn non_finite_scores_render_as_zero() {
        let table = metric_table(&[("A", "bleu", f64::INFINITY), ("B", "bleu", 0.5)]);
        let data = to_table_data("v", &table, &PlotSeries::new(), "system");
        assert_eq!(data.system_names, vec!["B", "A"]);
        assert_eq!(data.scores, vec![vec![0.5], vec![0.0]]);
    }
}
