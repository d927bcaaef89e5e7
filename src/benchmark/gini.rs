use crate::table::Table;

// Mean absolute difference over all ordered pairs, normalized by n^2 * mean.
// Degenerate inputs (empty, zero mean) come back as NaN or inf.
pub fn gini_coefficient(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    // For ascending x, sum_{i<j} (x_j - x_i) = sum_k x_k * (2k - (n - 1)).
    let total = sorted
        .iter()
        .enumerate()
        .map(|(k, value)| value * (2.0 * k as f64 - (n as f64 - 1.0)))
        .sum::<f64>();
    let mean = sorted.iter().sum::<f64>() / n as f64;

    total / ((n * n) as f64 * mean)
}

pub fn gini(table: &Table, numeric_only: bool) -> Vec<(String, f64)> {
    table
        .columns()
        .iter()
        .filter(|column| !numeric_only || column.is_numeric())
        .filter_map(|column| {
            table
                .numeric_values(&column.name)
                .map(|values| (column.name.clone(), gini_coefficient(&values)))
        })
        .collect()
}
