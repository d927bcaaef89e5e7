use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::aggregate::generate_view_tables;
use super::config::{load_systems, resolve_config, validate_config};
use super::long_table::build_long_table;
use crate::model::{BenchmarkConfig, ORIGINAL_VIEW, PlotPoint, PlotSeries, SystemModel, TrendMode};
use crate::registry::Registry;
use crate::store::{DatasetSource, MetadataStore, PlotCache};

pub const PLOT_CACHE_TTL: Duration = Duration::from_secs(1);
pub(super) const TIMES_KEY: &str = "times";

pub fn plot_cache_key(benchmark_id: &str) -> String {
    format!("{benchmark_id}_plot.json")
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendRecorder {
    mode: TrendMode,
    points: Vec<PlotPoint>,
}

impl TrendRecorder {
    pub fn new(mode: TrendMode) -> Self {
        Self {
            mode,
            points: Vec::new(),
        }
    }

    pub fn record(&mut self, date: &str, value: f64) {
        let improves = self.points.last().is_none_or(|(_, last)| *last < value);
        if self.mode == TrendMode::All || improves {
            self.points.push((date.to_string(), value));
        }
    }

    pub fn into_points(self) -> Vec<PlotPoint> {
        self.points
    }
}

pub fn compute_trends<D>(
    config: &BenchmarkConfig,
    systems: &[SystemModel],
    datasets: &D,
    registry: &Registry,
) -> Result<PlotSeries>
where
    D: DatasetSource + ?Sized,
{
    let mut recorders = config
        .views
        .iter()
        .map(|view| (view.name.clone(), TrendRecorder::new(view.trend_mode())))
        .collect::<Vec<_>>();
    recorders.push((ORIGINAL_VIEW.to_string(), TrendRecorder::new(TrendMode::All)));

    let dates = systems
        .iter()
        .map(|system| system.created_at.date_naive())
        .collect::<BTreeSet<_>>();

    for date in &dates {
        let submitted = systems
            .iter()
            .filter(|system| system.created_at.date_naive() <= *date)
            .cloned()
            .collect::<Vec<_>>();
        let long_table = build_long_table(config, &submitted, datasets, registry)?;
        let views = generate_view_tables(config, &long_table, false, registry)?;

        let label = date.format("%Y-%m-%d").to_string();
        for ((view_name, table), (_, recorder)) in views.iter().zip(recorders.iter_mut()) {
            let Some(mut best) = table.max_of("score") else {
                continue;
            };
            if !best.is_finite() {
                warn!(view = %view_name, date = %label, "non-finite view maximum recorded as 0");
                best = 0.0;
            }
            recorder.record(&label, best);
        }
    }

    debug!(benchmark = %config.id, dates = dates.len(), "computed trends");
    Ok(recorders
        .into_iter()
        .map(|(name, recorder)| (name, recorder.into_points()))
        .collect())
}

pub fn encode_payload(series: &PlotSeries) -> Result<Vec<u8>> {
    let mut payload = series.clone();
    payload.insert(TIMES_KEY.to_string(), Vec::new());
    serde_json::to_vec(&payload).context("failed to encode plot payload")
}

pub fn decode_payload(bytes: &[u8]) -> Result<PlotSeries> {
    let mut series: PlotSeries =
        serde_json::from_slice(bytes).context("failed to decode plot payload")?;
    series.remove(TIMES_KEY);
    Ok(series)
}

pub fn plots<S>(
    store: &S,
    cache: &dyn PlotCache,
    registry: &Registry,
    benchmark_id: &str,
    ttl: Duration,
) -> Result<PlotSeries>
where
    S: MetadataStore + ?Sized,
{
    let config = resolve_config(store, benchmark_id)?;
    if config.is_abstract() {
        debug!(benchmark = %benchmark_id, "abstract benchmark has no plots");
        return Ok(PlotSeries::new());
    }

    let key = plot_cache_key(benchmark_id);
    if let Some(bytes) = cache.read_if_fresh(&key, ttl)? {
        match decode_payload(&bytes) {
            Ok(series) => {
                debug!(benchmark = %benchmark_id, "plot cache hit");
                return Ok(series);
            }
            Err(err) => warn!(benchmark = %benchmark_id, error = %err, "discarding unreadable plot cache"),
        }
    }

    validate_config(&config, registry)?;
    let systems = load_systems(&config, store)?;
    let series = compute_trends(&config, &systems, store, registry)?;
    cache
        .write(&key, &encode_payload(&series)?)
        .with_context(|| format!("failed to persist plots for {benchmark_id}"))?;
    info!(
        benchmark = %benchmark_id,
        systems = systems.len(),
        series = series.len(),
        "generated plots"
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{PLOT_CACHE_TTL, TrendRecorder, decode_payload, plot_cache_key, plots};
    use crate::benchmark::tests::{dataset_meta, system};
    use crate::model::{ORIGINAL_VIEW, TrendMode};
    use crate::registry::Registry;
    use crate::store::memory::{MemoryCache, MemoryStore};

    #[test]
    fn increase_mode_records_strict_improvements_only() {
        let mut recorder = TrendRecorder::new(TrendMode::Increase);
        for (day, value) in [0.5, 0.5, 0.7, 0.6, 0.9].into_iter().enumerate() {
            recorder.record(&format!("2022-01-0{}", day + 1), value);
        }
        let values = recorder
            .into_points()
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Vec<_>>();
        assert_eq!(values, vec![0.5, 0.7, 0.9]);
    }

    #[test]
    fn all_mode_records_every_date() {
        let mut recorder = TrendRecorder::new(TrendMode::All);
        recorder.record("2022-01-01", 0.5);
        recorder.record("2022-01-02", 0.4);
        assert_eq!(recorder.into_points().len(), 2);
    }

    fn store() -> MemoryStore {
        MemoryStore {
            benchmarks: vec![
                json!({"id": "template", "type": "abstract", "metrics": [{"name": "bleu"}]}),
                json!({
                    "id": "mt",
                    "parent": "template",
                    "type": "concrete",
                    "datasets": [{"dataset_name": "d1"}],
                    "views": [
                        {"name": "Best", "operations": [{"op": "mean"}]},
                        {"name": "Every", "trend": "all", "operations": [{"op": "mean"}]}
                    ]
                }),
            ],
            systems: vec![
                system("1", "alpha", "ann", ("d1", None), &[("bleu", 0.5)], "2022-01-01"),
                system("2", "beta", "bob", ("d1", None), &[("bleu", 0.3)], "2022-01-02"),
                system("3", "gamma", "cy", ("d1", None), &[("bleu", 0.8)], "2022-01-03"),
            ],
            datasets: vec![dataset_meta("d1", &["eng", "fra"])],
            ..MemoryStore::default()
        }
    }

    #[test]
    fn plots_replay_history_per_date_and_persist_payload() {
        let store = store();
        let cache = MemoryCache::default();
        let series = plots(&store, &cache, &Registry::builtin(), "mt", PLOT_CACHE_TTL)
            .expect("plots should generate");

        assert_eq!(
            series["Best"],
            vec![("2022-01-01".to_string(), 0.5), ("2022-01-03".to_string(), 0.8)]
        );
        assert_eq!(series["Every"].len(), 3);
        assert_eq!(series[ORIGINAL_VIEW].len(), 3);
        assert!(!series.contains_key("times"));

        let entries = cache.entries.borrow();
        let payload: serde_json::Value =
            serde_json::from_slice(&entries[&plot_cache_key("mt")]).expect("payload is json");
        assert_eq!(payload["times"], json!([]));
        assert_eq!(payload["Best"][0], json!(["2022-01-01", 0.5]));
    }

    #[test]
    fn fresh_cache_skips_recomputation() {
        let store = store();
        let cache = MemoryCache::default();
        plots(&store, &cache, &Registry::builtin(), "mt", PLOT_CACHE_TTL).expect("first run");
        assert_eq!(store.system_queries.get(), 1);

        cache.fresh.set(true);
        let cached = plots(&store, &cache, &Registry::builtin(), "mt", PLOT_CACHE_TTL)
            .expect("second run");
        assert_eq!(store.system_queries.get(), 1);
        assert_eq!(cache.writes.get(), 1);
        assert_eq!(cached["Best"].len(), 2);
    }

    #[test]
    fn abstract_benchmarks_have_no_plots() {
        let store = store();
        let cache = MemoryCache::default();
        let series = plots(&store, &cache, &Registry::builtin(), "template", PLOT_CACHE_TTL)
            .expect("abstract benchmark resolves");
        assert!(series.is_empty());
        assert_eq!(cache.writes.get(), 0);
    }

    #[test]
    fn decode_strips_times_key() {
        let series = decode_payload(br#"{"View": [["2022-01-01", 0.1]], "times": []}"#)
            .expect("payload should decode");
        assert_eq!(series.len(), 1);
    }
}
