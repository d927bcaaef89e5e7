use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_SPLIT: &str = "test";
pub const ORIGINAL_VIEW: &str = "Original";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkMetric {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetKey {
    pub dataset_name: String,
    pub sub_dataset: Option<String>,
    pub split: String,
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -- {} -- {}",
            self.dataset_name,
            self.sub_dataset.as_deref().unwrap_or("None"),
            self.split
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetConfig {
    pub dataset_name: String,
    #[serde(default)]
    pub sub_dataset: Option<String>,
    #[serde(default, alias = "dataset_split")]
    pub split: Option<String>,
    #[serde(default)]
    pub metrics: Option<Vec<BenchmarkMetric>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DatasetConfig {
    pub fn from_key(key: &DatasetKey) -> Self {
        Self {
            dataset_name: key.dataset_name.clone(),
            sub_dataset: key.sub_dataset.clone(),
            split: Some(key.split.clone()),
            metrics: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> DatasetKey {
        DatasetKey {
            dataset_name: self.dataset_name.clone(),
            sub_dataset: self.sub_dataset.clone(),
            split: self.split.clone().unwrap_or_else(|| DEFAULT_SPLIT.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemQuery {
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub sub_dataset: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendMode {
    #[default]
    Increase,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OpKind {
    Mean,
    Sum,
    Max,
    Min,
    Gini,
    Multiply,
    WeightedSum,
    AddDefault,
    Subtract,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Max => "max",
            Self::Min => "min",
            Self::Gini => "gini",
            Self::Multiply => "multiply",
            Self::WeightedSum => "weighted_sum",
            Self::AddDefault => "add_default",
            Self::Subtract => "subtract",
        }
    }
}

impl TryFrom<String> for OpKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let kind = match value.as_str() {
            "mean" => Self::Mean,
            "sum" => Self::Sum,
            "max" => Self::Max,
            "min" => Self::Min,
            "gini" => Self::Gini,
            "multiply" => Self::Multiply,
            "weighted_sum" => Self::WeightedSum,
            "add_default" => Self::AddDefault,
            "subtract" => Self::Subtract,
            _ => return Err(ConfigError::UnknownOperation(value)),
        };
        Ok(kind)
    }
}

impl From<OpKind> for String {
    fn from(kind: OpKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightMapSpec {
    Named(String),
    Inline(BTreeMap<String, f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op: OpKind,
    #[serde(default, deserialize_with = "one_or_many")]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub skip_group_system: bool,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub weight_map: Option<WeightMapSpec>,
    #[serde(default)]
    pub weight_logit_multiplier: Option<f64>,
    #[serde(default)]
    pub default_set: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub num: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    #[serde(default)]
    pub trend: Option<TrendMode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub operations: Vec<Operation>,
}

impl View {
    pub fn trend_mode(&self) -> TrendMode {
        self.trend.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub benchmark_type: Option<String>,
    #[serde(default)]
    pub system_query: Option<SystemQuery>,
    #[serde(default)]
    pub datasets: Option<Vec<DatasetConfig>>,
    #[serde(default)]
    pub metrics: Option<Vec<BenchmarkMetric>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub views: Vec<View>,
}

impl BenchmarkConfig {
    pub fn is_abstract(&self) -> bool {
        self.benchmark_type.as_deref() == Some("abstract")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemDataset {
    pub dataset_name: String,
    #[serde(default)]
    pub sub_dataset: Option<String>,
    #[serde(default = "default_split")]
    pub split: String,
}

impl SystemDataset {
    pub fn key(&self) -> DatasetKey {
        DatasetKey {
            dataset_name: self.dataset_name.clone(),
            sub_dataset: self.sub_dataset.clone(),
            split: self.split.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemModel {
    pub system_id: String,
    pub system_name: String,
    pub creator: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub dataset: Option<SystemDataset>,
    #[serde(default)]
    pub results: BTreeMap<String, BTreeMap<String, f64>>,
    pub created_at: DateTime<Utc>,
}

impl SystemModel {
    pub fn best_score(&self, metric_name: &str) -> Option<f64> {
        self.results
            .values()
            .filter_map(|level| level.get(metric_name).copied())
            .reduce(f64::max)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatasetMetadata {
    pub dataset_name: String,
    #[serde(default)]
    pub sub_dataset: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub splits: Vec<String>,
}

pub type PlotPoint = (String, f64);
pub type PlotSeries = BTreeMap<String, Vec<PlotPoint>>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableData {
    pub name: String,
    pub system_names: Vec<String>,
    pub column_names: Vec<String>,
    pub scores: Vec<Vec<f64>>,
    pub plot_x_values: Vec<String>,
    pub plot_y_values: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportBundle {
    #[serde(default)]
    pub benchmarks: Vec<serde_json::Value>,
    #[serde(default)]
    pub systems: Vec<SystemModel>,
    #[serde(default)]
    pub datasets: Vec<DatasetMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportCounts {
    pub benchmarks_upserted: usize,
    pub systems_upserted: usize,
    pub datasets_upserted: usize,
    pub benchmarks_total: i64,
    pub systems_total: i64,
    pub datasets_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub input_path: String,
    pub db_path: String,
    pub counts: ImportCounts,
    pub warnings: Vec<String>,
}

fn default_split() -> String {
    DEFAULT_SPLIT.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let columns = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(column)) => vec![column],
        Some(OneOrMany::Many(columns)) => columns,
    };
    Ok(columns)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
