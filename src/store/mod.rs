use std::time::Duration;

use anyhow::Result;

use crate::model::{DatasetConfig, DatasetKey, DatasetMetadata, SystemModel, SystemQuery};

mod file_cache;
#[cfg(test)]
pub(crate) mod memory;
mod sqlite;

pub use file_cache::FilePlotCache;
pub use sqlite::SqliteStore;

pub trait SystemSource {
    fn find_systems(&self, filter: &SystemFilter) -> Result<Vec<SystemModel>>;
}

pub trait DatasetSource {
    fn find_dataset(
        &self,
        dataset_name: &str,
        sub_dataset: Option<&str>,
        strict_name_match: bool,
    ) -> Result<Option<DatasetMetadata>>;
}

pub trait BenchmarkSource {
    fn find_benchmark_document(&self, benchmark_id: &str) -> Result<Option<serde_json::Value>>;

    fn find_benchmark_documents(&self, parent: Option<&str>) -> Result<Vec<serde_json::Value>>;
}

pub trait MetadataStore: BenchmarkSource + SystemSource + DatasetSource {}

impl<T> MetadataStore for T where T: BenchmarkSource + SystemSource + DatasetSource {}

pub trait PlotCache {
    fn read_if_fresh(&self, key: &str, ttl: Duration) -> Result<Option<Vec<u8>>>;

    fn write(&self, key: &str, payload: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemFilter {
    pub dataset_name: Option<String>,
    pub sub_dataset: Option<String>,
    pub split: Option<String>,
    pub task: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub creator: Option<String>,
    pub dataset_list: Vec<DatasetKey>,
}

impl SystemFilter {
    pub fn from_query(query: &SystemQuery) -> Self {
        Self {
            dataset_name: query.dataset_name.clone(),
            sub_dataset: query.sub_dataset.clone(),
            task: query.task.clone(),
            source_language: query.source_language.clone(),
            target_language: query.target_language.clone(),
            ..Self::default()
        }
    }

    pub fn from_datasets(datasets: &[DatasetConfig]) -> Self {
        Self {
            dataset_list: datasets.iter().map(DatasetConfig::key).collect(),
            ..Self::default()
        }
    }
}
