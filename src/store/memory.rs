use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;

use super::{BenchmarkSource, DatasetSource, PlotCache, SystemFilter, SystemSource};
use crate::model::{DatasetMetadata, SystemModel};

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    pub benchmarks: Vec<serde_json::Value>,
    pub systems: Vec<SystemModel>,
    pub datasets: Vec<DatasetMetadata>,
    pub system_queries: Cell<usize>,
}

fn matches(expected: &Option<String>, actual: Option<&str>) -> bool {
    expected.as_deref().is_none_or(|value| Some(value) == actual)
}

impl SystemSource for MemoryStore {
    fn find_systems(&self, filter: &SystemFilter) -> Result<Vec<SystemModel>> {
        self.system_queries.set(self.system_queries.get() + 1);
        Ok(self
            .systems
            .iter()
            .filter(|system| {
                let dataset = system.dataset.as_ref();
                matches(&filter.dataset_name, dataset.map(|d| d.dataset_name.as_str()))
                    && matches(&filter.sub_dataset, dataset.and_then(|d| d.sub_dataset.as_deref()))
                    && matches(&filter.split, dataset.map(|d| d.split.as_str()))
                    && matches(&filter.task, system.task.as_deref())
                    && matches(&filter.source_language, system.source_language.as_deref())
                    && matches(&filter.target_language, system.target_language.as_deref())
                    && matches(&filter.creator, Some(system.creator.as_str()))
                    && (filter.dataset_list.is_empty()
                        || dataset.is_some_and(|d| filter.dataset_list.contains(&d.key())))
            })
            .cloned()
            .collect())
    }
}

impl DatasetSource for MemoryStore {
    fn find_dataset(
        &self,
        dataset_name: &str,
        sub_dataset: Option<&str>,
        strict_name_match: bool,
    ) -> Result<Option<DatasetMetadata>> {
        let found = self
            .datasets
            .iter()
            .filter(|dataset| {
                let name_matches = if strict_name_match {
                    dataset.dataset_name == dataset_name
                } else {
                    dataset.dataset_name.starts_with(dataset_name)
                };
                name_matches
                    && sub_dataset.is_none_or(|sub| dataset.sub_dataset.as_deref() == Some(sub))
            })
            .collect::<Vec<_>>();
        Ok(match found.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        })
    }
}

impl BenchmarkSource for MemoryStore {
    fn find_benchmark_document(&self, benchmark_id: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .benchmarks
            .iter()
            .find(|doc| doc["id"].as_str() == Some(benchmark_id))
            .cloned())
    }

    fn find_benchmark_documents(&self, parent: Option<&str>) -> Result<Vec<serde_json::Value>> {
        Ok(self
            .benchmarks
            .iter()
            .filter(|doc| parent.is_none() || doc["parent"].as_str() == parent)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryCache {
    pub entries: RefCell<BTreeMap<String, Vec<u8>>>,
    pub fresh: Cell<bool>,
    pub writes: Cell<usize>,
}

impl PlotCache for MemoryCache {
    fn read_if_fresh(&self, key: &str, _ttl: Duration) -> Result<Option<Vec<u8>>> {
        if !self.fresh.get() {
            return Ok(None);
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.writes.set(self.writes.get() + 1);
        self.entries
            .borrow_mut()
            .insert(key.to_string(), payload.to_vec());
        Ok(())
    }
}
