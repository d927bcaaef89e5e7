use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::WeightMapSpec;

pub type WeightMap = BTreeMap<String, f64>;

// Approximate L1+L2 speaker counts in millions.
const SPEAKER_COUNTS: &[(&str, f64)] = &[
    ("eng", 1452.0),
    ("zho", 1118.0),
    ("hin", 602.0),
    ("spa", 548.0),
    ("fra", 274.0),
    ("ara", 274.0),
    ("ben", 272.0),
    ("rus", 258.0),
    ("por", 257.0),
    ("ind", 199.0),
    ("deu", 135.0),
    ("jpn", 126.0),
    ("tur", 88.0),
    ("kor", 82.0),
    ("swh", 71.0),
    ("yor", 46.0),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    #[serde(default)]
    weight_maps: BTreeMap<String, WeightMap>,
    #[serde(default)]
    default_sets: BTreeMap<String, Vec<String>>,
}

impl Registry {
    pub fn builtin() -> Self {
        let total: f64 = SPEAKER_COUNTS.iter().map(|(_, count)| count).sum();
        let pop_weight = SPEAKER_COUNTS
            .iter()
            .map(|(lang, count)| (lang.to_string(), count / total))
            .collect::<WeightMap>();
        let uniform = 1.0 / SPEAKER_COUNTS.len() as f64;
        let ling_weight = SPEAKER_COUNTS
            .iter()
            .map(|(lang, _)| (lang.to_string(), uniform))
            .collect::<WeightMap>();
        let all_lang = SPEAKER_COUNTS
            .iter()
            .map(|(lang, _)| lang.to_string())
            .collect::<Vec<_>>();

        Self::new()
            .with_weight_map("pop_weight", pop_weight)
            .with_weight_map("ling_weight", ling_weight)
            .with_default_set("all_lang", all_lang)
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read registry {}", path.display()))?;
        let registry: Registry = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse registry {}", path.display()))?;
        Ok(registry)
    }

    pub fn with_weight_map(mut self, name: &str, weights: WeightMap) -> Self {
        self.weight_maps.insert(name.to_string(), weights);
        self
    }

    pub fn with_default_set(mut self, name: &str, values: Vec<String>) -> Self {
        self.default_sets.insert(name.to_string(), values);
        self
    }

    pub fn weight_map<'a>(&'a self, spec: &'a WeightMapSpec) -> Result<&'a WeightMap, ConfigError> {
        match spec {
            WeightMapSpec::Inline(weights) => Ok(weights),
            WeightMapSpec::Named(name) => self
                .weight_maps
                .get(name)
                .ok_or_else(|| ConfigError::UnknownWeightMap(name.clone())),
        }
    }

    pub fn default_set(&self, name: &str) -> Result<&[String], ConfigError> {
        self.default_sets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownDefaultSet(name.to_string()))
    }

    pub fn is_weight_map_name(&self, key: &str) -> bool {
        self.weight_maps.contains_key(key)
    }

    pub fn weight_map_count(&self) -> usize {
        self.weight_maps.len()
    }

    pub fn default_set_count(&self) -> usize {
        self.default_sets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::error::ConfigError;
    use crate::model::WeightMapSpec;

    #[test]
    fn builtin_pop_weight_is_normalized() {
        let registry = Registry::builtin();
        let spec = WeightMapSpec::Named("pop_weight".to_string());
        let weights = registry.weight_map(&spec).expect("pop_weight should exist");
        let total: f64 = weights.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(weights["eng"] > weights["yor"]);
    }

    #[test]
    fn unknown_names_are_configuration_errors() {
        let registry = Registry::builtin();
        let spec = WeightMapSpec::Named("gdp_weight".to_string());
        assert_eq!(
            registry.weight_map(&spec),
            Err(ConfigError::UnknownWeightMap("gdp_weight".to_string()))
        );
        assert_eq!(
            registry.default_set("all_scripts"),
            Err(ConfigError::UnknownDefaultSet("all_scripts".to_string()))
        );
    }

    #[test]
    fn registry_deserializes_from_json() {
        let raw = r#"{"weight_maps": {"tier": {"a": 0.75, "b": 0.25}}, "default_sets": {"tiers": ["a", "b", "c"]}}"#;
        let registry: Registry = serde_json::from_str(raw).expect("registry should parse");
        assert!(registry.is_weight_map_name("tier"));
        assert_eq!(registry.default_set("tiers").expect("tiers").len(), 3);
    }
}
