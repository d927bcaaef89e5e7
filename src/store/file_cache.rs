use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::debug;

use super::PlotCache;
use crate::util::ensure_directory;

pub struct FilePlotCache {
    cache_dir: PathBuf,
}

impl FilePlotCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                    ch
                } else {
                    '_'
                }
            })
            .collect::<String>();
        self.cache_dir.join(file_name)
    }

    pub fn entry_count(&self) -> Result<usize> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }
        let entries = fs::read_dir(&self.cache_dir)
            .with_context(|| format!("failed to read {}", self.cache_dir.display()))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", self.cache_dir.display()))?;
            if entry.path().extension().and_then(|ext| ext.to_str()) == Some("json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl PlotCache for FilePlotCache {
    fn read_if_fresh(&self, key: &str, ttl: Duration) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let modified = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .with_context(|| format!("failed to stat cache file {}", path.display()))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > ttl {
            debug!(path = %path.display(), age_ms = age.as_millis() as u64, "plot cache entry stale");
            return Ok(None);
        }

        let payload =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(payload))
    }

    fn write(&self, key: &str, payload: &[u8]) -> Result<()> {
        ensure_directory(&self.cache_dir)?;
        let path = self.path_for(key);
        fs::write(&path, payload)
            .with_context(|| format!("failed to write cache file {}", path.display()))
    }
}
