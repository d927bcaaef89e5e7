use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

pub fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value).context("failed to serialize json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{utc_compact_string, write_json_pretty};

    #[test]
    fn compact_timestamp_has_no_separators() {
        let ts = Utc
            .with_ymd_and_hms(2022, 3, 1, 9, 5, 7)
            .single()
            .expect("valid timestamp");
        assert_eq!(utc_compact_string(ts), "20220301T090507Z");
    }

    #[test]
    fn write_json_pretty_creates_parent_directories() {
        let root = std::env::temp_dir().join(format!("benchboard-util-{}", std::process::id()));
        let path = root.join("nested").join("value.json");

        write_json_pretty(&path, &serde_json::json!({"ok": true})).expect("json should be written");
        let raw = std::fs::read_to_string(&path).expect("json should be readable");
        assert!(raw.ends_with("}\n"));

        std::fs::remove_dir_all(&root).expect("temp dir should be removable");
    }
}
