use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::{BenchmarkSource, DatasetSource, SystemFilter, SystemSource};
use crate::model::{DEFAULT_SPLIT, DatasetMetadata, ImportBundle, SystemDataset, SystemModel};

const SYSTEM_COLUMNS: &str = "
    system_id, system_name, creator, task, source_language, target_language,
    dataset_name, sub_dataset, dataset_split, results_json, created_at
";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub benchmarks: usize,
    pub systems: usize,
    pub datasets: usize,
}

pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("failed to open in-memory db")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn import_bundle(&mut self, bundle: &ImportBundle) -> Result<ImportStats> {
        let tx = self
            .connection
            .transaction()
            .context("failed to start import transaction")?;

        let mut stats = ImportStats::default();
        for document in &bundle.benchmarks {
            upsert_benchmark(&tx, document)?;
            stats.benchmarks += 1;
        }
        for system in &bundle.systems {
            upsert_system(&tx, system)?;
            stats.systems += 1;
        }
        for dataset in &bundle.datasets {
            upsert_dataset(&tx, dataset)?;
            stats.datasets += 1;
        }

        tx.commit().context("failed to commit import transaction")?;
        Ok(stats)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = match table {
            "benchmarks" => "SELECT COUNT(*) FROM benchmarks",
            "systems" => "SELECT COUNT(*) FROM systems",
            "datasets" => "SELECT COUNT(*) FROM datasets",
            other => bail!("unknown table: {other}"),
        };
        let count = self.connection.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS benchmarks (
              benchmark_id TEXT PRIMARY KEY,
              parent_id TEXT,
              doc_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS systems (
              system_id TEXT PRIMARY KEY,
              system_name TEXT NOT NULL,
              creator TEXT NOT NULL,
              task TEXT,
              source_language TEXT,
              target_language TEXT,
              dataset_name TEXT,
              sub_dataset TEXT,
              dataset_split TEXT,
              results_json TEXT NOT NULL,
              created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS datasets (
              dataset_id TEXT PRIMARY KEY,
              dataset_name TEXT NOT NULL,
              sub_dataset TEXT,
              languages_json TEXT NOT NULL,
              tasks_json TEXT NOT NULL,
              splits_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_benchmarks_parent ON benchmarks(parent_id);
            CREATE INDEX IF NOT EXISTS idx_systems_dataset
              ON systems(dataset_name, sub_dataset, dataset_split);
            CREATE INDEX IF NOT EXISTS idx_datasets_name ON datasets(dataset_name);
            ",
        )
        .context("failed to create metadata schema")?;
    Ok(())
}

// Stored documents use `id`; `_id` is accepted on import.
fn upsert_benchmark(connection: &Connection, document: &serde_json::Value) -> Result<()> {
    let Some(object) = document.as_object() else {
        bail!("benchmark document must be a json object");
    };
    let mut object = object.clone();
    if let Some(raw_id) = object.remove("_id") {
        object.entry("id").or_insert(raw_id);
    }

    let benchmark_id = object
        .get("id")
        .and_then(|value| value.as_str())
        .map(ToOwned::to_owned)
        .context("benchmark document is missing a string `id`")?;
    let parent_id = object
        .get("parent")
        .and_then(|value| value.as_str())
        .map(ToOwned::to_owned);
    let doc_json = serde_json::Value::Object(object).to_string();

    connection
        .execute(
            "
            INSERT INTO benchmarks(benchmark_id, parent_id, doc_json)
            VALUES(?1, ?2, ?3)
            ON CONFLICT(benchmark_id) DO UPDATE SET
              parent_id=excluded.parent_id,
              doc_json=excluded.doc_json
            ",
            params![benchmark_id, parent_id, doc_json],
        )
        .with_context(|| format!("failed to upsert benchmark {benchmark_id}"))?;
    Ok(())
}

fn upsert_system(connection: &Connection, system: &SystemModel) -> Result<()> {
    let results_json = serde_json::to_string(&system.results)
        .with_context(|| format!("failed to serialize results of {}", system.system_id))?;
    let dataset = system.dataset.as_ref();

    connection
        .execute(
            "
            INSERT INTO systems(
              system_id, system_name, creator, task, source_language, target_language,
              dataset_name, sub_dataset, dataset_split, results_json, created_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(system_id) DO UPDATE SET
              system_name=excluded.system_name,
              creator=excluded.creator,
              task=excluded.task,
              source_language=excluded.source_language,
              target_language=excluded.target_language,
              dataset_name=excluded.dataset_name,
              sub_dataset=excluded.sub_dataset,
              dataset_split=excluded.dataset_split,
              results_json=excluded.results_json,
              created_at=excluded.created_at
            ",
            params![
                system.system_id,
                system.system_name,
                system.creator,
                system.task,
                system.source_language,
                system.target_language,
                dataset.map(|value| value.dataset_name.as_str()),
                dataset.and_then(|value| value.sub_dataset.as_deref()),
                dataset.map(|value| value.split.as_str()),
                results_json,
                system.created_at,
            ],
        )
        .with_context(|| format!("failed to upsert system {}", system.system_id))?;
    Ok(())
}

fn upsert_dataset(connection: &Connection, dataset: &DatasetMetadata) -> Result<()> {
    let dataset_id = format!(
        "{}:{}",
        dataset.dataset_name,
        dataset.sub_dataset.as_deref().unwrap_or("NA")
    );

    connection
        .execute(
            "
            INSERT INTO datasets(dataset_id, dataset_name, sub_dataset, languages_json, tasks_json, splits_json)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(dataset_id) DO UPDATE SET
              languages_json=excluded.languages_json,
              tasks_json=excluded.tasks_json,
              splits_json=excluded.splits_json
            ",
            params![
                dataset_id,
                dataset.dataset_name,
                dataset.sub_dataset,
                serde_json::to_string(&dataset.languages)?,
                serde_json::to_string(&dataset.tasks)?,
                serde_json::to_string(&dataset.splits)?,
            ],
        )
        .with_context(|| format!("failed to upsert dataset {dataset_id}"))?;
    Ok(())
}

fn system_from_row(row: &Row<'_>) -> Result<SystemModel> {
    let system_id: String = row.get(0)?;
    let dataset_name: Option<String> = row.get(6)?;
    let sub_dataset: Option<String> = row.get(7)?;
    let split: Option<String> = row.get(8)?;
    let results_json: String = row.get(9)?;

    let dataset = dataset_name.map(|dataset_name| SystemDataset {
        dataset_name,
        sub_dataset,
        split: split.unwrap_or_else(|| DEFAULT_SPLIT.to_string()),
    });
    let results = serde_json::from_str(&results_json)
        .with_context(|| format!("invalid results for system {system_id}"))?;

    Ok(SystemModel {
        system_id,
        system_name: row.get(1)?,
        creator: row.get(2)?,
        task: row.get(3)?,
        source_language: row.get(4)?,
        target_language: row.get(5)?,
        dataset,
        results,
        created_at: row.get::<_, DateTime<Utc>>(10)?,
    })
}

fn push_condition(
    clauses: &mut Vec<String>,
    values: &mut Vec<Option<String>>,
    column: &str,
    value: &Option<String>,
) {
    if let Some(value) = value {
        clauses.push(format!("{column} = ?"));
        values.push(Some(value.clone()));
    }
}

impl SystemSource for SqliteStore {
    fn find_systems(&self, filter: &SystemFilter) -> Result<Vec<SystemModel>> {
        let mut clauses = Vec::<String>::new();
        let mut values = Vec::<Option<String>>::new();

        push_condition(&mut clauses, &mut values, "dataset_name", &filter.dataset_name);
        push_condition(&mut clauses, &mut values, "sub_dataset", &filter.sub_dataset);
        push_condition(&mut clauses, &mut values, "dataset_split", &filter.split);
        push_condition(&mut clauses, &mut values, "task", &filter.task);
        push_condition(&mut clauses, &mut values, "source_language", &filter.source_language);
        push_condition(&mut clauses, &mut values, "target_language", &filter.target_language);
        push_condition(&mut clauses, &mut values, "creator", &filter.creator);

        if !filter.dataset_list.is_empty() {
            let alternatives = filter
                .dataset_list
                .iter()
                .map(|key| {
                    values.push(Some(key.dataset_name.clone()));
                    values.push(key.sub_dataset.clone());
                    values.push(Some(key.split.clone()));
                    "(dataset_name = ? AND sub_dataset IS ? AND dataset_split = ?)"
                })
                .collect::<Vec<_>>();
            clauses.push(format!("({})", alternatives.join(" OR ")));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT {SYSTEM_COLUMNS} FROM systems {where_sql} ORDER BY rowid ASC");

        let mut statement = self.connection.prepare(&sql)?;
        let mut rows = statement.query(params_from_iter(values.iter()))?;
        let mut out = Vec::<SystemModel>::new();

        while let Some(row) = rows.next()? {
            out.push(system_from_row(row)?);
        }

        Ok(out)
    }
}

impl DatasetSource for SqliteStore {
    fn find_dataset(
        &self,
        dataset_name: &str,
        sub_dataset: Option<&str>,
        strict_name_match: bool,
    ) -> Result<Option<DatasetMetadata>> {
        let name_clause = if strict_name_match {
            "dataset_name = ?1"
        } else {
            "substr(dataset_name, 1, length(?1)) = ?1"
        };
        let sub_clause = if sub_dataset.is_some() {
            "AND sub_dataset = ?2"
        } else {
            "AND ?2 IS NULL"
        };
        let sql = format!(
            "
            SELECT dataset_name, sub_dataset, languages_json, tasks_json, splits_json
            FROM datasets
            WHERE {name_clause} {sub_clause}
            ORDER BY dataset_id ASC
            LIMIT 2
            "
        );

        let mut statement = self.connection.prepare(&sql)?;
        let mut rows = statement.query(params![dataset_name, sub_dataset])?;
        let mut matches = Vec::<DatasetMetadata>::new();

        while let Some(row) = rows.next()? {
            let languages: String = row.get(2)?;
            let tasks: String = row.get(3)?;
            let splits: String = row.get(4)?;
            matches.push(DatasetMetadata {
                dataset_name: row.get(0)?,
                sub_dataset: row.get(1)?,
                languages: serde_json::from_str(&languages)
                    .context("invalid dataset languages")?,
                tasks: serde_json::from_str(&tasks).context("invalid dataset tasks")?,
                splits: serde_json::from_str(&splits).context("invalid dataset splits")?,
            });
        }

        if matches.len() == 1 {
            Ok(matches.pop())
        } else {
            Ok(None)
        }
    }
}

impl BenchmarkSource for SqliteStore {
    fn find_benchmark_document(&self, benchmark_id: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .connection
            .query_row(
                "SELECT doc_json FROM benchmarks WHERE benchmark_id = ?1",
                params![benchmark_id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|doc| {
            serde_json::from_str(&doc)
                .with_context(|| format!("invalid stored benchmark {benchmark_id}"))
        })
        .transpose()
    }

    fn find_benchmark_documents(&self, parent: Option<&str>) -> Result<Vec<serde_json::Value>> {
        let mut statement = self.connection.prepare(
            "
            SELECT benchmark_id, doc_json
            FROM benchmarks
            WHERE ?1 IS NULL OR parent_id = ?1
            ORDER BY benchmark_id ASC
            ",
        )?;
        let mut rows = statement.query(params![parent])?;
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            let benchmark_id: String = row.get(0)?;
            let doc: String = row.get(1)?;
            out.push(
                serde_json::from_str(&doc)
                    .with_context(|| format!("invalid stored benchmark {benchmark_id}"))?,
            );
        }

        Ok(out)
    }
}
