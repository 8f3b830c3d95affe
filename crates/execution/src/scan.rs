//! [`TableScanner`] implementations: in-memory tables and JSON-lines files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use serde_json::Value;
use steward_core::Record;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ScanError;
use crate::ports::{ColumnInfo, RowStream, TableScanner};

/// Column metadata inferred from rows: first non-null value decides the
/// type, and a column is nullable if any row has it null or missing.
pub fn infer_columns(rows: &[Record]) -> Vec<ColumnInfo> {
    let mut columns: IndexMap<String, ColumnInfo> = IndexMap::new();
    for row in rows {
        for (name, value) in row {
            let column = columns.entry(name.clone()).or_insert_with(|| ColumnInfo {
                name: name.clone(),
                data_type: "null".to_string(),
                nullable: false,
            });
            if value.is_null() {
                column.nullable = true;
            } else if column.data_type == "null" {
                column.data_type = json_type(value).to_string();
            }
        }
    }
    for column in columns.values_mut() {
        if rows.iter().any(|r| !r.contains_key(&column.name)) {
            column.nullable = true;
        }
    }
    columns.into_values().collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn table_key(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}

fn not_found(schema: &str, table: &str) -> ScanError {
    ScanError::TableNotFound {
        schema: schema.to_string(),
        table: table.to_string(),
    }
}

// ── In-memory ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTableScanner {
    tables: RwLock<IndexMap<String, Vec<Record>>>,
}

impl MemoryTableScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of `schema.table`.
    pub async fn insert_table(&self, schema: &str, table: &str, rows: Vec<Record>) {
        self.tables.write().await.insert(table_key(schema, table), rows);
    }
}

#[async_trait]
impl TableScanner for MemoryTableScanner {
    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, ScanError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(&table_key(schema, table))
            .ok_or_else(|| not_found(schema, table))?;
        Ok(infer_columns(rows))
    }

    async fn scan(&self, schema: &str, table: &str) -> Result<RowStream, ScanError> {
        let rows = self
            .tables
            .read()
            .await
            .get(&table_key(schema, table))
            .cloned()
            .ok_or_else(|| not_found(schema, table))?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}

// ── JSON lines ──────────────────────────────────────────────────────

/// Reads `<root>/<schema>/<table>.jsonl`, one JSON object per line.
///
/// Blank lines are skipped. Column order is the key order in each line.
#[derive(Debug, Clone)]
pub struct JsonLinesScanner {
    root: PathBuf,
}

impl JsonLinesScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, schema: &str, table: &str) -> Result<PathBuf, ScanError> {
        let safe = |s: &str| !s.is_empty() && s != ".." && !s.contains(['/', '\\']);
        if !safe(schema) || !safe(table) {
            return Err(not_found(schema, table));
        }
        Ok(self.root.join(schema).join(format!("{}.jsonl", table)))
    }

    async fn open(&self, schema: &str, table: &str) -> Result<File, ScanError> {
        let path = self.table_path(schema, table)?;
        debug!(path = %path.display(), "opening table file");
        File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => not_found(schema, table),
            _ => ScanError::Io(e),
        })
    }
}

fn decode_line(line: &str, line_no: usize) -> Result<Record, ScanError> {
    serde_json::from_str::<Record>(line).map_err(|e| ScanError::Decode {
        line: line_no,
        reason: e.to_string(),
    })
}

#[async_trait]
impl TableScanner for JsonLinesScanner {
    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, ScanError> {
        let rows: Vec<Record> = self.scan(schema, table).await?.try_collect().await?;
        Ok(infer_columns(&rows))
    }

    async fn scan(&self, schema: &str, table: &str) -> Result<RowStream, ScanError> {
        let lines = BufReader::new(self.open(schema, table).await?).lines();

        let rows = stream::unfold((lines, 0usize), |(mut lines, mut line_no)| async move {
            loop {
                line_no += 1;
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => return Some((decode_line(&line, line_no), (lines, line_no))),
                    Ok(None) => return None,
                    Err(e) => return Some((Err(ScanError::Io(e)), (lines, line_no))),
                }
            }
        });
        Ok(rows.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn columns_are_inferred() {
        let rows = vec![
            row(&[("id", json!(1)), ("name", Value::Null)]),
            row(&[("id", json!(2)), ("name", json!("b")), ("score", json!(0.5))]),
        ];
        let cols = infer_columns(&rows);
        let summary: Vec<(&str, &str, bool)> = cols
            .iter()
            .map(|c| (c.name.as_str(), c.data_type.as_str(), c.nullable))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("id", "integer", false),
                ("name", "string", true),
                ("score", "number", true)
            ]
        );
    }

    #[tokio::test]
    async fn memory_scanner_streams_rows_in_order() {
        let scanner = MemoryTableScanner::new();
        scanner
            .insert_table("public", "users", vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])])
            .await;
        let rows: Vec<Record> = scanner.scan("public", "users").await.unwrap().try_collect().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["id"], json!(2));
        assert!(matches!(
            scanner.scan("public", "nope").await,
            Err(ScanError::TableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn jsonl_scanner_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        std::fs::write(
            dir.path().join("public/users.jsonl"),
            "{\"zeta\": 1, \"alpha\": \"a\"}\n\n{\"zeta\": 2, \"alpha\": null}\n",
        )
        .unwrap();

        let scanner = JsonLinesScanner::new(dir.path());
        let rows: Vec<Record> = scanner.scan("public", "users").await.unwrap().try_collect().await.unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let cols = scanner.columns("public", "users").await.unwrap();
        assert!(cols[1].nullable);

        assert!(matches!(
            scanner.scan("public", "missing").await,
            Err(ScanError::TableNotFound { .. })
        ));
        assert!(matches!(
            scanner.scan("..", "users").await,
            Err(ScanError::TableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn jsonl_decode_error_names_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("s")).unwrap();
        std::fs::write(dir.path().join("s/t.jsonl"), "{\"a\": 1}\n[1, 2]\n").unwrap();

        let scanner = JsonLinesScanner::new(dir.path());
        let result: Result<Vec<Record>, ScanError> = scanner.scan("s", "t").await.unwrap().try_collect().await;
        match result {
            Err(ScanError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
