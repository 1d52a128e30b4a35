use crate::processor::table::StarRow;
use crate::schema::StarTableKind;
use crate::storage::ObjectStorage;
use crate::utils::paths::{PART_FILE_NAME, PathBuilder};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use common::{Error, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const WRITE_CONCURRENCY: usize = 16;

/// Contents of the `_SUCCESS` marker of a committed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMarker {
    pub table: String,
    pub row_count: usize,
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrittenTable {
    pub kind: StarTableKind,
    pub row_count: usize,
    /// Keys of the data files, relative to the output root.
    pub files: Vec<String>,
}

/// Writes the star tables as Hive-partitioned parquet under one output root.
pub struct TableWriter {
    storage: Arc<dyn ObjectStorage>,
}

impl TableWriter {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Removes the commit markers of every table, so a partially written
    /// output is never mistaken for a complete one.
    pub async fn clear_markers(&self) -> Result<()> {
        for kind in StarTableKind::ALL {
            let marker = PathBuilder::new(kind.dir_name()).build_marker_path();
            self.storage
                .delete_object(&marker)
                .await
                .map_err(|e| Error::Write(format!("Failed to remove {}: {}", marker, e)))?;
        }
        Ok(())
    }

    /// Replaces the table's directory with one file per partition. An
    /// unpartitioned table always gets a file, even with no rows.
    pub async fn write_table<R: StarRow>(&self, rows: &[R]) -> Result<WrittenTable> {
        let kind = R::KIND;
        let columns = kind.partition_columns();

        let removed = self
            .storage
            .delete_prefix(kind.dir_name())
            .await
            .map_err(|e| Error::Write(format!("Failed to clear {}: {}", kind.dir_name(), e)))?;
        if removed > 0 {
            debug!(table = %kind, removed, "Cleared previous output");
        }

        let mut partitions: BTreeMap<Vec<String>, Vec<&R>> = BTreeMap::new();
        for row in rows {
            partitions.entry(row.partition_values()).or_default().push(row);
        }
        if columns.is_empty() && partitions.is_empty() {
            partitions.insert(Vec::new(), Vec::new());
        }

        // At most WRITE_CONCURRENCY partitions are encoded and in flight at once.
        let uploads = partitions.iter().map(|(values, partition_rows)| {
            let path = columns
                .iter()
                .zip(values)
                .fold(PathBuilder::new(kind.dir_name()), |builder, ((column, _), value)| {
                    builder.with_partition(column, value)
                })
                .build_file_path(PART_FILE_NAME);
            let storage = self.storage.clone();

            async move {
                let batch = R::to_record_batch(partition_rows)?;
                let data = encode_parquet(kind, &batch)?;
                storage
                    .put_object(&path, data)
                    .await
                    .map_err(|e| Error::Write(format!("Failed to write {}: {}", path, e)))?;
                Ok::<String, Error>(path)
            }
        });

        let mut files: Vec<String> = stream::iter(uploads)
            .buffer_unordered(WRITE_CONCURRENCY)
            .try_collect()
            .await?;
        files.sort();

        info!(
            table = %kind,
            rows = rows.len(),
            files = files.len(),
            "Table written"
        );

        Ok(WrittenTable {
            kind,
            row_count: rows.len(),
            files,
        })
    }

    pub async fn write_marker(&self, table: &WrittenTable) -> Result<()> {
        let marker = CommitMarker {
            table: table.kind.table_name().to_string(),
            row_count: table.row_count,
            file_count: table.files.len(),
            created_at: Utc::now(),
        };
        let marker_json = serde_json::to_vec_pretty(&marker)?;
        let key = PathBuilder::new(table.kind.dir_name()).build_marker_path();

        self.storage
            .put_object(&key, marker_json)
            .await
            .map_err(|e| Error::Write(format!("Failed to write marker {}: {}", key, e)))?;
        debug!(table = %table.kind, key = %key, "Marker written");
        Ok(())
    }
}

fn writer_properties(kind: StarTableKind) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![KeyValue {
            key: "table".to_string(),
            value: Some(kind.table_name().to_string()),
        }]))
        .build()
}

/// Encodes one batch as a complete parquet file in memory.
pub fn encode_parquet(kind: StarTableKind, batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();

    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(writer_properties(kind)))
        .map_err(|e| Error::Write(format!("Failed to start {} file: {}", kind, e)))?;
    writer
        .write(batch)
        .map_err(|e| Error::Write(format!("Failed to encode {} rows: {}", kind, e)))?;
    writer
        .close()
        .map_err(|e| Error::Write(format!("Failed to finish {} file: {}", kind, e)))?;

    Ok(buffer)
}
