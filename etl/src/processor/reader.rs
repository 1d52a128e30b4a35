use crate::models::SourceRecord;
use crate::storage::ObjectStorage;
use common::{Error, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

const READ_CONCURRENCY: usize = 8;

/// Records of one source, in ingestion order (object path, then position in file).
#[derive(Debug, Clone)]
pub struct SourceBatch<T> {
    pub records: Vec<T>,
    pub files: usize,
    /// Lines or array elements that were not JSON objects; dropped.
    pub malformed: usize,
}

pub struct RecordReader {
    storage: Arc<dyn ObjectStorage>,
}

impl RecordReader {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Reads every `.json` object under `prefix`.
    ///
    /// Fails with `SourceRead` when nothing matches the prefix, when an object
    /// cannot be fetched, or when not a single record parses.
    pub async fn read_records<T: SourceRecord>(&self, prefix: &str) -> Result<SourceBatch<T>> {
        let keys: Vec<String> = self
            .storage
            .list_objects(prefix)
            .await
            .map_err(|e| {
                Error::SourceRead(format!("Cannot list {} under '{}': {}", T::SOURCE, prefix, e))
            })?
            .into_iter()
            .filter(|key| key.ends_with(".json"))
            .collect();

        if keys.is_empty() {
            return Err(Error::SourceRead(format!(
                "No {} files found under '{}' in {}",
                T::SOURCE,
                prefix,
                self.storage.location()
            )));
        }

        // Fetches run ahead of parsing but results stay in path order.
        let parsed: Vec<(&String, (Vec<Map<String, Value>>, usize))> = stream::iter(&keys)
            .map(|key| async move {
                let content = self.storage.get_object(key).await.map_err(|e| {
                    Error::SourceRead(format!("Cannot read {} file {}: {}", T::SOURCE, key, e))
                })?;
                Ok::<_, Error>((key, parse_json_objects(&content)))
            })
            .buffered(READ_CONCURRENCY)
            .try_collect()
            .await?;

        let mut records = Vec::new();
        let mut malformed = 0;
        let mut seq = 0u64;

        for (key, (objects, bad)) in parsed {
            debug!(file = %key, records = objects.len(), malformed = bad, "Parsed source file");
            malformed += bad;

            for object in &objects {
                records.push(T::from_json(object, seq));
                seq += 1;
            }
        }

        if records.is_empty() {
            return Err(Error::SourceRead(format!(
                "No parseable {} records under '{}' ({} files, {} malformed entries)",
                T::SOURCE,
                prefix,
                keys.len(),
                malformed
            )));
        }

        info!(
            source = T::SOURCE,
            files = keys.len(),
            records = records.len(),
            malformed,
            "Loaded source records"
        );

        Ok(SourceBatch {
            records,
            files: keys.len(),
            malformed,
        })
    }
}

/// Splits file content into JSON objects. A file is either a single JSON
/// document (object, or array of objects) or newline-delimited objects.
/// Returns the objects and the number of entries that were dropped. A file
/// in which no line parses counts as a single malformed entry.
pub fn parse_json_objects(content: &[u8]) -> (Vec<Map<String, Value>>, usize) {
    if let Ok(document) = serde_json::from_slice::<Value>(content) {
        return match document {
            Value::Object(object) => (vec![object], 0),
            Value::Array(items) => {
                let total = items.len();
                let objects: Vec<_> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(object) => Some(object),
                        _ => None,
                    })
                    .collect();
                let dropped = total - objects.len();
                (objects, dropped)
            }
            _ => (Vec::new(), 1),
        };
    }

    let mut objects = Vec::new();
    let mut malformed = 0;
    for line in content.split(|byte| *byte == b'\n') {
        if line.trim_ascii().is_empty() {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(object)) => objects.push(object),
            _ => malformed += 1,
        }
    }

    if objects.is_empty() && malformed > 0 {
        return (objects, 1);
    }
    (objects, malformed)
}
