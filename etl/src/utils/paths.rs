/// Name of the commit marker written into each table directory.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Name of the single data file written into each partition directory.
pub const PART_FILE_NAME: &str = "part-00000.parquet";

/// Builds Hive-style partition paths (`table.parquet/year=2018/month=11/...`).
#[derive(Debug, Clone)]
pub struct PathBuilder {
    table_dir: String,
    partitions: Vec<(String, String)>,
}

impl PathBuilder {
    pub fn new(table_dir: &str) -> Self {
        Self {
            table_dir: table_dir.trim_matches('/').to_string(),
            partitions: Vec::new(),
        }
    }

    pub fn with_partition(mut self, column: &str, value: &str) -> Self {
        self.partitions
            .push((column.to_string(), escape_partition_value(value)));
        self
    }

    pub fn build_storage_path(&self) -> String {
        let mut path = self.table_dir.clone();
        for (column, value) in &self.partitions {
            path.push('/');
            path.push_str(column);
            path.push('=');
            path.push_str(value);
        }
        path
    }

    pub fn build_file_path(&self, filename: &str) -> String {
        format!("{}/{}", self.build_storage_path(), filename)
    }

    pub fn build_marker_path(&self) -> String {
        format!("{}/{}", self.table_dir, SUCCESS_MARKER)
    }
}

/// Percent-escapes a partition value for use as a directory name. Only
/// unreserved characters (`A-Za-z0-9-_.~`) are kept as-is.
pub fn escape_partition_value(value: &str) -> String {
    let escaped = urlencoding::encode(value).into_owned();
    // "." and ".." are not valid path segments
    if !escaped.is_empty() && escaped.chars().all(|c| c == '.') {
        return escaped.replace('.', "%2E");
    }
    escaped
}

/// Inverse of [`escape_partition_value`]. Values that do not decode to UTF-8
/// are returned unchanged.
pub fn unescape_partition_value(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
