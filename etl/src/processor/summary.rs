use crate::schema::StarTableKind;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Counters collected over one run. Row-level problems are only reported
/// here, never logged one by one.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub catalog_files: usize,
    pub catalog_records: usize,
    pub catalog_malformed: usize,
    pub catalog_missing_keys: usize,
    pub event_files: usize,
    pub event_records: usize,
    pub event_malformed: usize,
    pub non_play_events: usize,
    pub bad_timestamps: usize,
    pub anonymous_plays: usize,
    pub ambiguous_matches: usize,
    pub unmatched_plays: usize,
    pub table_rows: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn record_rows(&mut self, kind: StarTableKind, rows: usize) {
        self.table_rows.insert(kind.table_name().to_string(), rows);
    }

    pub fn rows(&self, kind: StarTableKind) -> usize {
        self.table_rows.get(kind.table_name()).copied().unwrap_or(0)
    }

    pub fn log(&self) {
        info!(
            catalog_files = self.catalog_files,
            catalog_records = self.catalog_records,
            catalog_malformed = self.catalog_malformed,
            catalog_missing_keys = self.catalog_missing_keys,
            event_files = self.event_files,
            event_records = self.event_records,
            event_malformed = self.event_malformed,
            "Sources read"
        );
        info!(
            non_play_events = self.non_play_events,
            bad_timestamps = self.bad_timestamps,
            anonymous_plays = self.anonymous_plays,
            ambiguous_matches = self.ambiguous_matches,
            unmatched_plays = self.unmatched_plays,
            "Events filtered and matched"
        );
        for (table, rows) in &self.table_rows {
            info!(table = %table, rows, "Rows written");
        }
    }
}
