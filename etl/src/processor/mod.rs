pub mod catalog;
pub mod events;
pub mod reader;
pub mod songplays;
pub mod songs;
pub mod summary;
pub mod table;
pub mod time;
pub mod users;
pub mod writer;

pub use catalog::StarCatalog;
pub use reader::{RecordReader, SourceBatch};
pub use summary::RunSummary;
pub use writer::{CommitMarker, TableWriter, WrittenTable};

use crate::models::{ArtistDim, EventRecord, SongDim, SongPlayFact, SongRecord, TimeDim, UserDim};
use crate::storage::{ObjectStorage, StoreManager};
use common::Result;
use common::config::Settings;
use std::sync::Arc;
use tracing::info;

/// The five output tables of one run.
#[derive(Debug, Clone, Default)]
pub struct StarSchema {
    pub songs: Vec<SongDim>,
    pub artists: Vec<ArtistDim>,
    pub users: Vec<UserDim>,
    pub time: Vec<TimeDim>,
    pub songplays: Vec<SongPlayFact>,
}

/// Derives every table from one snapshot of the sources. Pure: the same
/// records always give the same tables.
pub fn build_star_schema(
    catalog: &[SongRecord],
    events: Vec<EventRecord>,
    summary: &mut RunSummary,
) -> StarSchema {
    let catalog_tables = songs::build_catalog_tables(catalog);
    summary.catalog_missing_keys = catalog_tables.missing_keys;

    let selection = events::select_plays(events);
    summary.non_play_events = selection.non_play_events;
    summary.anonymous_plays = selection.anonymous_plays;
    summary.bad_timestamps = selection.bad_timestamps;

    let users = users::build_users(&selection.plays);
    let time = time::build_time_table(&selection.plays);

    let matcher = songplays::SongMatcher::new(&catalog_tables.songs, &catalog_tables.artists);
    let facts = songplays::assemble_songplays(&selection.plays, &matcher);
    summary.unmatched_plays = facts.unmatched;
    summary.ambiguous_matches = facts.ambiguous;

    StarSchema {
        songs: catalog_tables.songs,
        artists: catalog_tables.artists,
        users,
        time,
        songplays: facts.rows,
    }
}

pub struct EtlPipeline {
    input: Arc<dyn ObjectStorage>,
    output: Arc<dyn ObjectStorage>,
    song_data_prefix: String,
    log_data_prefix: String,
}

impl EtlPipeline {
    pub fn new(
        input: Arc<dyn ObjectStorage>,
        output: Arc<dyn ObjectStorage>,
        song_data_prefix: &str,
        log_data_prefix: &str,
    ) -> Self {
        Self {
            input,
            output,
            song_data_prefix: song_data_prefix.to_string(),
            log_data_prefix: log_data_prefix.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut stores = StoreManager::new(settings.storage.clone());
        let input = stores.open(&settings.input_data)?;
        let output = stores.open(&settings.output_data)?;

        info!(
            input = %input.location(),
            output = %output.location(),
            "Pipeline storage ready"
        );

        Ok(Self::new(
            input,
            output,
            &settings.song_data_prefix,
            &settings.log_data_prefix,
        ))
    }

    pub async fn load_song_data(&self, summary: &mut RunSummary) -> Result<Vec<SongRecord>> {
        let batch: SourceBatch<SongRecord> = RecordReader::new(self.input.clone())
            .read_records(&self.song_data_prefix)
            .await?;

        summary.catalog_files = batch.files;
        summary.catalog_records = batch.records.len();
        summary.catalog_malformed = batch.malformed;
        Ok(batch.records)
    }

    pub async fn load_log_data(&self, summary: &mut RunSummary) -> Result<Vec<EventRecord>> {
        let batch: SourceBatch<EventRecord> = RecordReader::new(self.input.clone())
            .read_records(&self.log_data_prefix)
            .await?;

        summary.event_files = batch.files;
        summary.event_records = batch.records.len();
        summary.event_malformed = batch.malformed;
        Ok(batch.records)
    }

    /// Replaces the output tables with `schema`. Markers are removed first
    /// and are not written here; see [`EtlPipeline::commit_markers`].
    pub async fn write_star_schema(&self, schema: &StarSchema) -> Result<Vec<WrittenTable>> {
        let writer = TableWriter::new(self.output.clone());
        writer.clear_markers().await?;

        Ok(vec![
            writer.write_table(&schema.songs).await?,
            writer.write_table(&schema.artists).await?,
            writer.write_table(&schema.users).await?,
            writer.write_table(&schema.time).await?,
            writer.write_table(&schema.songplays).await?,
        ])
    }

    /// Marks every written table complete. Only called once the output has
    /// been read back and verified.
    pub async fn commit_markers(
        &self,
        written: &[WrittenTable],
        summary: &mut RunSummary,
    ) -> Result<()> {
        let writer = TableWriter::new(self.output.clone());
        for table in written {
            writer.write_marker(table).await?;
            summary.record_rows(table.kind, table.row_count);
        }
        Ok(())
    }

    /// Reads both sources, builds the star schema, writes and verifies it,
    /// then commits the markers. Nothing is written if either source fails
    /// and no marker survives a failed write or verification.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let catalog = self.load_song_data(&mut summary).await?;
        let events = self.load_log_data(&mut summary).await?;

        let schema = build_star_schema(&catalog, events, &mut summary);
        info!(
            songs = schema.songs.len(),
            artists = schema.artists.len(),
            users = schema.users.len(),
            time = schema.time.len(),
            songplays = schema.songplays.len(),
            "Star schema built"
        );

        let written = self.write_star_schema(&schema).await?;

        StarCatalog::open(self.output.as_ref())
            .await?
            .verify(&written)
            .await?;

        self.commit_markers(&written, &mut summary).await?;

        summary.log();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceRecord;
    use crate::schema::StarTableKind;
    use crate::storage::StorageLocation;
    use crate::utils::paths::SUCCESS_MARKER;
    use async_trait::async_trait;
    use common::Error;
    use common::config::StorageSettings;
    use object_store::ObjectStore;

    const SETANTA_SONG: &str = r#"{"num_songs": 1, "artist_id": "AR5KOSW1187FB35FF4", "artist_latitude": 49.80388, "artist_longitude": 15.47491, "artist_location": "Dubai UAE", "artist_name": "Elena", "song_id": "SOZCTXZ12AB0182364", "title": "Setanta matins", "duration": 269.58, "year": 0}"#;

    const SETANTA_PLAY: &str = r#"{"artist":"Elena","auth":"Logged In","firstName":"Kaylee","gender":"F","itemInSession":0,"lastName":"Summers","length":269.58,"level":"free","location":"Phoenix-Mesa-Scottsdale, AZ","method":"PUT","page":"NextSong","registration":1540344794796.0,"sessionId":139,"song":"Setanta matins","status":200,"ts":1541106106796,"userAgent":"Mozilla/5.0","userId":"8"}"#;

    const UNKNOWN_PLAY: &str = r#"{"artist":"Des'ree","firstName":"Kaylee","lastName":"Summers","gender":"F","length":246.30812,"level":"free","page":"NextSong","sessionId":139,"song":"You Gotta Be","ts":1541106496796,"userId":"8"}"#;

    const HOME_VISIT: &str = r#"{"artist":null,"firstName":"Kaylee","lastName":"Summers","gender":"F","length":null,"level":"free","page":"Home","sessionId":139,"song":null,"ts":1541106673796,"userId":"8"}"#;

    fn settings(input: &str, output: &str) -> Settings {
        Settings {
            input_data: input.to_string(),
            output_data: output.to_string(),
            song_data_prefix: "song_data".to_string(),
            log_data_prefix: "log_data".to_string(),
            storage: StorageSettings::default(),
        }
    }

    /// Input and output roots backed by one in-memory store.
    async fn memory_roots(
        song_files: &[(&str, &str)],
        log_files: &[(&str, String)],
    ) -> (Arc<dyn ObjectStorage>, Arc<dyn ObjectStorage>) {
        let mut stores = StoreManager::new(StorageSettings::default());
        let input: Arc<dyn ObjectStorage> = stores.open("memory:///sparkify/raw").unwrap();
        let output: Arc<dyn ObjectStorage> = stores.open("memory:///sparkify/lake").unwrap();

        for (key, content) in song_files {
            input.put_object(key, content.as_bytes().to_vec()).await.unwrap();
        }
        for (key, content) in log_files {
            input.put_object(key, content.as_bytes().to_vec()).await.unwrap();
        }
        (input, output)
    }

    fn pipeline(input: Arc<dyn ObjectStorage>, output: Arc<dyn ObjectStorage>) -> EtlPipeline {
        EtlPipeline::new(input, output, "song_data", "log_data")
    }

    fn log_file(lines: &[&str]) -> String {
        lines.join("\n")
    }

    async fn markers(storage: &Arc<dyn ObjectStorage>) -> Vec<String> {
        storage
            .list_objects("")
            .await
            .unwrap()
            .into_iter()
            .filter(|key| key.ends_with(SUCCESS_MARKER))
            .collect()
    }

    /// Passes everything through except writes to keys containing `fail_on`.
    struct FailingStorage {
        inner: Arc<dyn ObjectStorage>,
        fail_on: &'static str,
    }

    #[async_trait]
    impl ObjectStorage for FailingStorage {
        async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
            if key.contains(self.fail_on) {
                return Err(Error::Storage(format!("injected failure for {}", key)));
            }
            self.inner.put_object(key, data).await
        }
        async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
            self.inner.get_object(key).await
        }
        async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list_objects(prefix).await
        }
        async fn check_file_exists(&self, key: &str) -> Result<bool> {
            self.inner.check_file_exists(key).await
        }
        async fn delete_object(&self, key: &str) -> Result<()> {
            self.inner.delete_object(key).await
        }
        async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
            self.inner.delete_prefix(prefix).await
        }
        fn location(&self) -> &StorageLocation {
            self.inner.location()
        }
        fn object_store(&self) -> Arc<dyn ObjectStore> {
            self.inner.object_store()
        }
    }

    /// Acknowledges writes to keys containing `drop_on` without storing them.
    struct DroppingStorage {
        inner: Arc<dyn ObjectStorage>,
        drop_on: &'static str,
    }

    #[async_trait]
    impl ObjectStorage for DroppingStorage {
        async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
            if key.contains(self.drop_on) {
                return Ok(());
            }
            self.inner.put_object(key, data).await
        }
        async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
            self.inner.get_object(key).await
        }
        async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list_objects(prefix).await
        }
        async fn check_file_exists(&self, key: &str) -> Result<bool> {
            self.inner.check_file_exists(key).await
        }
        async fn delete_object(&self, key: &str) -> Result<()> {
            self.inner.delete_object(key).await
        }
        async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
            self.inner.delete_prefix(prefix).await
        }
        fn location(&self) -> &StorageLocation {
            self.inner.location()
        }
        fn object_store(&self) -> Arc<dyn ObjectStore> {
            self.inner.object_store()
        }
    }

    #[test]
    fn test_build_star_schema_counts() {
        let song: serde_json::Value = serde_json::from_str(SETANTA_SONG).unwrap();
        let catalog = vec![SongRecord::from_json(song.as_object().unwrap(), 0)];
        let events: Vec<EventRecord> = [SETANTA_PLAY, UNKNOWN_PLAY, HOME_VISIT]
            .iter()
            .enumerate()
            .map(|(seq, line)| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                EventRecord::from_json(value.as_object().unwrap(), seq as u64)
            })
            .collect();

        let mut summary = RunSummary::default();
        let schema = build_star_schema(&catalog, events, &mut summary);

        assert_eq!(schema.songs.len(), 1);
        assert_eq!(schema.artists[0].location.as_deref(), Some("Dubai UAE"));
        assert_eq!(schema.users.len(), 1);
        assert_eq!(schema.time.len(), 2);
        assert_eq!(schema.songplays.len(), 2);
        assert_eq!(schema.songplays[0].song_id.as_deref(), Some("SOZCTXZ12AB0182364"));
        assert_eq!(schema.songplays[1].song_id, None);
        assert_eq!(summary.non_play_events, 1);
        assert_eq!(summary.unmatched_plays, 1);
    }

    #[tokio::test]
    async fn test_end_to_end_setanta_matins() {
        let (input, output) = memory_roots(
            &[("song_data/A/A/B/TRAABJL12903CDCF1A.json", SETANTA_SONG)],
            &[(
                "log_data/2018/11/2018-11-01-events.json",
                log_file(&[SETANTA_PLAY, UNKNOWN_PLAY, HOME_VISIT]),
            )],
        )
        .await;

        let summary = pipeline(input, output.clone()).run().await.unwrap();
        assert_eq!(summary.rows(StarTableKind::Songs), 1);
        assert_eq!(summary.rows(StarTableKind::Artists), 1);
        assert_eq!(summary.rows(StarTableKind::Users), 1);
        assert_eq!(summary.rows(StarTableKind::Time), 2);
        assert_eq!(summary.rows(StarTableKind::Songplays), 2);
        assert_eq!(summary.non_play_events, 1);
        assert_eq!(summary.unmatched_plays, 1);

        assert!(
            output
                .check_file_exists("songs.parquet/year=0/artist_id=AR5KOSW1187FB35FF4/part-00000.parquet")
                .await
                .unwrap()
        );
        assert_eq!(markers(&output).await.len(), 5);

        let catalog = StarCatalog::open(output.as_ref()).await.unwrap();
        let matched = catalog
            .count(
                "SELECT songplay_id FROM songplays \
                 WHERE song_id = 'SOZCTXZ12AB0182364' AND artist_id = 'AR5KOSW1187FB35FF4'",
            )
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let unmatched = catalog
            .count("SELECT songplay_id FROM songplays WHERE song_id IS NULL AND artist_id IS NULL")
            .await
            .unwrap();
        assert_eq!(unmatched, 1);

        let start = catalog
            .count(
                "SELECT start_time FROM \"time\" \
                 WHERE start_time = to_timestamp_millis(1541106106796) AND year = 2018 AND month = 11",
            )
            .await
            .unwrap();
        assert_eq!(start, 1);
    }

    #[tokio::test]
    async fn test_home_page_produces_no_rows() {
        let (input, output) = memory_roots(
            &[("song_data/A/A/B/TRAABJL12903CDCF1A.json", SETANTA_SONG)],
            &[("log_data/2018/11/2018-11-01-events.json", log_file(&[HOME_VISIT]))],
        )
        .await;

        let summary = pipeline(input, output.clone()).run().await.unwrap();
        assert_eq!(summary.rows(StarTableKind::Users), 0);
        assert_eq!(summary.rows(StarTableKind::Time), 0);
        assert_eq!(summary.rows(StarTableKind::Songplays), 0);
        assert!(output.list_objects("songplays.parquet/year=").await.unwrap().is_empty());
        assert!(output.check_file_exists("users.parquet/part-00000.parquet").await.unwrap());
    }

    #[tokio::test]
    async fn test_rerun_produces_identical_tables() {
        let (input, output) = memory_roots(
            &[("song_data/A/A/B/TRAABJL12903CDCF1A.json", SETANTA_SONG)],
            &[(
                "log_data/2018/11/2018-11-01-events.json",
                log_file(&[SETANTA_PLAY, UNKNOWN_PLAY]),
            )],
        )
        .await;
        let etl = pipeline(input, output.clone());

        async fn snapshot(storage: &Arc<dyn ObjectStorage>) -> Vec<(String, Vec<u8>)> {
            let mut files = Vec::new();
            for key in storage.list_objects("").await.unwrap() {
                if !key.ends_with(SUCCESS_MARKER) {
                    let data = storage.get_object(&key).await.unwrap();
                    files.push((key, data));
                }
            }
            files
        }

        let first_summary = etl.run().await.unwrap();
        let first = snapshot(&output).await;
        let second_summary = etl.run().await.unwrap();
        let second = snapshot(&output).await;

        assert_eq!(first_summary, second_summary);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_log_data_writes_nothing() {
        let (input, output) = memory_roots(
            &[("song_data/A/A/B/TRAABJL12903CDCF1A.json", SETANTA_SONG)],
            &[],
        )
        .await;

        let err = pipeline(input, output.clone()).run().await.unwrap_err();
        assert!(matches!(err, Error::SourceRead(_)));
        assert!(output.list_objects("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_markers() {
        let (input, output) = memory_roots(
            &[("song_data/A/A/B/TRAABJL12903CDCF1A.json", SETANTA_SONG)],
            &[("log_data/2018/11/2018-11-01-events.json", log_file(&[SETANTA_PLAY]))],
        )
        .await;

        pipeline(input.clone(), output.clone()).run().await.unwrap();
        assert_eq!(markers(&output).await.len(), 5);

        let failing: Arc<dyn ObjectStorage> = Arc::new(FailingStorage {
            inner: output.clone(),
            fail_on: "songplays.parquet/year=",
        });
        let err = pipeline(input, failing).run().await.unwrap_err();
        assert!(matches!(err, Error::Write(_)));
        assert!(markers(&output).await.is_empty());
    }

    #[tokio::test]
    async fn test_lost_write_fails_verification_without_markers() {
        let (input, output) = memory_roots(
            &[("song_data/A/A/B/TRAABJL12903CDCF1A.json", SETANTA_SONG)],
            &[("log_data/2018/11/2018-11-01-events.json", log_file(&[SETANTA_PLAY]))],
        )
        .await;

        pipeline(input.clone(), output.clone()).run().await.unwrap();
        assert_eq!(markers(&output).await.len(), 5);

        let dropping: Arc<dyn ObjectStorage> = Arc::new(DroppingStorage {
            inner: output.clone(),
            drop_on: "songplays.parquet/year=",
        });
        let err = pipeline(input, dropping).run().await.unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        assert!(markers(&output).await.is_empty());
    }

    #[tokio::test]
    async fn test_odd_artist_id_survives_round_trip() {
        let song = SETANTA_SONG.replace("AR5KOSW1187FB35FF4", "AR 1/x");
        let (input, output) = memory_roots(
            &[("song_data/A/A/B/TRAABJL12903CDCF1A.json", song.as_str())],
            &[("log_data/2018/11/2018-11-01-events.json", log_file(&[SETANTA_PLAY]))],
        )
        .await;

        let summary = pipeline(input, output.clone()).run().await.unwrap();
        assert_eq!(summary.rows(StarTableKind::Songs), 1);
        assert_eq!(markers(&output).await.len(), 5);
        assert!(
            output
                .check_file_exists("songs.parquet/year=0/artist_id=AR%201%2Fx/part-00000.parquet")
                .await
                .unwrap()
        );

        let catalog = StarCatalog::open(output.as_ref()).await.unwrap();
        let joined = catalog
            .count(
                "SELECT s.song_id FROM songs s JOIN artists a ON s.artist_id = a.artist_id \
                 WHERE s.artist_id = 'AR 1/x' AND a.name = 'Elena'",
            )
            .await
            .unwrap();
        assert_eq!(joined, 1);

        let played = catalog
            .count("SELECT songplay_id FROM songplays WHERE artist_id = 'AR 1/x'")
            .await
            .unwrap();
        assert_eq!(played, 1);
    }

    #[tokio::test]
    async fn test_local_filesystem_round_trip() {
        let raw = tempfile::tempdir().unwrap();
        let lake = tempfile::tempdir().unwrap();

        let song_dir = raw.path().join("song_data/A/A/B");
        std::fs::create_dir_all(&song_dir).unwrap();
        std::fs::write(song_dir.join("TRAABJL12903CDCF1A.json"), SETANTA_SONG).unwrap();
        let log_dir = raw.path().join("log_data/2018/11");
        std::fs::create_dir_all(&log_dir).unwrap();
        std::fs::write(log_dir.join("2018-11-01-events.json"), log_file(&[SETANTA_PLAY])).unwrap();

        let settings = settings(
            raw.path().to_str().unwrap(),
            lake.path().to_str().unwrap(),
        );
        let summary = EtlPipeline::from_settings(&settings).unwrap().run().await.unwrap();

        assert_eq!(summary.rows(StarTableKind::Songplays), 1);
        assert!(
            lake.path()
                .join("songplays.parquet/year=2018/month=11/part-00000.parquet")
                .exists()
        );
        assert!(lake.path().join("users.parquet/_SUCCESS").exists());
    }
}
