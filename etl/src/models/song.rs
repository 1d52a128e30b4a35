use super::SourceRecord;
use super::fields::{float_field, int_field, string_field};
use serde::Serialize;
use serde_json::{Map, Value};

/// One entry of the song/artist catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRecord {
    pub seq: u64,
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub duration: Option<f64>,
    /// 0 when unknown.
    pub year: i32,
}

impl SourceRecord for SongRecord {
    const SOURCE: &'static str = "song catalog";

    fn from_json(object: &Map<String, Value>, seq: u64) -> Self {
        Self {
            seq,
            song_id: string_field(object, &["song_id"]),
            title: string_field(object, &["title"]),
            artist_id: string_field(object, &["artist_id"]),
            artist_name: string_field(object, &["artist_name"]),
            artist_location: string_field(object, &["artist_location"]),
            artist_latitude: float_field(object, &["artist_latitude"]),
            artist_longitude: float_field(object, &["artist_longitude"]),
            duration: float_field(object, &["duration"]),
            year: int_field(object, &["year"])
                .and_then(|y| i32::try_from(y).ok())
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_record() {
        let value = json!({
            "num_songs": 1,
            "artist_id": "AR5KOSW1187FB35FF4",
            "artist_latitude": 49.80388,
            "artist_longitude": 15.47491,
            "artist_location": "Dubai UAE",
            "artist_name": "Elena",
            "song_id": "SOZCTXZ12AB0182364",
            "title": "Setanta matins",
            "duration": 269.58322,
            "year": 0
        });
        let record = SongRecord::from_json(value.as_object().unwrap(), 7);

        assert_eq!(record.seq, 7);
        assert_eq!(record.song_id.as_deref(), Some("SOZCTXZ12AB0182364"));
        assert_eq!(record.artist_name.as_deref(), Some("Elena"));
        assert_eq!(record.artist_latitude, Some(49.80388));
        assert_eq!(record.year, 0);
    }

    #[test]
    fn test_mistyped_fields_become_null() {
        let value = json!({
            "song_id": "SOA",
            "artist_id": "ARA",
            "artist_latitude": "",
            "duration": {"seconds": 10},
            "year": "nineteen"
        });
        let record = SongRecord::from_json(value.as_object().unwrap(), 0);

        assert_eq!(record.artist_latitude, None);
        assert_eq!(record.duration, None);
        assert_eq!(record.year, 0);
        assert_eq!(record.title, None);
    }
}
