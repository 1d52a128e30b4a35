use super::SourceRecord;
use super::fields::{float_field, int_field, string_field};
use serde::Serialize;
use serde_json::{Map, Value};

/// Page value of events that represent an actual song play.
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// One line of the activity log. Accepts both the log's camelCase keys
/// (`userId`, `sessionId`, `length`, ...) and snake_case equivalents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub seq: u64,
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<f64>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub page: Option<String>,
    /// Epoch milliseconds; `None` when missing or non-numeric.
    pub ts: Option<i64>,
    pub registration: Option<i64>,
}

impl EventRecord {
    pub fn is_song_play(&self) -> bool {
        self.page.as_deref() == Some(NEXT_SONG_PAGE)
    }

    /// The user id, if present and non-blank.
    pub fn known_user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

impl SourceRecord for EventRecord {
    const SOURCE: &'static str = "event log";

    fn from_json(object: &Map<String, Value>, seq: u64) -> Self {
        Self {
            seq,
            user_id: string_field(object, &["userId", "user_id"]),
            first_name: string_field(object, &["firstName", "first_name"]),
            last_name: string_field(object, &["lastName", "last_name"]),
            gender: string_field(object, &["gender"]),
            level: string_field(object, &["level"]),
            song: string_field(object, &["song"]),
            artist: string_field(object, &["artist"]),
            duration: float_field(object, &["length", "duration"]),
            session_id: int_field(object, &["sessionId", "session_id"]),
            location: string_field(object, &["location"]),
            user_agent: string_field(object, &["userAgent", "user_agent"]),
            page: string_field(object, &["page"]),
            ts: int_field(object, &["ts"]),
            registration: int_field(object, &["registration"]),
        }
    }
}
