use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongDim {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: String,
    pub year: i32,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistDim {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDim {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// Calendar breakdown of one play timestamp (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeDim {
    pub start_time: DateTime<Utc>,
    pub hour: i32,
    pub day: i32,
    /// ISO-8601 week number.
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// Monday = 0 ... Sunday = 6.
    pub weekday: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongPlayFact {
    pub songplay_id: i64,
    pub start_time: DateTime<Utc>,
    pub year: i32,
    pub month: i32,
    pub user_id: String,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}
