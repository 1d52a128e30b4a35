use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use lazy_static::lazy_static;
use std::sync::Arc;

// File schemas hold every column except the partition columns, which live in
// the directory names.

pub fn songs_schema() -> Schema {
    Schema::new(vec![
        Field::new("song_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("duration", DataType::Float64, true),
    ])
}

pub fn artists_schema() -> Schema {
    Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
    ])
}

pub fn users_schema() -> Schema {
    Schema::new(vec![
        Field::new("user_id", DataType::Utf8, false),
        Field::new("first_name", DataType::Utf8, true),
        Field::new("last_name", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
    ])
}

pub fn time_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "start_time",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("hour", DataType::Int32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ])
}

pub fn songplays_schema() -> Schema {
    Schema::new(vec![
        Field::new("songplay_id", DataType::Int64, false),
        Field::new(
            "start_time",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("user_id", DataType::Utf8, false),
        Field::new("level", DataType::Utf8, true),
        Field::new("song_id", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("session_id", DataType::Int64, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("user_agent", DataType::Utf8, true),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StarTableKind {
    Songs,
    Artists,
    Users,
    Time,
    Songplays,
}

impl StarTableKind {
    pub const ALL: [StarTableKind; 5] = [
        StarTableKind::Songs,
        StarTableKind::Artists,
        StarTableKind::Users,
        StarTableKind::Time,
        StarTableKind::Songplays,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Songs => "songs",
            Self::Artists => "artists",
            Self::Users => "users",
            Self::Time => "time",
            Self::Songplays => "songplays",
        }
    }

    /// Directory under the output root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Songs => "songs.parquet",
            Self::Artists => "artists.parquet",
            Self::Users => "users.parquet",
            Self::Time => "time.parquet",
            Self::Songplays => "songplays.parquet",
        }
    }

    /// Partition columns in directory nesting order.
    pub fn partition_columns(&self) -> Vec<(&'static str, DataType)> {
        match self {
            Self::Songs => vec![("year", DataType::Int32), ("artist_id", DataType::Utf8)],
            Self::Time | Self::Songplays => {
                vec![("year", DataType::Int32), ("month", DataType::Int32)]
            }
            Self::Artists | Self::Users => vec![],
        }
    }

    pub fn file_schema(&self) -> SchemaRef {
        match self {
            Self::Songs => SONGS_SCHEMA.clone(),
            Self::Artists => ARTISTS_SCHEMA.clone(),
            Self::Users => USERS_SCHEMA.clone(),
            Self::Time => TIME_SCHEMA.clone(),
            Self::Songplays => SONGPLAYS_SCHEMA.clone(),
        }
    }
}

impl std::fmt::Display for StarTableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

// Lazy-loaded static schemas
lazy_static! {
    static ref SONGS_SCHEMA: SchemaRef = Arc::new(songs_schema());
    static ref ARTISTS_SCHEMA: SchemaRef = Arc::new(artists_schema());
    static ref USERS_SCHEMA: SchemaRef = Arc::new(users_schema());
    static ref TIME_SCHEMA: SchemaRef = Arc::new(time_schema());
    static ref SONGPLAYS_SCHEMA: SchemaRef = Arc::new(songplays_schema());
}
