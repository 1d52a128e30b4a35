use crate::models::{ArtistDim, SongDim, SongPlayFact, TimeDim, UserDim};
use crate::schema::StarTableKind;
use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::record_batch::RecordBatch;
use common::Result;
use std::sync::Arc;

/// A row of one of the five output tables.
pub trait StarRow: Sync {
    const KIND: StarTableKind;

    /// Values of the table's partition columns, in directory nesting order.
    fn partition_values(&self) -> Vec<String>;

    /// Encodes rows against the table's file schema (partition columns excluded).
    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch>;
}

fn strings<'a, R>(rows: &[&'a R], f: impl Fn(&'a R) -> Option<&'a str>) -> ArrayRef {
    Arc::new(rows.iter().map(|row| f(*row)).collect::<StringArray>())
}

fn floats<R>(rows: &[&R], f: impl Fn(&R) -> Option<f64>) -> ArrayRef {
    Arc::new(rows.iter().map(|row| f(*row)).collect::<Float64Array>())
}

fn ints<R>(rows: &[&R], f: impl Fn(&R) -> i32) -> ArrayRef {
    Arc::new(rows.iter().map(|row| Some(f(*row))).collect::<Int32Array>())
}

fn timestamps(millis: Vec<i64>) -> ArrayRef {
    Arc::new(TimestampMillisecondArray::from(millis))
}

impl StarRow for SongDim {
    const KIND: StarTableKind = StarTableKind::Songs;

    fn partition_values(&self) -> Vec<String> {
        vec![self.year.to_string(), self.artist_id.clone()]
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch> {
        let batch = RecordBatch::try_new(
            Self::KIND.file_schema(),
            vec![
                strings(rows, |r| Some(r.song_id.as_str())),
                strings(rows, |r| r.title.as_deref()),
                floats(rows, |r| r.duration),
            ],
        )?;
        Ok(batch)
    }
}

impl StarRow for ArtistDim {
    const KIND: StarTableKind = StarTableKind::Artists;

    fn partition_values(&self) -> Vec<String> {
        Vec::new()
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch> {
        let batch = RecordBatch::try_new(
            Self::KIND.file_schema(),
            vec![
                strings(rows, |r| Some(r.artist_id.as_str())),
                strings(rows, |r| r.name.as_deref()),
                strings(rows, |r| r.location.as_deref()),
                floats(rows, |r| r.latitude),
                floats(rows, |r| r.longitude),
            ],
        )?;
        Ok(batch)
    }
}

impl StarRow for UserDim {
    const KIND: StarTableKind = StarTableKind::Users;

    fn partition_values(&self) -> Vec<String> {
        Vec::new()
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch> {
        let batch = RecordBatch::try_new(
            Self::KIND.file_schema(),
            vec![
                strings(rows, |r| Some(r.user_id.as_str())),
                strings(rows, |r| r.first_name.as_deref()),
                strings(rows, |r| r.last_name.as_deref()),
                strings(rows, |r| r.gender.as_deref()),
                strings(rows, |r| r.level.as_deref()),
            ],
        )?;
        Ok(batch)
    }
}

impl StarRow for TimeDim {
    const KIND: StarTableKind = StarTableKind::Time;

    fn partition_values(&self) -> Vec<String> {
        vec![self.year.to_string(), self.month.to_string()]
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch> {
        let batch = RecordBatch::try_new(
            Self::KIND.file_schema(),
            vec![
                timestamps(rows.iter().map(|r| r.start_time.timestamp_millis()).collect()),
                ints(rows, |r| r.hour),
                ints(rows, |r| r.day),
                ints(rows, |r| r.week),
                ints(rows, |r| r.weekday),
            ],
        )?;
        Ok(batch)
    }
}

impl StarRow for SongPlayFact {
    const KIND: StarTableKind = StarTableKind::Songplays;

    fn partition_values(&self) -> Vec<String> {
        vec![self.year.to_string(), self.month.to_string()]
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch> {
        let songplay_ids: Int64Array = rows.iter().map(|r| Some(r.songplay_id)).collect();
        let session_ids: Int64Array = rows.iter().map(|r| r.session_id).collect();

        let batch = RecordBatch::try_new(
            Self::KIND.file_schema(),
            vec![
                Arc::new(songplay_ids) as ArrayRef,
                timestamps(rows.iter().map(|r| r.start_time.timestamp_millis()).collect()),
                strings(rows, |r| Some(r.user_id.as_str())),
                strings(rows, |r| r.level.as_deref()),
                strings(rows, |r| r.song_id.as_deref()),
                strings(rows, |r| r.artist_id.as_deref()),
                Arc::new(session_ids) as ArrayRef,
                strings(rows, |r| r.location.as_deref()),
                strings(rows, |r| r.user_agent.as_deref()),
            ],
        )?;
        Ok(batch)
    }
}
