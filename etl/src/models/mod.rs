mod event;
mod fields;
mod song;
mod star;

pub use event::{EventRecord, NEXT_SONG_PAGE};
pub use song::SongRecord;
pub use star::{ArtistDim, SongDim, SongPlayFact, TimeDim, UserDim};

use serde_json::{Map, Value};

/// A raw record type the reader knows how to coerce out of a JSON object.
pub trait SourceRecord: Sized {
    /// Human-readable source name used in logs and errors.
    const SOURCE: &'static str;

    /// Builds the record, coercing mistyped fields to `None`. `seq` is the
    /// record's position in ingestion order.
    fn from_json(object: &Map<String, Value>, seq: u64) -> Self;
}
