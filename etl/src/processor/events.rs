use crate::models::EventRecord;
use crate::processor::time::decode_timestamp;
use chrono::{DateTime, Utc};
use tracing::debug;

/// A song-play event that survived filtering: page is `NextSong`, the user is
/// known and the timestamp decodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub event: EventRecord,
    pub user_id: String,
    pub ts: i64,
    pub start_time: DateTime<Utc>,
}

impl PlayEvent {
    pub fn new(event: EventRecord, user_id: String, ts: i64, start_time: DateTime<Utc>) -> Self {
        Self {
            event,
            user_id,
            ts,
            start_time,
        }
    }

    /// Deterministic ordering key: timestamp, then ingestion sequence.
    pub fn order_key(&self) -> (i64, u64) {
        (self.ts, self.event.seq)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaySelection {
    pub plays: Vec<PlayEvent>,
    pub non_play_events: usize,
    pub anonymous_plays: usize,
    pub bad_timestamps: usize,
}

/// Keeps the fact-eligible events. Rows with an undecodable timestamp are
/// dropped and counted rather than failing the batch.
pub fn select_plays(events: Vec<EventRecord>) -> PlaySelection {
    let mut selection = PlaySelection::default();

    for event in events {
        if !event.is_song_play() {
            selection.non_play_events += 1;
            continue;
        }

        let Some(user_id) = event.known_user_id().map(str::to_string) else {
            selection.anonymous_plays += 1;
            continue;
        };

        match decode_timestamp(event.ts) {
            Ok(start_time) => {
                let ts = start_time.timestamp_millis();
                selection.plays.push(PlayEvent::new(event, user_id, ts, start_time));
            }
            Err(e) => {
                debug!(seq = event.seq, error = %e, "Dropping play with bad timestamp");
                selection.bad_timestamps += 1;
            }
        }
    }

    selection.plays.sort_by_key(PlayEvent::order_key);
    selection
}
