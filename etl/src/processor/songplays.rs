use crate::models::{ArtistDim, SongDim, SongPlayFact};
use crate::processor::events::PlayEvent;
use chrono::Datelike;
use std::collections::HashMap;
use tracing::debug;

/// Maximum difference, in seconds, between an event's duration and a
/// catalog song's duration for the two to be considered the same recording.
pub const DURATION_TOLERANCE_SECS: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    song_id: String,
    artist_id: String,
    duration: Option<f64>,
}

impl Candidate {
    fn accepts(&self, duration: Option<f64>) -> bool {
        match (duration, self.duration) {
            (None, _) => true,
            (Some(event), Some(song)) => (event - song).abs() < DURATION_TOLERANCE_SECS,
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Unique {
        song_id: String,
        artist_id: String,
    },
    /// Several songs qualified; the lowest song_id was taken.
    Ambiguous {
        song_id: String,
        artist_id: String,
        candidates: usize,
    },
    Unmatched,
}

impl MatchOutcome {
    pub fn ids(&self) -> (Option<String>, Option<String>) {
        match self {
            Self::Unique { song_id, artist_id } | Self::Ambiguous { song_id, artist_id, .. } => {
                (Some(song_id.clone()), Some(artist_id.clone()))
            }
            Self::Unmatched => (None, None),
        }
    }
}

/// Lookup from (song title, artist name) to catalog songs.
pub struct SongMatcher {
    index: HashMap<(String, String), Vec<Candidate>>,
}

impl SongMatcher {
    pub fn new(songs: &[SongDim], artists: &[ArtistDim]) -> Self {
        let names: HashMap<&str, &str> = artists
            .iter()
            .filter_map(|a| a.name.as_deref().map(|name| (a.artist_id.as_str(), name)))
            .collect();

        let mut index: HashMap<(String, String), Vec<Candidate>> = HashMap::new();
        for song in songs {
            let (Some(title), Some(name)) = (song.title.as_deref(), names.get(song.artist_id.as_str()))
            else {
                continue;
            };
            index
                .entry((title.to_string(), name.to_string()))
                .or_default()
                .push(Candidate {
                    song_id: song.song_id.clone(),
                    artist_id: song.artist_id.clone(),
                    duration: song.duration,
                });
        }

        for candidates in index.values_mut() {
            candidates.sort_by(|a, b| a.song_id.cmp(&b.song_id));
        }

        Self { index }
    }

    pub fn resolve(&self, title: Option<&str>, artist: Option<&str>, duration: Option<f64>) -> MatchOutcome {
        let (Some(title), Some(artist)) = (title, artist) else {
            return MatchOutcome::Unmatched;
        };
        let Some(candidates) = self.index.get(&(title.to_string(), artist.to_string())) else {
            return MatchOutcome::Unmatched;
        };

        let mut accepted = candidates.iter().filter(|c| c.accepts(duration));
        let Some(first) = accepted.next() else {
            return MatchOutcome::Unmatched;
        };

        match accepted.count() {
            0 => MatchOutcome::Unique {
                song_id: first.song_id.clone(),
                artist_id: first.artist_id.clone(),
            },
            others => MatchOutcome::Ambiguous {
                song_id: first.song_id.clone(),
                artist_id: first.artist_id.clone(),
                candidates: others + 1,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FactTable {
    pub rows: Vec<SongPlayFact>,
    pub unmatched: usize,
    pub ambiguous: usize,
}

/// Builds one fact row per play. `plays` must already be ordered by
/// (ts, sequence); songplay_id is the 1-based position in that order.
pub fn assemble_songplays(plays: &[PlayEvent], matcher: &SongMatcher) -> FactTable {
    let mut table = FactTable {
        rows: Vec::with_capacity(plays.len()),
        ..Default::default()
    };

    for (position, play) in plays.iter().enumerate() {
        let event = &play.event;
        let outcome = matcher.resolve(event.song.as_deref(), event.artist.as_deref(), event.duration);

        match &outcome {
            MatchOutcome::Unmatched => table.unmatched += 1,
            MatchOutcome::Ambiguous { song_id, candidates, .. } => {
                debug!(
                    seq = event.seq,
                    song_id = %song_id,
                    candidates,
                    "Ambiguous song match resolved to lowest song_id"
                );
                table.ambiguous += 1;
            }
            MatchOutcome::Unique { .. } => {}
        }

        let (song_id, artist_id) = outcome.ids();
        table.rows.push(SongPlayFact {
            songplay_id: position as i64 + 1,
            start_time: play.start_time,
            year: play.start_time.year(),
            month: play.start_time.month() as i32,
            user_id: play.user_id.clone(),
            level: event.level.clone(),
            song_id,
            artist_id,
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
        });
    }

    table
}
