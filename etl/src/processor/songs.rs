use crate::models::{ArtistDim, SongDim, SongRecord};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// `songs` and `artists` dimensions, each sorted by natural key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogTables {
    pub songs: Vec<SongDim>,
    pub artists: Vec<ArtistDim>,
    /// Catalog records dropped for a missing song_id or artist_id.
    pub missing_keys: usize,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Records with both natural keys present, sorted by ingestion sequence so
/// that "first occurrence" never depends on how the input was gathered.
fn keyed_records(records: &[SongRecord]) -> (Vec<(&str, &str, &SongRecord)>, usize) {
    let mut keyed = Vec::with_capacity(records.len());
    let mut missing = 0;

    for record in records {
        match (non_blank(record.song_id.as_ref()), non_blank(record.artist_id.as_ref())) {
            (Some(song_id), Some(artist_id)) => keyed.push((song_id, artist_id, record)),
            _ => missing += 1,
        }
    }

    keyed.sort_by_key(|(_, _, record)| record.seq);
    (keyed, missing)
}

/// One row per distinct song_id; the first-seen record wins.
pub fn build_songs(records: &[SongRecord]) -> Vec<SongDim> {
    let (keyed, _) = keyed_records(records);
    let mut songs: BTreeMap<&str, SongDim> = BTreeMap::new();

    for (song_id, artist_id, record) in keyed {
        if let Entry::Vacant(slot) = songs.entry(song_id) {
            slot.insert(SongDim {
                song_id: song_id.to_string(),
                title: record.title.clone(),
                artist_id: artist_id.to_string(),
                year: record.year,
                duration: record.duration,
            });
        }
    }

    songs.into_values().collect()
}

/// One row per distinct artist_id; the first-seen record wins.
pub fn build_artists(records: &[SongRecord]) -> Vec<ArtistDim> {
    let (keyed, _) = keyed_records(records);
    let mut artists: BTreeMap<&str, ArtistDim> = BTreeMap::new();

    for (_, artist_id, record) in keyed {
        if let Entry::Vacant(slot) = artists.entry(artist_id) {
            slot.insert(ArtistDim {
                artist_id: artist_id.to_string(),
                name: record.artist_name.clone(),
                location: record.artist_location.clone(),
                latitude: record.artist_latitude,
                longitude: record.artist_longitude,
            });
        }
    }

    artists.into_values().collect()
}

pub fn build_catalog_tables(records: &[SongRecord]) -> CatalogTables {
    let (_, missing_keys) = keyed_records(records);
    CatalogTables {
        songs: build_songs(records),
        artists: build_artists(records),
        missing_keys,
    }
}
