use crate::models::UserDim;
use crate::processor::events::PlayEvent;
use std::collections::BTreeMap;

/// One row per user. Name, gender and level come from the user's latest play
/// by (ts, ingestion sequence), so a free-to-paid upgrade is reflected.
pub fn build_users(plays: &[PlayEvent]) -> Vec<UserDim> {
    let mut latest: BTreeMap<&str, &PlayEvent> = BTreeMap::new();

    for play in plays {
        latest
            .entry(play.user_id.as_str())
            .and_modify(|current| {
                if play.order_key() > current.order_key() {
                    *current = play;
                }
            })
            .or_insert(play);
    }

    latest
        .into_iter()
        .map(|(user_id, play)| UserDim {
            user_id: user_id.to_string(),
            first_name: play.event.first_name.clone(),
            last_name: play.event.last_name.clone(),
            gender: play.event.gender.clone(),
            level: play.event.level.clone(),
        })
        .collect()
}
