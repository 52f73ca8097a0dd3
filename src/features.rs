//! Content signals computed from catalog metadata alone.

use std::collections::BTreeSet;

use crate::track::{AudioFeatures, Track, MAX_TEMPO};

/// `1 - mean(|Δtempo| / MAX_TEMPO, |Δenergy|, |Δdanceability|)`, floored at 0.
#[must_use]
pub fn audio_similarity(a: &AudioFeatures, b: &AudioFeatures) -> f64 {
    let tempo = (a.tempo - b.tempo).abs() / MAX_TEMPO;
    let energy = (a.energy - b.energy).abs();
    let danceability = (a.danceability - b.danceability).abs();
    (1.0 - (tempo + energy + danceability) / 3.0).max(0.0)
}

/// `|a ∩ b| / |a ∪ b|`, 0 when both sets are empty.
#[must_use]
pub fn tag_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    #[allow(clippy::cast_precision_loss)]
    let score = intersection as f64 / union as f64;
    score
}

#[must_use]
pub fn genre_match(a: &Track, b: &Track) -> f64 {
    if a.genre == b.genre { 1.0 } else { 0.0 }
}

#[must_use]
pub fn artist_match(a: &Track, b: &Track) -> f64 {
    if a.artist_id == b.artist_id { 1.0 } else { 0.0 }
}
