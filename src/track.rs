//! Track and listening-session records.
//!
//! Both are plain data: tracks are immutable once the [`Catalog`](crate::catalog::Catalog)
//! owns them, and sessions are read-only training input that may be replayed
//! any number of times.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound used to normalize tempo differences (BPM).
pub const MAX_TEMPO: f64 = 200.0;

/// Audio descriptors of a track. Energy and danceability are in `[0, 1]`,
/// tempo is in BPM and normalized against [`MAX_TEMPO`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub tempo: f64,
    pub energy: f64,
    pub danceability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub artist_id: String,
    pub genre: String,
    pub tags: BTreeSet<String>,
    #[serde(flatten)]
    pub audio: AudioFeatures,
    /// 0-100
    pub popularity: u8,
}

impl Track {
    /// Popularity mapped onto `[0, 1]`.
    #[must_use]
    pub fn popularity_score(&self) -> f64 {
        f64::from(self.popularity.min(100)) / 100.0
    }

    #[must_use]
    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            genre: self.genre.clone(),
        }
    }
}

/// The identity part of a track, as echoed back with recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub genre: String,
}

/// One user's ordered listening session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
    pub tracks: Vec<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>, tracks: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            tracks,
        }
    }

    /// Session without user attribution, mostly handy when building training
    /// data by hand.
    pub fn anonymous<I, S>(tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracks: tracks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}
