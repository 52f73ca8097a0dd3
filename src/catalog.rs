//! In-memory track catalog.
//!
//! Loaded once from an external array of track records and read-only
//! afterwards. Queries never fail: a miss is `None` or an empty `Vec`.

use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::track::{Session, Track};

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    tracks: Vec<Track>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, keeping the first record of any duplicated id.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        let mut catalog = Self {
            tracks: Vec::with_capacity(tracks.len()),
            index: HashMap::with_capacity(tracks.len()),
        };

        for track in tracks {
            if catalog.index.contains_key(&track.id) {
                warn!("Duplicate track id {} in catalog source, keeping first record", track.id);
                continue;
            }
            catalog.index.insert(track.id.clone(), catalog.tracks.len());
            catalog.tracks.push(track);
        }

        info!("Loaded {} tracks", catalog.tracks.len());
        catalog
    }

    /// Load a JSON array of track records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a track array.
    pub fn load_json(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let tracks: Vec<Track> = serde_json::from_str(&data)
            .with_context(|| format!("Catalog file {} is not a track array", path.display()))?;
        Ok(Self::from_tracks(tracks))
    }

    #[must_use]
    pub fn get_track(&self, id: &str) -> Option<&Track> {
        self.index.get(id).map(|&i| &self.tracks[i])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn all_tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks of a genre (case-insensitive), in load order.
    pub fn get_tracks_by_genre(&self, genre: &str, limit: usize) -> Vec<&Track> {
        self.tracks
            .iter()
            .filter(|track| track.genre.eq_ignore_ascii_case(genre))
            .take(limit)
            .collect()
    }

    /// Tracks by an artist name (case-insensitive), in load order.
    pub fn get_tracks_by_artist(&self, artist: &str, limit: usize) -> Vec<&Track> {
        self.tracks
            .iter()
            .filter(|track| track.artist.eq_ignore_ascii_case(artist))
            .take(limit)
            .collect()
    }

    /// Most popular tracks first; equal popularity keeps load order.
    pub fn get_popular_tracks(&self, limit: usize) -> Vec<&Track> {
        let mut ranked: Vec<&Track> = self.tracks.iter().collect();
        // stable sort keeps load order on ties
        ranked.sort_by(|a, b| b.popularity.cmp(&a.popularity));
        ranked.truncate(limit);
        ranked
    }
}

/// Load a JSON array of `{userId, sessionId, tracks}` records.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_sessions(path: &Path) -> Result<Vec<Session>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sessions file {}", path.display()))?;
    let sessions: Vec<Session> = serde_json::from_str(&data)
        .with_context(|| format!("Sessions file {} is not a session array", path.display()))?;
    info!("Loaded {} sessions", sessions.len());
    Ok(sessions)
}
