//! Session co-occurrence counts.
//!
//! For every session, every ordered pair of positions `(i, j)` with `i != j`
//! bumps `matrix[track_i][track_j]`. That is quadratic in session length;
//! sessions are short listening runs, not unbounded logs.
//!
//! Scores are normalized by the *source* track's own strongest count, so
//! `score(a, b)` and `score(b, a)` generally differ.

use log::info;
use std::collections::HashMap;

use crate::track::Session;

/// Outgoing counts of one source track, kept in first-seen order so that
/// equal counts rank deterministically.
#[derive(Debug, Default, Clone)]
struct CoRow {
    counts: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl CoRow {
    fn bump(&mut self, id: &str) {
        match self.index.get(id) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(id.to_string(), self.counts.len());
                self.counts.push((id.to_string(), 1));
            }
        }
    }

    fn get(&self, id: &str) -> u32 {
        self.index.get(id).map_or(0, |&i| self.counts[i].1)
    }

    fn max(&self) -> u32 {
        self.counts.iter().map(|(_, c)| *c).max().unwrap_or(0)
    }
}

/// A co-occurring track and its raw count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoNeighbor {
    pub id: String,
    pub count: u32,
}

#[derive(Debug, Default, Clone)]
pub struct CoOccurrenceModel {
    matrix: HashMap<String, CoRow>,
}

impl CoOccurrenceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor: a fresh model built from `sessions`.
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut model = Self::new();
        model.build_co_matrix(sessions);
        model
    }

    /// Rebuild the whole matrix from scratch.
    pub fn build_co_matrix(&mut self, sessions: &[Session]) {
        self.matrix.clear();

        for session in sessions {
            let tracks = &session.tracks;
            for (i, track_a) in tracks.iter().enumerate() {
                let row = self.matrix.entry(track_a.clone()).or_default();
                for (j, track_b) in tracks.iter().enumerate() {
                    if i != j {
                        row.bump(track_b);
                    }
                }
            }
        }

        info!("Co-occurrence matrix built with {} tracks", self.matrix.len());
    }

    /// Raw count for the ordered pair.
    #[must_use]
    pub fn count(&self, a: &str, b: &str) -> u32 {
        self.matrix.get(a).map_or(0, |row| row.get(b))
    }

    /// Number of source tracks with a row in the matrix.
    pub fn tracked_len(&self) -> usize {
        self.matrix.len()
    }

    /// Top co-occurring tracks by raw count; ties keep first-seen order.
    pub fn get_co_similar(&self, track_id: &str, top_n: usize) -> Vec<CoNeighbor> {
        let Some(row) = self.matrix.get(track_id) else {
            return Vec::new();
        };

        let mut neighbors: Vec<CoNeighbor> = row
            .counts
            .iter()
            .map(|(id, count)| CoNeighbor {
                id: id.clone(),
                count: *count,
            })
            .collect();
        neighbors.sort_by(|a, b| b.count.cmp(&a.count));
        neighbors.truncate(top_n);
        neighbors
    }

    /// `matrix[a][b] / max(matrix[a][*])`, or 0 when either is missing.
    #[must_use]
    pub fn compute_cooccurrence_score(&self, a: &str, b: &str) -> f64 {
        let Some(row) = self.matrix.get(a) else {
            return 0.0;
        };
        match (row.get(b), row.max()) {
            (0, _) | (_, 0) => 0.0,
            (count, max) => f64::from(count) / f64::from(max),
        }
    }
}
