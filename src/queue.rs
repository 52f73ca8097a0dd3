//! Self-filling playback queue.
//!
//! [`AutoQueueManager`] owns one live queue and a bounded play history.
//! Whatever path a track takes into the queue, three invariants hold:
//!
//! - `0 <= queue.len() <= max_queue_size`
//! - no track id appears twice in the queue
//! - nothing among the last [`RECENT_WINDOW`] played ids is enqueued
//!
//! Refills pull embedding neighbors of a seed track, drop anything that would
//! break the invariants or scores below `similarity_threshold`, and reorder the
//! rest with [`diversify`] so near-duplicates do not play back to back.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::embedding::{EmbeddingTrainer, Neighbor};
use crate::track::{Session, Track};

/// Play history bound; oldest entries drop first.
pub const HISTORY_LIMIT: usize = 50;
/// Recently played ids that may not re-enter the queue.
pub const RECENT_WINDOW: usize = 10;
/// History entries used as seeds by smart refills.
const SMART_SEEDS: usize = 5;

/// Type-safe queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    pub min_queue_size: usize,
    pub max_queue_size: usize,
    /// Minimum embedding-neighbor score for a candidate.
    pub similarity_threshold: f64,
    /// 0 keeps pure score order, 1 applies the full similarity penalty.
    pub diversity_factor: f64,
    pub auto_refill: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_queue_size: 5,
            max_queue_size: 20,
            similarity_threshold: 0.3,
            diversity_factor: 0.2,
            auto_refill: true,
        }
    }
}

/// Signals from the player layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { track_id: String },
    Finished { track_id: String, skipped: bool },
    Rated { track_id: String, liked: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue_size: usize,
    pub history_size: usize,
    pub needs_refill: bool,
    /// Mean embedding similarity between consecutive queue entries.
    pub average_similarity: f64,
}

/// Serializable snapshot of a manager.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    pub queue: Vec<Track>,
    pub history: Vec<String>,
    #[serde(default)]
    pub config: Option<QueueConfig>,
}

/// Greedy diversity reordering.
///
/// Starts from the best-scored candidate; every next pick maximizes
/// `score * (1 - diversity_factor * similarity(candidate, last_pick))`.
/// Ties go to the earlier candidate in score order. The result is always a
/// permutation of the input.
pub fn diversify<F>(mut candidates: Vec<Neighbor>, diversity_factor: f64, similarity: F) -> Vec<Neighbor>
where
    F: Fn(&str, &str) -> f64,
{
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut remaining: VecDeque<Neighbor> = candidates.into();
    let mut ordered = Vec::with_capacity(remaining.len());

    let Some(first) = remaining.pop_front() else {
        return ordered;
    };
    ordered.push(first);

    while !remaining.is_empty() {
        let last = &ordered[ordered.len() - 1].id;
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, candidate) in remaining.iter().enumerate() {
            let adjusted = candidate.score * (1.0 - diversity_factor * similarity(&candidate.id, last));
            if adjusted > best_score {
                best = i;
                best_score = adjusted;
            }
        }
        if let Some(pick) = remaining.remove(best) {
            ordered.push(pick);
        }
    }

    ordered
}

#[derive(Debug)]
pub struct AutoQueueManager {
    config: QueueConfig,
    catalog: Arc<Catalog>,
    embeddings: Arc<EmbeddingTrainer>,
    queue: Vec<Track>,
    history: VecDeque<String>,
    /// Completed, non-skipped plays since the last `take_session`.
    session: Vec<String>,
    sessions_taken: usize,
}

impl AutoQueueManager {
    pub fn new(catalog: Arc<Catalog>, embeddings: Arc<EmbeddingTrainer>, config: QueueConfig) -> Self {
        Self {
            config,
            catalog,
            embeddings,
            queue: Vec::new(),
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            session: Vec::new(),
            sessions_taken: 0,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    #[must_use]
    pub fn needs_refill(&self) -> bool {
        self.queue.len() < self.config.min_queue_size
    }

    fn is_queued(&self, id: &str) -> bool {
        self.queue.iter().any(|t| t.id == id)
    }

    fn is_recent(&self, id: &str) -> bool {
        self.history.iter().rev().take(RECENT_WINDOW).any(|h| h == id)
    }

    fn record_played(&mut self, id: &str) {
        self.history.push_back(id.to_string());
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Pop the queue head into play history, refilling from it when the
    /// queue runs low.
    pub fn next_track(&mut self) -> Option<Track> {
        if self.queue.is_empty() {
            return None;
        }
        let track = self.queue.remove(0);
        self.record_played(&track.id);

        if self.config.auto_refill && self.needs_refill() {
            self.refill_queue(&track.id);
        }
        Some(track)
    }

    /// Append `track` unless it is already queued, recently played, or the
    /// queue is full.
    pub fn add_to_queue(&mut self, track: Track) -> bool {
        if self.queue.len() >= self.config.max_queue_size || self.is_queued(&track.id) || self.is_recent(&track.id) {
            debug!("Not queueing {}", track.id);
            return false;
        }
        self.queue.push(track);
        true
    }

    /// Returns how many tracks were accepted.
    pub fn add_multiple_to_queue<I>(&mut self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let mut added = 0;
        for track in tracks {
            if self.add_to_queue(track) {
                added += 1;
            }
        }
        added
    }

    /// Embedding neighbors of `seed_id` that could be queued right now,
    /// diversity-ordered.
    pub fn get_recommendations(&self, seed_id: &str, count: usize) -> Vec<Track> {
        let candidates: Vec<Neighbor> = self
            .embeddings
            .get_similar(seed_id, count.saturating_mul(2))
            .into_iter()
            .filter(|n| n.score >= self.config.similarity_threshold)
            .filter(|n| self.is_eligible(&n.id))
            .collect();

        let embeddings = &self.embeddings;
        let mut ordered = diversify(candidates, self.config.diversity_factor, |a, b| {
            embeddings.compute_embedding_similarity(a, b)
        });
        ordered.truncate(count);
        self.resolve(ordered)
    }

    fn is_eligible(&self, id: &str) -> bool {
        !self.is_queued(id) && !self.is_recent(id) && self.catalog.contains(id)
    }

    fn resolve(&self, neighbors: Vec<Neighbor>) -> Vec<Track> {
        neighbors
            .into_iter()
            .filter_map(|n| self.catalog.get_track(&n.id).cloned())
            .collect()
    }

    /// Fill up to `max_queue_size` from one seed.
    pub fn refill_queue(&mut self, seed_id: &str) -> usize {
        let needed = self.config.max_queue_size.saturating_sub(self.queue.len());
        if needed == 0 {
            return 0;
        }
        let tracks = self.get_recommendations(seed_id, needed);
        let added = self.add_multiple_to_queue(tracks);
        info!("Queue refilled with {added} tracks from {seed_id}");
        added
    }

    /// Candidates scored against the last few played tracks at once: each
    /// candidate's scores are summed and divided by the number of seeds.
    pub fn smart_recommendations(&self, count: usize) -> Vec<Track> {
        let seeds: Vec<&str> = self.history.iter().rev().take(SMART_SEEDS).map(String::as_str).collect();
        if seeds.is_empty() || count == 0 {
            return Vec::new();
        }

        let mut totals: Vec<Neighbor> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for seed in &seeds {
            for neighbor in self.embeddings.get_similar(seed, count.saturating_mul(2)) {
                if !self.is_eligible(&neighbor.id) {
                    continue;
                }
                match index.get(&neighbor.id) {
                    Some(&i) => totals[i].score += neighbor.score,
                    None => {
                        index.insert(neighbor.id.clone(), totals.len());
                        totals.push(neighbor);
                    }
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let seed_count = seeds.len() as f64;
        let mut averaged: Vec<Neighbor> = totals
            .into_iter()
            .map(|n| Neighbor { score: n.score / seed_count, ..n })
            .filter(|n| n.score >= self.config.similarity_threshold)
            .collect();
        averaged.sort_by(|a, b| b.score.total_cmp(&a.score));
        averaged.truncate(count);
        self.resolve(averaged)
    }

    /// Fill up to `max_queue_size` from recent history.
    pub fn smart_refill(&mut self) -> usize {
        let needed = self.config.max_queue_size.saturating_sub(self.queue.len());
        let tracks = self.smart_recommendations(needed);
        let added = self.add_multiple_to_queue(tracks);
        info!("Smart refill added {added} tracks");
        added
    }

    /// Start over from `seed_id`: empty the queue, mark the seed as played
    /// and refill from it.
    pub fn initialize_queue(&mut self, seed_id: &str) -> usize {
        self.queue.clear();
        self.record_played(seed_id);
        self.refill_queue(seed_id)
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn remove_from_queue(&mut self, track_id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|t| t.id != track_id);
        self.queue.len() != before
    }

    /// Move the entry at `from` to `to`. Out-of-range indices do nothing.
    pub fn reorder_queue(&mut self, from: usize, to: usize) -> bool {
        if from >= self.queue.len() || to >= self.queue.len() {
            return false;
        }
        let track = self.queue.remove(from);
        self.queue.insert(to, track);
        true
    }

    pub fn stats(&self) -> QueueStats {
        let similarities: Vec<f64> = self
            .queue
            .windows(2)
            .map(|pair| self.embeddings.compute_embedding_similarity(&pair[0].id, &pair[1].id))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let average_similarity = if similarities.is_empty() {
            0.0
        } else {
            similarities.iter().sum::<f64>() / similarities.len() as f64
        };

        QueueStats {
            queue_size: self.queue.len(),
            history_size: self.history.len(),
            needs_refill: self.needs_refill(),
            average_similarity,
        }
    }

    pub fn export_state(&self) -> QueueState {
        QueueState {
            queue: self.queue.clone(),
            history: self.history.iter().cloned().collect(),
            config: Some(self.config.clone()),
        }
    }

    /// Replace queue and history with `state`, re-applying every queue
    /// invariant. Returns the number of queued tracks kept.
    pub fn import_state(&mut self, state: QueueState) -> usize {
        if let Some(config) = state.config {
            self.config = config;
        }
        self.history.clear();
        let skip = state.history.len().saturating_sub(HISTORY_LIMIT);
        for id in state.history.into_iter().skip(skip) {
            self.record_played(&id);
        }
        self.queue.clear();
        self.add_multiple_to_queue(state.queue)
    }

    /// Apply a playback event. Returns how many tracks were added to the
    /// queue as a consequence.
    pub fn handle_event(&mut self, event: PlaybackEvent) -> usize {
        match event {
            PlaybackEvent::Started { track_id } => {
                self.record_played(&track_id);
                self.remove_from_queue(&track_id);
                if self.queue.is_empty() || (self.config.auto_refill && self.needs_refill()) {
                    self.refill_queue(&track_id)
                } else {
                    0
                }
            }
            PlaybackEvent::Finished { track_id, skipped } => {
                if !skipped {
                    self.session.push(track_id);
                }
                0
            }
            PlaybackEvent::Rated { track_id, liked: false } => {
                self.remove_from_queue(&track_id);
                0
            }
            PlaybackEvent::Rated { track_id, liked: true } => {
                if self.needs_refill() {
                    self.refill_queue(&track_id)
                } else {
                    0
                }
            }
        }
    }

    /// Hand over the listening session accumulated from `Finished` events.
    pub fn take_session(&mut self, user_id: &str) -> Option<Session> {
        if self.session.is_empty() {
            return None;
        }
        self.sessions_taken += 1;
        let session_id = format!("{user_id}-{}", self.sessions_taken);
        Some(Session::new(user_id, session_id, std::mem::take(&mut self.session)))
    }
}
