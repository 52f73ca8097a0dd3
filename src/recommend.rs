//! Candidate gathering and ranking for a seed track.
//!
//! [`RecommendationEngine`] is built once by the host application and handed
//! out by reference (or `Arc`) to the server, the CLI and queue managers.

use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::cooccurrence::CoOccurrenceModel;
use crate::embedding::{EmbeddingTrainer, Neighbor};
use crate::error::RecommendError;
use crate::ranker::{Candidate, CandidateSource, ScoredCandidate, SimilarityRanker};
use crate::track::{Session, TrackSummary};

/// Per-source caps on gathered candidates.
const EMBEDDING_CANDIDATES: usize = 10;
const COOCCURRENCE_CANDIDATES: usize = 10;
const GENRE_CANDIDATES: usize = 10;
const ARTIST_CANDIDATES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecommendations {
    pub track_id: String,
    pub track: TrackSummary,
    pub recommendations: Vec<ScoredCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecommendations {
    pub user_id: String,
    pub recommendations: Vec<ScoredCandidate>,
}

#[derive(Debug)]
pub struct RecommendationEngine {
    catalog: Arc<Catalog>,
    cooccurrence: CoOccurrenceModel,
    embeddings: Arc<EmbeddingTrainer>,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<Catalog>, cooccurrence: CoOccurrenceModel, embeddings: Arc<EmbeddingTrainer>) -> Self {
        Self {
            catalog,
            cooccurrence,
            embeddings,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingTrainer> {
        &self.embeddings
    }

    pub fn cooccurrence(&self) -> &CoOccurrenceModel {
        &self.cooccurrence
    }

    pub fn rebuild_cooccurrence(&mut self, sessions: &[Session]) {
        self.cooccurrence.build_co_matrix(sessions);
    }

    /// Raw embedding neighbors of `track_id`.
    pub fn similar_tracks(&self, track_id: &str, limit: usize) -> Vec<Neighbor> {
        self.embeddings.get_similar(track_id, limit)
    }

    /// Ranked recommendations seeded by one catalog track.
    ///
    /// # Errors
    ///
    /// `NotFound` if `seed_id` is not in the catalog.
    pub fn recommend_for_track(&self, seed_id: &str, top_n: usize) -> Result<TrackRecommendations, RecommendError> {
        let seed = self
            .catalog
            .get_track(seed_id)
            .ok_or_else(|| RecommendError::track_not_found(seed_id))?;

        let candidates = self.gather_candidates(seed_id);
        debug!("Gathered {} candidates for {seed_id}", candidates.len());

        let ranker = SimilarityRanker::new(&self.catalog, &self.embeddings, &self.cooccurrence);
        let recommendations = ranker.rank_candidates(seed_id, &candidates, top_n);

        Ok(TrackRecommendations {
            track_id: seed_id.to_string(),
            track: seed.summary(),
            recommendations,
        })
    }

    /// Non-personalized baseline: the most popular catalog tracks.
    pub fn recommend_for_user(&self, user_id: &str, top_n: usize) -> UserRecommendations {
        info!("Popularity fallback for user {user_id}");
        UserRecommendations {
            user_id: user_id.to_string(),
            recommendations: self
                .catalog
                .get_popular_tracks(top_n)
                .into_iter()
                .map(ScoredCandidate::popular)
                .collect(),
        }
    }

    /// Union of embedding, co-occurrence, genre and artist neighbors, first
    /// source wins on duplicates. The seed is never a candidate.
    fn gather_candidates(&self, seed_id: &str) -> Vec<Candidate> {
        let mut seen: HashSet<String> = HashSet::from([seed_id.to_string()]);
        let mut candidates = Vec::new();
        let mut push = |id: &str, source: CandidateSource| {
            if seen.insert(id.to_string()) {
                candidates.push(Candidate::new(id, source));
            }
        };

        for neighbor in self.embeddings.get_similar(seed_id, EMBEDDING_CANDIDATES) {
            push(&neighbor.id, CandidateSource::Embedding);
        }
        for neighbor in self.cooccurrence.get_co_similar(seed_id, COOCCURRENCE_CANDIDATES) {
            push(&neighbor.id, CandidateSource::Cooccurrence);
        }
        if let Some(seed) = self.catalog.get_track(seed_id) {
            for track in self.catalog.get_tracks_by_genre(&seed.genre, GENRE_CANDIDATES) {
                push(&track.id, CandidateSource::Genre);
            }
            for track in self.catalog.get_tracks_by_artist(&seed.artist, ARTIST_CANDIDATES) {
                push(&track.id, CandidateSource::Artist);
            }
        }

        candidates
    }
}
