//! Weighted fusion of collaborative and content signals.
//!
//! Every candidate gets seven raw signals, each in `[0, 1]` except the
//! embedding cosine which may dip below zero:
//!
//! ```text
//! score = 0.35 * embedding + 0.25 * cooccurrence + 0.10 * genre
//!       + 0.05 * artist + 0.10 * audio + 0.05 * tags + 0.10 * popularity
//! ```
//!
//! The raw values travel with the result as a [`SignalBreakdown`] so callers
//! can explain a recommendation.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::cooccurrence::CoOccurrenceModel;
use crate::embedding::EmbeddingTrainer;
use crate::features;
use crate::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalWeights {
    pub embedding: f64,
    pub cooccurrence: f64,
    pub genre: f64,
    pub artist: f64,
    pub audio_features: f64,
    pub tags: f64,
    pub popularity: f64,
}

/// Fixed fusion weights. They sum to 1.
pub const WEIGHTS: SignalWeights = SignalWeights {
    embedding: 0.35,
    cooccurrence: 0.25,
    genre: 0.10,
    artist: 0.05,
    audio_features: 0.10,
    tags: 0.05,
    popularity: 0.10,
};

impl SignalWeights {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.embedding
            + self.cooccurrence
            + self.genre
            + self.artist
            + self.audio_features
            + self.tags
            + self.popularity
    }
}

/// Raw, unweighted signal values for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBreakdown {
    pub embedding: f64,
    pub cooccurrence: f64,
    pub genre: f64,
    pub artist: f64,
    pub audio_features: f64,
    pub tags: f64,
    pub popularity: f64,
}

impl SignalBreakdown {
    #[must_use]
    pub fn weighted(&self, w: &SignalWeights) -> f64 {
        self.embedding * w.embedding
            + self.cooccurrence * w.cooccurrence
            + self.genre * w.genre
            + self.artist * w.artist
            + self.audio_features * w.audio_features
            + self.tags * w.tags
            + self.popularity * w.popularity
    }

    /// Only the popularity signal populated.
    #[must_use]
    pub fn popularity_only(track: &Track) -> Self {
        Self {
            popularity: track.popularity_score(),
            ..Self::default()
        }
    }
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Embedding,
    Cooccurrence,
    Genre,
    Artist,
    Popular,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn new(id: impl Into<String>, source: CandidateSource) -> Self {
        Self { id: id.into(), source }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub source: CandidateSource,
    pub score: f64,
    pub breakdown: SignalBreakdown,
}

impl ScoredCandidate {
    fn new(track: &Track, source: CandidateSource, breakdown: SignalBreakdown, score: f64) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            genre: track.genre.clone(),
            source,
            score,
            breakdown,
        }
    }

    /// Popularity-only entry, as used by the non-personalized fallback.
    #[must_use]
    pub fn popular(track: &Track) -> Self {
        let breakdown = SignalBreakdown::popularity_only(track);
        Self::new(track, CandidateSource::Popular, breakdown, breakdown.popularity)
    }
}

/// Borrowing view over the three models; cheap to build per request.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker<'a> {
    catalog: &'a Catalog,
    embeddings: &'a EmbeddingTrainer,
    cooccurrence: &'a CoOccurrenceModel,
}

impl<'a> SimilarityRanker<'a> {
    pub fn new(catalog: &'a Catalog, embeddings: &'a EmbeddingTrainer, cooccurrence: &'a CoOccurrenceModel) -> Self {
        Self {
            catalog,
            embeddings,
            cooccurrence,
        }
    }

    /// The fixed weight table.
    #[must_use]
    pub fn weights() -> &'static SignalWeights {
        &WEIGHTS
    }

    /// All seven signals between two catalog tracks.
    #[must_use]
    pub fn signals(&self, seed: &Track, candidate: &Track) -> SignalBreakdown {
        SignalBreakdown {
            embedding: self.embeddings.compute_embedding_similarity(&seed.id, &candidate.id),
            cooccurrence: self.cooccurrence.compute_cooccurrence_score(&seed.id, &candidate.id),
            genre: features::genre_match(seed, candidate),
            artist: features::artist_match(seed, candidate),
            audio_features: features::audio_similarity(&seed.audio, &candidate.audio),
            tags: features::tag_jaccard(&seed.tags, &candidate.tags),
            popularity: candidate.popularity_score(),
        }
    }

    /// Score `candidates` against `seed_id` and return the best `top_n`,
    /// highest first. The seed itself and ids missing from the catalog are
    /// dropped; an unknown seed yields nothing.
    pub fn rank_candidates(&self, seed_id: &str, candidates: &[Candidate], top_n: usize) -> Vec<ScoredCandidate> {
        let Some(seed) = self.catalog.get_track(seed_id) else {
            return Vec::new();
        };

        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .filter(|c| c.id != seed_id)
            .filter_map(|c| self.catalog.get_track(&c.id).map(|track| (c, track)))
            .map(|(c, track)| {
                let breakdown = self.signals(seed, track);
                ScoredCandidate::new(track, c.source, breakdown, breakdown.weighted(&WEIGHTS))
            })
            .collect();

        // stable: equal scores keep candidate order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_n);
        scored
    }
}
