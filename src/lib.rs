//! Learned music recommendations and a self-filling playback queue.
//!
//! Core modules:
//! - [`catalog`] - In-memory track store
//! - [`cooccurrence`] - Play-together counts from listening sessions
//! - [`embedding`] - Track vectors trained on session windows
//! - [`ranker`] - Weighted fusion of collaborative and content signals
//! - [`recommend`] - Candidate gathering for a seed track
//! - [`queue`] - Auto-refilling, diversity-aware playback queue
//!
//! ### Supporting Modules
//!
//! - [`persistence`] - Key/value storage backends for trained state
//! - [`server`] - HTTP API
//! - [`config`] - Data directory and runtime configuration
//! - [`cli`] / [`completion`] - Command-line interface
//!
//! ## Quick Start Example
//!
//! ```
//! use std::sync::Arc;
//! use muse_radio::catalog::Catalog;
//! use muse_radio::cooccurrence::CoOccurrenceModel;
//! use muse_radio::embedding::{EmbeddingTrainer, TrainingConfig};
//! use muse_radio::queue::{AutoQueueManager, QueueConfig};
//! use muse_radio::recommend::RecommendationEngine;
//! use muse_radio::track::{AudioFeatures, Session, Track};
//!
//! # async fn demo() -> Result<(), muse_radio::error::RecommendError> {
//! let tracks: Vec<Track> = (0..4)
//!     .map(|i| Track {
//!         id: format!("t{i}"),
//!         title: format!("Song {i}"),
//!         artist: "Band".into(),
//!         artist_id: "band".into(),
//!         genre: "rock".into(),
//!         tags: Default::default(),
//!         audio: AudioFeatures { tempo: 120.0, energy: 0.5, danceability: 0.5 },
//!         popularity: 50,
//!     })
//!     .collect();
//! let sessions = vec![Session::anonymous(["t0", "t1", "t2"]), Session::anonymous(["t1", "t3"])];
//!
//! let catalog = Arc::new(Catalog::from_tracks(tracks));
//! let embeddings = Arc::new(EmbeddingTrainer::new());
//! embeddings.train_embeddings(&sessions, TrainingConfig::default()).await?;
//!
//! let engine = RecommendationEngine::new(
//!     Arc::clone(&catalog),
//!     CoOccurrenceModel::from_sessions(&sessions),
//!     Arc::clone(&embeddings),
//! );
//! let recs = engine.recommend_for_track("t0", 3)?;
//! assert!(recs.recommendations.len() <= 3);
//!
//! let mut queue = AutoQueueManager::new(catalog, embeddings, QueueConfig::default());
//! queue.initialize_queue("t0");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Library operations that can fail return [`error::RecommendError`]. Lookups
//! that may legitimately miss return `Option` or an empty collection, and
//! queue mutations never fail. Application-level code (configuration, file
//! loading, the binary) uses `anyhow`.
//!
//! ## Logging
//!
//! Everything logs through the `log` facade; the binary installs
//! `env_logger`, so `RUST_LOG=muse_radio=debug` shows per-request detail.

pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod cooccurrence;
pub mod embedding;
pub mod error;
pub mod features;
pub mod persistence;
pub mod queue;
pub mod ranker;
pub mod recommend;
pub mod server;
pub mod track;
pub mod vector;
