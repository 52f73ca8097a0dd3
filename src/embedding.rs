//! Track embeddings learned from listening sessions.
//!
//! Every track seen in a training session gets one vector of
//! `embedding_dim` floats. Training walks a skip-gram window over each
//! session and pulls the target vector toward each context vector:
//!
//! ```text
//! target[k] += learning_rate * (context[k] - target[k])
//! ```
//!
//! There is no repulsive term, so long training runs drift every connected
//! group of tracks toward a shared centroid. The loss `1 - cos(target, context)`
//! is diagnostic only.
//!
//! Training is cooperative: with mobile optimization enabled it hands control
//! back to the executor every few batches and keeps vectors at unit length.
//! A second training call while one is running fails immediately with
//! [`RecommendError::ConcurrencyConflict`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::RecommendError;
use crate::persistence::PersistenceAdapter;
use crate::track::Session;
use crate::vector;

/// Storage key used with a [`PersistenceAdapter`].
pub const EMBEDDINGS_KEY: &str = "muse-radio:embeddings";

/// Batches between cooperative yields in mobile mode.
const YIELD_EVERY_BATCHES: usize = 5;
/// Epochs between re-normalization passes in mobile mode.
const RENORMALIZE_EVERY_EPOCHS: usize = 10;
const LOG_EVERY_EPOCHS: usize = 10;
/// Decimal places kept by [`EmbeddingTrainer::export_embeddings`].
const EXPORT_DECIMALS: i32 = 3;
/// Odd 64-bit constant (golden ratio) spreading store sizes across seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainingConfig {
    pub embedding_dim: usize,
    pub learning_rate: f32,
    pub epochs: usize,
    pub window_size: usize,
    pub batch_size: usize,
    pub use_mobile_optimization: bool,
    /// Fixed seed for vector initialization; entropy when absent.
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// Profile for unconstrained hosts.
    #[must_use]
    pub fn desktop() -> Self {
        Self {
            embedding_dim: 16,
            learning_rate: 0.01,
            epochs: 50,
            window_size: 2,
            batch_size: 100,
            use_mobile_optimization: false,
            seed: None,
        }
    }

    /// Smaller vectors, fewer epochs, cooperative yielding and
    /// re-normalization.
    #[must_use]
    pub fn mobile() -> Self {
        Self {
            embedding_dim: 12,
            learning_rate: 0.015,
            epochs: 30,
            window_size: 2,
            batch_size: 50,
            use_mobile_optimization: true,
            seed: None,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        if cfg!(any(target_os = "android", target_os = "ios")) {
            Self::mobile()
        } else {
            Self::desktop()
        }
    }
}

/// Reported after every epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingProgress {
    pub epoch: usize,
    pub total_epochs: usize,
    pub loss: f64,
    /// 0-1
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub tracks: usize,
    pub pairs: usize,
    pub epochs: usize,
    pub epoch_losses: Vec<f64>,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// A track id with a similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub score: f64,
}

/// Vectors kept in insertion order so neighbor ties rank deterministically.
#[derive(Debug, Default, Clone)]
struct EmbeddingStore {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingStore {
    fn get(&self, id: &str) -> Option<&[f32]> {
        self.index.get(id).map(|&i| self.vectors[i].as_slice())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    fn insert(&mut self, id: &str, vec: Vec<f32>) {
        match self.index.get(id) {
            Some(&i) => self.vectors[i] = vec,
            None => {
                self.index.insert(id.to_string(), self.ids.len());
                self.ids.push(id.to_string());
                self.vectors.push(vec);
            }
        }
    }

    fn dimension(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }

    fn normalize_all(&mut self) {
        for vec in &mut self.vectors {
            vector::normalize(vec);
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Serialize, Deserialize)]
struct ExportPayload {
    embeddings: Vec<(String, Vec<f32>)>,
    config: TrainingConfig,
}

/// Clears the training flag when a run ends, however it ends.
struct TrainingGuard<'a>(&'a AtomicBool);

impl<'a> TrainingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, RecommendError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RecommendError::ConcurrencyConflict)?;
        Ok(Self(flag))
    }
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the embedding store and the training state machine
/// (`idle -> training -> idle`).
#[derive(Debug, Default)]
pub struct EmbeddingTrainer {
    store: RwLock<EmbeddingStore>,
    config: RwLock<TrainingConfig>,
    training: AtomicBool,
}

impl EmbeddingTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrainingConfig) -> Self {
        Self {
            config: RwLock::new(config),
            ..Self::default()
        }
    }

    fn read_store(&self) -> RwLockReadGuard<'_, EmbeddingStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, EmbeddingStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, TrainingConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configuration of the most recent training run or import.
    pub fn config(&self) -> TrainingConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn dimension(&self) -> usize {
        self.read_store()
            .dimension()
            .unwrap_or_else(|| self.config().embedding_dim)
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.read_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_store().index.contains_key(id)
    }

    pub fn vector(&self, id: &str) -> Option<Vec<f32>> {
        self.read_store().get(id).map(<[f32]>::to_vec)
    }

    /// Approximate heap used by vector payloads.
    pub fn memory_usage_bytes(&self) -> usize {
        let store = self.read_store();
        store.vectors.iter().map(|v| v.len() * std::mem::size_of::<f32>()).sum()
    }

    /// Place a known vector for `id`, replacing any existing one.
    ///
    /// The first vector in an empty store fixes the dimension.
    ///
    /// # Errors
    ///
    /// `MalformedImport` when the vector is empty or its length differs from
    /// the stored dimension.
    pub fn insert_vector(&self, id: &str, vec: Vec<f32>) -> Result<(), RecommendError> {
        let mut store = self.write_store();
        match store.dimension() {
            _ if vec.is_empty() => {
                return Err(RecommendError::MalformedImport(format!("empty vector for {id}")));
            }
            Some(dim) if dim != vec.len() => {
                return Err(RecommendError::MalformedImport(format!(
                    "vector for {id} has dimension {}, expected {dim}",
                    vec.len()
                )));
            }
            Some(_) => {}
            None => self.write_config().embedding_dim = vec.len(),
        }
        store.insert(id, vec);
        Ok(())
    }

    /// Drop every vector.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` while a training run is active.
    pub fn clear(&self) -> Result<(), RecommendError> {
        if self.is_training() {
            return Err(RecommendError::ConcurrencyConflict);
        }
        *self.write_store() = EmbeddingStore::default();
        info!("Embeddings cleared");
        Ok(())
    }

    /// Full training pass over `sessions`.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` if another training run is in progress.
    pub async fn train_embeddings(
        &self,
        sessions: &[Session],
        config: TrainingConfig,
    ) -> Result<TrainingReport, RecommendError> {
        self.train_embeddings_with_progress(sessions, config, |_| {}).await
    }

    /// [`train_embeddings`](Self::train_embeddings) with a per-epoch callback.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` if another training run is in progress.
    pub async fn train_embeddings_with_progress<F>(
        &self,
        sessions: &[Session],
        config: TrainingConfig,
        on_progress: F,
    ) -> Result<TrainingReport, RecommendError>
    where
        F: FnMut(TrainingProgress),
    {
        let _guard = TrainingGuard::acquire(&self.training)?;
        Ok(self.run_training(sessions, config, on_progress).await)
    }

    /// Incremental learning: vectors for unseen tracks are created, then
    /// the current configuration runs for `iterations` epochs over
    /// `new_sessions` only.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` if another training run is in progress.
    pub async fn update_embeddings(
        &self,
        new_sessions: &[Session],
        iterations: usize,
    ) -> Result<TrainingReport, RecommendError> {
        let _guard = TrainingGuard::acquire(&self.training)?;
        let config = TrainingConfig {
            epochs: iterations,
            ..self.config()
        };
        Ok(self.run_training(new_sessions, config, |_| {}).await)
    }

    async fn run_training<F>(&self, sessions: &[Session], config: TrainingConfig, mut on_progress: F) -> TrainingReport
    where
        F: FnMut(TrainingProgress),
    {
        let track_ids = distinct_track_ids(sessions);
        let mode = if config.use_mobile_optimization { "mobile" } else { "desktop" };
        info!("Training embeddings for {} tracks ({mode} mode)...", track_ids.len());

        let pairs = {
            let mut store = self.write_store();
            self.initialize_vectors(&mut store, &track_ids, &config);
            build_training_pairs(sessions, config.window_size, &store)
        };
        *self.write_config() = config.clone();

        let batch_size = config.batch_size.max(1);
        let mobile = config.use_mobile_optimization;
        let mut epoch_losses = Vec::with_capacity(config.epochs);

        for epoch in 0..config.epochs {
            let mut total_loss = 0.0;

            for (batch_index, batch) in pairs.chunks(batch_size).enumerate() {
                {
                    let mut store = self.write_store();
                    for &(target, context) in batch {
                        let similarity =
                            vector::pull_toward(&mut store.vectors, target, context, config.learning_rate);
                        total_loss += 1.0 - similarity;
                    }
                }

                if mobile && batch_index % YIELD_EVERY_BATCHES == 0 {
                    tokio::task::yield_now().await;
                }
            }

            if mobile && epoch % RENORMALIZE_EVERY_EPOCHS == 0 {
                self.write_store().normalize_all();
            }

            #[allow(clippy::cast_precision_loss)]
            let avg_loss = if pairs.is_empty() { 0.0 } else { total_loss / pairs.len() as f64 };
            if epoch % LOG_EVERY_EPOCHS == 0 {
                info!("  Epoch {epoch}/{}, Loss: {avg_loss:.4}", config.epochs);
            } else {
                debug!("  Epoch {epoch}/{}, Loss: {avg_loss:.4}", config.epochs);
            }
            epoch_losses.push(avg_loss);

            #[allow(clippy::cast_precision_loss)]
            let progress = (epoch + 1) as f64 / config.epochs as f64;
            on_progress(TrainingProgress {
                epoch,
                total_epochs: config.epochs,
                loss: avg_loss,
                progress,
            });
        }

        if mobile {
            self.write_store().normalize_all();
        }

        info!("Embeddings trained");
        TrainingReport {
            tracks: track_ids.len(),
            pairs: pairs.len(),
            epochs: config.epochs,
            epoch_losses,
        }
    }

    fn initialize_vectors(&self, store: &mut EmbeddingStore, track_ids: &[&str], config: &TrainingConfig) {
        let dim = config.embedding_dim.max(1);
        if let Some(existing) = store.dimension() {
            if existing != dim {
                warn!("Embedding dimension changed from {existing} to {dim}, discarding previous vectors");
                *store = EmbeddingStore::default();
            }
        }

        // An incremental run continues the stream instead of replaying the
        // draws that produced the vectors already in the store.
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ (store.len() as u64).wrapping_mul(SEED_STRIDE)),
            None => StdRng::from_entropy(),
        };
        #[allow(clippy::cast_precision_loss)]
        let scale = (2.0 / dim as f32).sqrt();

        let mut added = 0;
        for id in track_ids {
            if store.position(id).is_none() {
                let vec = (0..dim).map(|_| (rng.gen::<f32>() - 0.5) * scale).collect();
                store.insert(id, vec);
                added += 1;
            }
        }
        if added > 0 {
            debug!("Initialized {added} new track vectors");
        }
    }

    /// Tracks closest to `track_id` by cosine similarity, self excluded.
    /// Unknown tracks have no neighbors.
    pub fn get_similar(&self, track_id: &str, top_n: usize) -> Vec<Neighbor> {
        let store = self.read_store();
        let Some(target) = store.get(track_id) else {
            return Vec::new();
        };

        let mut neighbors: Vec<Neighbor> = store
            .ids
            .iter()
            .zip(&store.vectors)
            .filter(|(id, _)| id.as_str() != track_id)
            .map(|(id, vec)| Neighbor {
                id: id.clone(),
                score: vector::cosine_similarity(target, vec),
            })
            .collect();
        neighbors.sort_by(|a, b| b.score.total_cmp(&a.score));
        neighbors.truncate(top_n);
        neighbors
    }

    /// Cosine similarity of two tracks, 0 if either has no vector.
    #[must_use]
    pub fn compute_embedding_similarity(&self, a: &str, b: &str) -> f64 {
        let store = self.read_store();
        match (store.get(a), store.get(b)) {
            (Some(va), Some(vb)) => vector::cosine_similarity(va, vb),
            _ => 0.0,
        }
    }

    /// Similarity of `track_id` to each candidate, in candidate order.
    pub fn batch_similarity<S: AsRef<str>>(&self, track_id: &str, candidates: &[S]) -> Vec<Neighbor> {
        let store = self.read_store();
        let target = store.get(track_id);
        candidates
            .iter()
            .map(|candidate| {
                let id = candidate.as_ref();
                let score = match (target, store.get(id)) {
                    (Some(t), Some(c)) => vector::cosine_similarity(t, c),
                    _ => 0.0,
                };
                Neighbor { id: id.to_string(), score }
            })
            .collect()
    }

    /// Serialize to a compact opaque string: base64 of JSON with every
    /// component rounded to three decimals.
    ///
    /// # Errors
    ///
    /// `PersistenceFailure` if serialization fails.
    pub fn export_embeddings(&self) -> Result<String, RecommendError> {
        let payload = {
            let store = self.read_store();
            ExportPayload {
                embeddings: store
                    .ids
                    .iter()
                    .zip(&store.vectors)
                    .map(|(id, vec)| (id.clone(), vector::round_components(vec, EXPORT_DECIMALS)))
                    .collect(),
                config: self.config(),
            }
        };
        let json = serde_json::to_string(&payload)
            .map_err(|e| RecommendError::PersistenceFailure(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Replace the store with a previously exported one, returning the number
    /// of vectors loaded. On error the current store is left untouched.
    ///
    /// # Errors
    ///
    /// `MalformedImport` for undecodable or inconsistent data,
    /// `ConcurrencyConflict` while training.
    pub fn import_embeddings(&self, data: &str) -> Result<usize, RecommendError> {
        if self.is_training() {
            return Err(RecommendError::ConcurrencyConflict);
        }

        let payload = decode_payload(data)?;
        let mut store = EmbeddingStore::default();
        let mut config = payload.config;
        let dim = payload.embeddings.first().map_or(config.embedding_dim, |(_, v)| v.len());

        for (id, vec) in payload.embeddings {
            if vec.len() != dim || dim == 0 {
                return Err(RecommendError::MalformedImport(format!(
                    "vector for {id} has dimension {}, expected {dim}",
                    vec.len()
                )));
            }
            if vec.iter().any(|v| !v.is_finite()) {
                return Err(RecommendError::MalformedImport(format!("non-finite component in {id}")));
            }
            if store.position(&id).is_some() {
                return Err(RecommendError::MalformedImport(format!("duplicate track id {id}")));
            }
            store.insert(&id, vec);
        }

        config.embedding_dim = dim;
        let count = store.len();
        *self.write_store() = store;
        *self.write_config() = config;
        info!("Loaded {count} track embeddings");
        Ok(count)
    }

    /// Export and hand the result to `adapter`. Failures are logged and
    /// reported as `false`.
    pub async fn save_to(&self, adapter: &dyn PersistenceAdapter) -> bool {
        let data = match self.export_embeddings() {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to export embeddings: {e}");
                return false;
            }
        };
        match adapter.save(EMBEDDINGS_KEY, &data).await {
            Ok(()) => {
                info!("Embeddings saved to {}", adapter.name());
                true
            }
            Err(e) => {
                warn!("Failed to save embeddings to {}: {e}", adapter.name());
                false
            }
        }
    }

    /// Restore from `adapter`. Missing, unreadable or corrupt data all count
    /// as "no prior state" and leave the store unchanged.
    pub async fn load_from(&self, adapter: &dyn PersistenceAdapter) -> bool {
        match adapter.load(EMBEDDINGS_KEY).await {
            Ok(Some(data)) => match self.import_embeddings(&data) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Ignoring stored embeddings from {}: {e}", adapter.name());
                    false
                }
            },
            Ok(None) => {
                debug!("No stored embeddings in {}", adapter.name());
                false
            }
            Err(e) => {
                warn!("Failed to load embeddings from {}: {e}", adapter.name());
                false
            }
        }
    }
}

fn decode_payload(data: &str) -> Result<ExportPayload, RecommendError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| RecommendError::MalformedImport(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| RecommendError::MalformedImport(format!("invalid payload: {e}")))
}

/// Distinct track ids in first-seen order.
fn distinct_track_ids(sessions: &[Session]) -> Vec<&str> {
    let mut seen = HashSet::new();
    sessions
        .iter()
        .flat_map(|s| s.tracks.iter())
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// `(target, context)` store positions for every position pair within
/// `window` of each other in a session.
fn build_training_pairs(sessions: &[Session], window: usize, store: &EmbeddingStore) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for session in sessions {
        let positions: Vec<Option<usize>> = session.tracks.iter().map(|id| store.position(id)).collect();
        for (i, target) in positions.iter().enumerate() {
            let Some(target) = *target else { continue };
            let start = i.saturating_sub(window);
            let end = (i + window).min(positions.len().saturating_sub(1));
            for (j, context) in positions.iter().enumerate().take(end + 1).skip(start) {
                match context {
                    Some(context) if i != j => pairs.push((target, *context)),
                    _ => {}
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sessions_of(groups: &[&[&str]], repeat: usize) -> Vec<Session> {
        (0..repeat)
            .flat_map(|_| groups.iter().map(|g| Session::anonymous(g.iter().copied())))
            .collect()
    }

    fn seeded(config: TrainingConfig) -> TrainingConfig {
        TrainingConfig { seed: Some(42), ..config }
    }

    #[test]
    fn test_training_pairs_respect_window() {
        let mut store = EmbeddingStore::default();
        for id in ["a", "b", "c", "d"] {
            store.insert(id, vec![0.0]);
        }
        let pairs = build_training_pairs(&[Session::anonymous(["a", "b", "c", "d"])], 1, &store);
        assert_eq!(pairs, vec![(0, 1), (1, 0), (1, 2), (2, 1), (2, 3), (3, 2)]);

        let wide = build_training_pairs(&[Session::anonymous(["a", "b", "c"])], 2, &store);
        assert_eq!(wide.len(), 6);
    }

    #[tokio::test]
    async fn test_training_creates_one_vector_per_track() {
        let trainer = EmbeddingTrainer::new();
        let sessions = sessions_of(&[&["a", "b", "c"], &["c", "d"]], 2);
        let config = seeded(TrainingConfig { embedding_dim: 8, epochs: 3, ..TrainingConfig::desktop() });

        let report = trainer.train_embeddings(&sessions, config).await.unwrap();

        assert_eq!(report.tracks, 4);
        assert_eq!(report.epoch_losses.len(), 3);
        assert_eq!(trainer.len(), 4);
        for id in ["a", "b", "c", "d"] {
            assert_eq!(trainer.vector(id).map(|v| v.len()), Some(8));
        }
        assert!(!trainer.is_training());
    }

    #[tokio::test]
    async fn test_adjacent_tracks_end_up_closer_than_strangers() {
        let trainer = EmbeddingTrainer::new();
        let sessions = sessions_of(&[&["A", "B", "C"], &["B", "A"], &["X", "Y", "Z"], &["Y", "X"]], 10);
        let config = seeded(TrainingConfig { learning_rate: 0.025, ..TrainingConfig::desktop() });

        trainer.train_embeddings(&sessions, config).await.unwrap();

        let ab = trainer.compute_embedding_similarity("A", "B");
        let ax = trainer.compute_embedding_similarity("A", "X");
        assert!(ab > ax, "sim(A,B)={ab} should exceed sim(A,X)={ax}");
        assert!(ab > 0.99);
    }

    #[tokio::test]
    async fn test_second_training_call_is_rejected_while_first_runs() {
        let trainer = EmbeddingTrainer::new();
        let sessions = sessions_of(&[&["a", "b", "c", "d", "e"]], 20);
        let config = seeded(TrainingConfig { epochs: 3, ..TrainingConfig::mobile() });

        let (first, second) = tokio::join!(
            trainer.train_embeddings(&sessions, config.clone()),
            trainer.train_embeddings(&sessions, config.clone()),
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(RecommendError::ConcurrencyConflict)));
        assert!(!trainer.is_training());
        assert!(trainer.train_embeddings(&sessions, config).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_rejected_during_training() {
        let trainer = EmbeddingTrainer::new();
        let sessions = sessions_of(&[&["a", "b", "c"]], 10);
        let config = seeded(TrainingConfig { epochs: 2, ..TrainingConfig::mobile() });

        let (first, update) = tokio::join!(
            trainer.train_embeddings(&sessions, config),
            trainer.update_embeddings(&sessions, 1),
        );

        assert!(first.is_ok());
        assert!(matches!(update, Err(RecommendError::ConcurrencyConflict)));
    }

    #[tokio::test]
    async fn test_incremental_update_adds_new_tracks_and_keeps_old() {
        let trainer = EmbeddingTrainer::new();
        let config = seeded(TrainingConfig { embedding_dim: 8, epochs: 5, ..TrainingConfig::desktop() });
        trainer.train_embeddings(&sessions_of(&[&["a", "b"]], 3), config).await.unwrap();
        let before_a = trainer.vector("a").unwrap();

        let report = trainer.update_embeddings(&sessions_of(&[&["c", "d"]], 2), 2).await.unwrap();

        assert_eq!(report.epochs, 2);
        assert_eq!(trainer.len(), 4);
        assert_eq!(trainer.vector("d").map(|v| v.len()), Some(8));
        // "a" took no part in the new sessions
        assert_eq!(trainer.vector("a").unwrap(), before_a);
        assert_eq!(trainer.config().epochs, 2);
    }

    #[tokio::test]
    async fn test_incremental_update_draws_fresh_start_vectors() {
        let trainer = EmbeddingTrainer::new();
        let config = TrainingConfig { seed: Some(42), epochs: 0, ..TrainingConfig::desktop() };
        trainer.train_embeddings(&sessions_of(&[&["a", "b"]], 1), config).await.unwrap();
        let old: Vec<Vec<f32>> = ["a", "b"].iter().map(|id| trainer.vector(id).unwrap()).collect();

        trainer.update_embeddings(&sessions_of(&[&["c", "d"]], 1), 0).await.unwrap();

        for id in ["c", "d"] {
            let fresh = trainer.vector(id).unwrap();
            assert!(old.iter().all(|v| *v != fresh), "{id} reused an existing start vector");
            assert!(trainer.compute_embedding_similarity("a", id) < 0.999);
        }
    }

    #[tokio::test]
    async fn test_mobile_training_leaves_unit_vectors() {
        let trainer = EmbeddingTrainer::new();
        let config = seeded(TrainingConfig { epochs: 4, ..TrainingConfig::mobile() });
        trainer.train_embeddings(&sessions_of(&[&["a", "b", "c"]], 4), config).await.unwrap();

        for id in ["a", "b", "c"] {
            let v = trainer.vector(id).unwrap();
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4, "{id} has norm {norm}");
            assert_eq!(v.len(), 12);
        }
    }

    #[tokio::test]
    async fn test_progress_callback_runs_every_epoch() {
        let trainer = EmbeddingTrainer::new();
        let mut seen = Vec::new();
        let config = seeded(TrainingConfig { epochs: 4, ..TrainingConfig::desktop() });

        trainer
            .train_embeddings_with_progress(&sessions_of(&[&["a", "b"]], 1), config, |p| seen.push(p))
            .await
            .unwrap();

        assert_eq!(seen.len(), 4);
        assert_eq!(seen[3].epoch, 3);
        assert!((seen[3].progress - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_dimension_change_discards_previous_vectors() {
        let trainer = EmbeddingTrainer::new();
        let small = seeded(TrainingConfig { embedding_dim: 4, epochs: 1, ..TrainingConfig::desktop() });
        trainer.train_embeddings(&sessions_of(&[&["a", "b"]], 1), small).await.unwrap();

        let large = seeded(TrainingConfig { embedding_dim: 6, epochs: 1, ..TrainingConfig::desktop() });
        trainer.train_embeddings(&sessions_of(&[&["c", "d"]], 1), large).await.unwrap();

        assert!(!trainer.contains("a"));
        assert_eq!(trainer.vector("c").map(|v| v.len()), Some(6));
        assert_eq!(trainer.dimension(), 6);
    }

    #[test]
    fn test_get_similar_excludes_self_and_is_sorted() {
        let trainer = EmbeddingTrainer::new();
        trainer.insert_vector("s", vec![1.0, 0.0, 0.0]).unwrap();
        trainer.insert_vector("near", vec![0.9, 0.1, 0.0]).unwrap();
        trainer.insert_vector("mid", vec![0.5, 0.5, 0.0]).unwrap();
        trainer.insert_vector("far", vec![-1.0, 0.0, 0.0]).unwrap();

        let similar = trainer.get_similar("s", 2);
        let ids: Vec<_> = similar.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(similar.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(trainer.get_similar("s", 10).iter().all(|n| n.id != "s"));
        assert!(trainer.get_similar("missing", 5).is_empty());
    }

    #[test]
    fn test_similarity_of_unknown_tracks_is_zero() {
        let trainer = EmbeddingTrainer::new();
        trainer.insert_vector("a", vec![1.0, 2.0]).unwrap();
        assert_eq!(trainer.compute_embedding_similarity("a", "zzz"), 0.0);
        assert!((trainer.compute_embedding_similarity("a", "a") - 1.0).abs() < 1e-9);

        let batch = trainer.batch_similarity("a", &["a", "zzz"]);
        assert_eq!(batch[1].score, 0.0);
    }

    #[test]
    fn test_insert_vector_rejects_wrong_dimension() {
        let trainer = EmbeddingTrainer::new();
        trainer.insert_vector("a", vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            trainer.insert_vector("b", vec![1.0]),
            Err(RecommendError::MalformedImport(_))
        ));
        assert_eq!(trainer.dimension(), 2);
        assert_eq!(trainer.memory_usage_bytes(), 2 * std::mem::size_of::<f32>());
    }

    #[test]
    fn test_export_import_preserves_ranking() {
        let trainer = EmbeddingTrainer::new();
        trainer.insert_vector("s", vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        trainer.insert_vector("a", vec![0.9, 0.1, 0.0, 0.0]).unwrap();
        trainer.insert_vector("b", vec![0.6, 0.6, 0.0, 0.0]).unwrap();
        trainer.insert_vector("c", vec![0.1, 0.9, 0.2, 0.0]).unwrap();
        trainer.insert_vector("d", vec![-1.0, 0.0, 0.0, 0.3]).unwrap();
        let before: Vec<_> = trainer.get_similar("s", 4).into_iter().map(|n| n.id).collect();

        let exported = trainer.export_embeddings().unwrap();
        let restored = EmbeddingTrainer::new();
        assert_eq!(restored.import_embeddings(&exported).unwrap(), 5);

        let after: Vec<_> = restored.get_similar("s", 4).into_iter().map(|n| n.id).collect();
        assert_eq!(before, after);
        assert_eq!(restored.dimension(), 4);
    }

    #[tokio::test]
    async fn test_export_import_after_training_keeps_scores_close() {
        let trainer = EmbeddingTrainer::new();
        let sessions = sessions_of(&[&["a", "b", "c", "d"], &["d", "e", "f"]], 3);
        let config = seeded(TrainingConfig { epochs: 10, ..TrainingConfig::mobile() });
        trainer.train_embeddings(&sessions, config).await.unwrap();

        let restored = EmbeddingTrainer::new();
        restored.import_embeddings(&trainer.export_embeddings().unwrap()).unwrap();

        for original in trainer.get_similar("a", 5) {
            let score = restored.compute_embedding_similarity("a", &original.id);
            assert!((score - original.score).abs() < 0.05, "{} drifted", original.id);
        }
        assert_eq!(restored.config().embedding_dim, 12);
    }

    #[test]
    fn test_malformed_import_leaves_store_untouched() {
        let trainer = EmbeddingTrainer::new();
        trainer.insert_vector("a", vec![1.0, 0.0]).unwrap();

        assert!(matches!(
            trainer.import_embeddings("definitely not base64 !!"),
            Err(RecommendError::MalformedImport(_))
        ));

        let ragged = STANDARD.encode(
            r#"{"embeddings":[["x",[1.0,2.0]],["y",[1.0]]],"config":{"embeddingDim":2}}"#,
        );
        assert!(matches!(
            trainer.import_embeddings(&ragged),
            Err(RecommendError::MalformedImport(_))
        ));

        assert_eq!(trainer.len(), 1);
        assert_eq!(trainer.vector("a"), Some(vec![1.0, 0.0]));
    }

    #[test]
    fn test_clear_empties_store() {
        let trainer = EmbeddingTrainer::new();
        trainer.insert_vector("a", vec![1.0]).unwrap();
        trainer.clear().unwrap();
        assert!(trainer.is_empty());
    }
}
