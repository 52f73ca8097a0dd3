//! # Integration Tests for Muse Radio
//!
//! End-to-end behavior through the public API: model training, ranking,
//! the auto-queue, persistence round trips, the HTTP surface and the binary.

use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

use muse_radio::catalog::Catalog;
use muse_radio::cooccurrence::CoOccurrenceModel;
use muse_radio::embedding::{EmbeddingTrainer, TrainingConfig};
use muse_radio::error::RecommendError;
use muse_radio::queue::{AutoQueueManager, PlaybackEvent, QueueConfig};
use muse_radio::recommend::RecommendationEngine;
use muse_radio::track::{AudioFeatures, Session, Track};

const GENRES: [&str; 3] = ["rock", "jazz", "ambient"];

/// 30 tracks, ten per genre, two artists per genre.
fn sample_tracks() -> Vec<Track> {
    (0..30)
        .map(|i| {
            let genre = GENRES[i / 10];
            let artist = format!("{genre}-artist-{}", (i / 5) % 2);
            Track {
                id: format!("t{i:02}"),
                title: format!("Song {i}"),
                artist: artist.clone(),
                artist_id: artist,
                genre: genre.to_string(),
                tags: [genre.to_string()].into_iter().collect(),
                audio: AudioFeatures {
                    tempo: 80.0 + (i as f64) * 3.0,
                    energy: (i % 10) as f64 / 10.0,
                    danceability: 0.5,
                },
                popularity: (i * 3) as u8,
            }
        })
        .collect()
}

/// Listening sessions that stay inside one genre.
fn sample_sessions() -> Vec<Session> {
    let mut sessions = Vec::new();
    for (g, _) in GENRES.iter().enumerate() {
        for offset in 0..6 {
            let tracks: Vec<String> = (0..5).map(|k| format!("t{:02}", g * 10 + (offset + k) % 10)).collect();
            sessions.push(Session::new(format!("user{g}"), format!("s{g}-{offset}"), tracks));
        }
    }
    sessions
}

fn seeded_config() -> TrainingConfig {
    TrainingConfig {
        seed: Some(7),
        learning_rate: 0.025,
        ..TrainingConfig::desktop()
    }
}

async fn trained_engine() -> RecommendationEngine {
    let sessions = sample_sessions();
    let embeddings = Arc::new(EmbeddingTrainer::new());
    embeddings
        .train_embeddings(&sessions, seeded_config())
        .await
        .expect("training succeeds");
    RecommendationEngine::new(
        Arc::new(Catalog::from_tracks(sample_tracks())),
        CoOccurrenceModel::from_sessions(&sessions),
        embeddings,
    )
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_single_session_co_matrix() {
        let model = CoOccurrenceModel::from_sessions(&[Session::anonymous(["t1", "t2", "t3"])]);
        assert_eq!(model.count("t1", "t2"), 1);
        assert_eq!(model.count("t1", "t3"), 1);
        assert_eq!(model.count("t2", "t1"), 1);
    }

    #[tokio::test]
    async fn test_adjacent_tracks_train_closer_than_unrelated() {
        let mut sessions = Vec::new();
        for _ in 0..15 {
            sessions.push(Session::anonymous(["A", "B"]));
            sessions.push(Session::anonymous(["B", "A", "C"]));
            sessions.push(Session::anonymous(["X", "Y", "Z"]));
        }
        let trainer = EmbeddingTrainer::new();
        trainer.train_embeddings(&sessions, seeded_config()).await.unwrap();

        assert!(
            trainer.compute_embedding_similarity("A", "B") > trainer.compute_embedding_similarity("A", "X")
        );
    }

    #[tokio::test]
    async fn test_queue_refills_after_dropping_below_minimum() {
        let engine = trained_engine().await;
        let mut manager = AutoQueueManager::new(
            Arc::clone(engine.catalog()),
            Arc::clone(engine.embeddings()),
            QueueConfig {
                min_queue_size: 5,
                max_queue_size: 20,
                similarity_threshold: -1.0,
                ..QueueConfig::default()
            },
        );
        manager.initialize_queue("t00");
        assert!(manager.queue().len() >= 5);

        while manager.queue().len() > 5 {
            manager.next_track();
        }
        manager.next_track();

        assert!(manager.queue().len() >= 5);
        let ids: HashSet<_> = manager.queue().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), manager.queue().len());
    }

    #[tokio::test]
    async fn test_export_import_keeps_neighbor_ranking() {
        let engine = trained_engine().await;
        let original = engine.embeddings();
        let restored = EmbeddingTrainer::new();
        restored.import_embeddings(&original.export_embeddings().unwrap()).unwrap();

        for neighbor in original.get_similar("t03", 8) {
            let score = restored.compute_embedding_similarity("t03", &neighbor.id);
            assert!((score - neighbor.score).abs() < 0.05);
        }
        assert_eq!(restored.len(), original.len());
    }

    #[tokio::test]
    async fn test_overlapping_training_is_rejected() {
        let trainer = EmbeddingTrainer::new();
        let sessions = sample_sessions();
        let config = TrainingConfig {
            epochs: 2,
            seed: Some(1),
            ..TrainingConfig::mobile()
        };

        let (a, b) = tokio::join!(
            trainer.train_embeddings(&sessions, config.clone()),
            trainer.train_embeddings(&sessions, config.clone())
        );
        assert!(a.is_ok());
        assert!(matches!(b, Err(RecommendError::ConcurrencyConflict)));
    }
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[tokio::test]
    async fn test_recommendations_prefer_same_genre() {
        let engine = trained_engine().await;
        let recs = engine.recommend_for_track("t12", 5).unwrap();

        assert_eq!(recs.track.genre, "jazz");
        assert_eq!(recs.recommendations.len(), 5);
        assert!(recs.recommendations.iter().all(|r| r.genre == "jazz"));
        assert!(recs.recommendations.iter().all(|r| r.id != "t12"));
    }

    #[tokio::test]
    async fn test_unknown_seed_fails_with_not_found() {
        let engine = trained_engine().await;
        assert!(engine.recommend_for_track("missing", 5).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_listening_session_feeds_incremental_training() {
        let engine = trained_engine().await;
        let mut manager = AutoQueueManager::new(
            Arc::clone(engine.catalog()),
            Arc::clone(engine.embeddings()),
            QueueConfig::default(),
        );

        for id in ["t20", "t21", "t22"] {
            manager.handle_event(PlaybackEvent::Started { track_id: id.into() });
            manager.handle_event(PlaybackEvent::Finished { track_id: id.into(), skipped: false });
        }
        let session = manager.take_session("listener").unwrap();
        assert_eq!(session.tracks.len(), 3);

        let report = engine.embeddings().update_embeddings(&[session], 3).await.unwrap();
        assert_eq!(report.epochs, 3);
        assert_eq!(engine.embeddings().len(), 30);
    }
}

#[cfg(test)]
mod persistence_tests {
    use super::*;
    use muse_radio::embedding::EMBEDDINGS_KEY;
    use muse_radio::persistence::{FileStorage, PersistenceAdapter, SqliteStorage};

    #[tokio::test]
    async fn test_embeddings_survive_sqlite_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let engine = trained_engine().await;
        let storage = SqliteStorage::open(&dir.path().join("radio.db3"))?;
        assert!(engine.embeddings().save_to(&storage).await);

        let restored = EmbeddingTrainer::new();
        assert!(restored.load_from(&storage).await);
        assert_eq!(restored.len(), engine.embeddings().len());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_storage_is_treated_as_no_state() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = FileStorage::new(dir.path());
        storage.save(EMBEDDINGS_KEY, "garbage").await?;

        let trainer = EmbeddingTrainer::new();
        trainer.insert_vector("keep", vec![1.0, 0.0])?;
        assert!(!trainer.load_from(&storage).await);
        assert_eq!(trainer.vector("keep"), Some(vec![1.0, 0.0]));

        let empty = FileStorage::new(dir.path().join("nothing-here"));
        assert!(!trainer.load_from(&empty).await);
        Ok(())
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get(engine: Arc<RecommendationEngine>, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = muse_radio::server::make_app(engine)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_recommend_endpoint_returns_ranked_breakdowns() {
        let engine = Arc::new(trained_engine().await);
        let (status, body) = get(Arc::clone(&engine), "/recommend/track/t05?limit=4").await;

        assert_eq!(status, StatusCode::OK);
        let recs = body["data"]["recommendations"].as_array().unwrap();
        assert_eq!(recs.len(), 4);
        let scores: Vec<f64> = recs.iter().map(|r| r["score"].as_f64().unwrap()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(recs[0]["breakdown"]["embedding"].is_number());

        let (status, body) = get(engine, "/recommend/track/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    struct Fixture {
        dir: TempDir,
        config: PathBuf,
        catalog: PathBuf,
        sessions: PathBuf,
    }

    fn fixture() -> Result<Fixture> {
        let dir = TempDir::new()?;
        let catalog = dir.path().join("catalog.json");
        let sessions = dir.path().join("sessions.json");
        let config = dir.path().join("config.json");
        std::fs::write(&catalog, serde_json::to_string(&sample_tracks())?)?;
        std::fs::write(&sessions, serde_json::to_string(&sample_sessions())?)?;
        std::fs::write(&config, r#"{"storage": "file", "training": {"epochs": 5, "seed": 3}}"#)?;
        Ok(Fixture { dir, config, catalog, sessions })
    }

    fn muse_radio(fx: &Fixture, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_muse-radio"))
            .env("XDG_DATA_HOME", fx.dir.path())
            .env("HOME", fx.dir.path())
            .arg("--config")
            .arg(&fx.config)
            .arg("--catalog")
            .arg(&fx.catalog)
            .arg("--sessions")
            .arg(&fx.sessions)
            .args(args)
            .output()
            .expect("Failed to run muse-radio")
    }

    fn state_dir(fx: &Fixture) -> PathBuf {
        fx.dir.path().join("muse-radio").join("state")
    }

    #[test]
    fn test_cli_help_lists_commands() -> Result<()> {
        let fx = fixture()?;
        let output = muse_radio(&fx, &["--help"]);
        let stdout = String::from_utf8_lossy(&output.stdout);
        for command in ["train", "recommend", "queue", "serve", "completion"] {
            assert!(stdout.contains(command), "help is missing {command}");
        }
        Ok(())
    }

    #[test]
    fn test_completion_generation() -> Result<()> {
        let fx = fixture()?;
        let output = muse_radio(&fx, &["completion", "bash"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("complete"));
        Ok(())
    }

    #[test]
    fn test_train_then_recommend() -> Result<()> {
        let fx = fixture()?;
        let train = muse_radio(&fx, &["train"]);
        assert!(train.status.success(), "{}", String::from_utf8_lossy(&train.stderr));
        assert!(state_dir(&fx).is_dir());

        let output = muse_radio(&fx, &["recommend", "t01", "--limit", "3", "--json"]);
        assert!(output.status.success());
        let body: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(body["trackId"], "t01");
        assert_eq!(body["recommendations"].as_array().map(Vec::len), Some(3));
        Ok(())
    }

    #[test]
    fn test_unknown_track_fails() -> Result<()> {
        let fx = fixture()?;
        let output = muse_radio(&fx, &["recommend", "nope"]);
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("Track nope not found"));
        Ok(())
    }

    #[test]
    fn test_missing_catalog_reports_path() -> Result<()> {
        let fx = fixture()?;
        std::fs::remove_file(&fx.catalog)?;
        let output = muse_radio(&fx, &["user", "u1"]);
        assert!(!output.status.success());
        assert!(contains_path(&String::from_utf8_lossy(&output.stderr), &fx.catalog));
        Ok(())
    }

    fn contains_path(text: &str, path: &Path) -> bool {
        text.contains(&path.display().to_string())
    }
}
