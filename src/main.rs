//! # Muse Radio
//!
//! Command-line front end for the recommendation engine: trains embeddings
//! from a session log, answers recommendation queries, simulates the
//! auto-queue and serves the HTTP API.
//!
//! ```bash
//! muse-radio train
//! muse-radio recommend track_001
//! muse-radio serve --port 3000
//! ```

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use muse_radio::catalog::{self, Catalog};
use muse_radio::cli::{Args, Command};
use muse_radio::completion;
use muse_radio::config::{self, RuntimeConfig};
use muse_radio::cooccurrence::CoOccurrenceModel;
use muse_radio::embedding::{EmbeddingTrainer, TrainingConfig};
use muse_radio::persistence::PersistenceAdapter;
use muse_radio::queue::AutoQueueManager;
use muse_radio::recommend::RecommendationEngine;
use muse_radio::server;
use muse_radio::track::Session;

/// Resolved runtime settings shared by all commands.
struct App {
    config: RuntimeConfig,
    data_dir: PathBuf,
    catalog_path: PathBuf,
    sessions_path: PathBuf,
}

impl App {
    fn from_args(args: &Args) -> Result<Self> {
        let data_dir = config::get_data_dir()?;
        let config_path = match &args.config {
            Some(path) => path.clone(),
            None => data_dir.join(config::CONFIG_FILE),
        };
        let config = RuntimeConfig::load(&config_path)?;

        let catalog_path = args
            .catalog
            .clone()
            .unwrap_or_else(|| config.resolve(&data_dir, &config.catalog_path));
        let sessions_path = args
            .sessions
            .clone()
            .unwrap_or_else(|| config.resolve(&data_dir, &config.sessions_path));

        Ok(Self {
            config,
            data_dir,
            catalog_path,
            sessions_path,
        })
    }

    fn catalog(&self) -> Result<Catalog> {
        Catalog::load_json(&self.catalog_path)
            .context("Pass --catalog or set catalogPath in config.json")
    }

    /// Sessions are optional outside of training; a missing log means no
    /// co-occurrence data.
    fn sessions_or_empty(&self) -> Result<Vec<Session>> {
        if self.sessions_path.exists() {
            catalog::load_sessions(&self.sessions_path)
        } else {
            warn!("No session log at {}", self.sessions_path.display());
            Ok(Vec::new())
        }
    }

    fn storage(&self) -> Result<Box<dyn PersistenceAdapter>> {
        self.config.open_storage(&self.data_dir)
    }

    async fn engine(&self) -> Result<RecommendationEngine> {
        let catalog = Arc::new(self.catalog()?);
        let cooccurrence = CoOccurrenceModel::from_sessions(&self.sessions_or_empty()?);
        let embeddings = Arc::new(EmbeddingTrainer::with_config(self.config.training.clone()));

        let storage = self.storage()?;
        if !embeddings.load_from(storage.as_ref()).await {
            warn!("No trained embeddings found, run `muse-radio train` first for better results");
        }
        Ok(RecommendationEngine::new(catalog, cooccurrence, embeddings))
    }
}

async fn train(app: &App, epochs: Option<usize>, seed: Option<u64>, incremental: bool) -> Result<()> {
    let sessions = catalog::load_sessions(&app.sessions_path)?;
    let storage = app.storage()?;
    let trainer = EmbeddingTrainer::with_config(app.config.training.clone());

    let report = if incremental {
        if !trainer.load_from(storage.as_ref()).await {
            info!("Nothing stored yet, incremental update starts from scratch");
        }
        let iterations = epochs.unwrap_or(app.config.training.epochs);
        trainer.update_embeddings(&sessions, iterations).await?
    } else {
        let config = TrainingConfig {
            epochs: epochs.unwrap_or(app.config.training.epochs),
            seed: seed.or(app.config.training.seed),
            ..app.config.training.clone()
        };
        trainer.train_embeddings(&sessions, config).await?
    };

    println!(
        "Trained {} tracks over {} epochs ({} pairs), final loss {:.4}",
        trainer.len(),
        report.epochs,
        report.pairs,
        report.final_loss().unwrap_or(0.0)
    );
    if !trainer.save_to(storage.as_ref()).await {
        bail!("Embeddings were trained but could not be saved to {}", storage.name());
    }
    Ok(())
}

async fn recommend(app: &App, track: &str, limit: usize, json: bool) -> Result<()> {
    let engine = app.engine().await?;
    let recs = engine.recommend_for_track(track, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recs)?);
        return Ok(());
    }

    println!("Because you played {} - {}:", recs.track.artist, recs.track.title);
    for (i, rec) in recs.recommendations.iter().enumerate() {
        println!(
            "  {:>2}. {} - {} [{:?}] score {:.3}",
            i + 1,
            rec.artist,
            rec.title,
            rec.source,
            rec.score
        );
    }
    Ok(())
}

async fn user(app: &App, user_id: &str, limit: usize) -> Result<()> {
    let engine = app.engine().await?;
    let recs = engine.recommend_for_user(user_id, limit);
    println!("{}", serde_json::to_string_pretty(&recs)?);
    Ok(())
}

async fn queue(app: &App, seed: &str, plays: usize) -> Result<()> {
    let engine = app.engine().await?;
    if !engine.catalog().contains(seed) {
        return Err(muse_radio::error::RecommendError::track_not_found(seed).into());
    }

    let mut manager = AutoQueueManager::new(
        Arc::clone(engine.catalog()),
        Arc::clone(engine.embeddings()),
        app.config.queue.clone(),
    );
    let added = manager.initialize_queue(seed);
    println!("Queued {added} tracks after {seed}");

    for i in 0..plays {
        let Some(track) = manager.next_track() else {
            println!("Queue ran dry after {i} plays");
            break;
        };
        println!("  {:>2}. {} - {} ({} queued)", i + 1, track.artist, track.title, manager.queue().len());
    }

    let stats = manager.stats();
    println!(
        "Queue: {} tracks, history: {}, average neighbor similarity {:.3}",
        stats.queue_size, stats.history_size, stats.average_similarity
    );
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    // Commands that need no data
    if let Command::Completion { shell } = args.command {
        completion::print_completions(shell, &mut Args::command());
        return Ok(());
    }

    let app = App::from_args(&args)?;

    match args.command {
        Command::Train { epochs, seed, incremental } => train(&app, epochs, seed, incremental).await,
        Command::Recommend { track, limit, json } => recommend(&app, &track, limit, json).await,
        Command::User { user_id, limit } => user(&app, &user_id, limit).await,
        Command::Queue { seed, plays } => queue(&app, &seed, plays).await,
        Command::Serve { port } => {
            let engine = Arc::new(app.engine().await?);
            server::run_server(engine, port.unwrap_or(app.config.port)).await
        }
        Command::CompleteTracks => {
            // no error output during completion
            if let Ok(catalog) = app.catalog() {
                completion::print_track_completions(&catalog, &mut std::io::stdout())?;
            }
            Ok(())
        }
        Command::Completion { .. } => Ok(()),
    }
}

/// Initializes logging, parses arguments, and runs the command on a
/// single-threaded runtime.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=info muse-radio train` - training progress
/// - `RUST_LOG=muse_radio::queue=debug muse-radio queue t1` - module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(args))
}
