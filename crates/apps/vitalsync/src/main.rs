//! vitalsync - command line front end for the vitals sync engine
//!
//! Reads samples from a health export, uploads whatever the backend is
//! missing and keeps sync bookkeeping in a local SQLite database.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use vitals::{
    EngineConfig, FileHealthSource, HealthSource, HttpBackend, InMemoryBackend,
    InMemoryHealthSource, InMemoryKeyValueStore, KeyValueStore, SqliteKeyValueStore, SyncEngine,
    SyncEvent, SyncRequest, SyncStatus, SyncTrigger, VitalsBackend, determine_sync_kind,
    should_auto_sync,
};

mod cli;

use cli::{Cli, Commands, SyncArgs};

const DB_FILE: &str = "vitalsync.sqlite";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let engine_config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::load()?,
    };

    match cli.command {
        Commands::Sync(args) => sync(&cli.db_path, engine_config, args),
        Commands::Resume => resume(&cli.db_path, engine_config),
        Commands::Status => status(&cli.db_path, engine_config),
        Commands::Reset => {
            let engine = build_engine(
                Arc::new(InMemoryHealthSource::new()),
                Arc::new(InMemoryBackend::new()),
                open_store(&cli.db_path)?,
                engine_config,
            )?;
            engine.reset()?;
            println!("Sync state cleared");
            Ok(())
        }
    }
}

fn sync(db_path: &Option<PathBuf>, engine_config: EngineConfig, args: SyncArgs) -> Result<()> {
    let source: Arc<dyn HealthSource> = Arc::new(FileHealthSource::load(&args.export)?);
    let (backend, store): (Arc<dyn VitalsBackend>, Arc<dyn KeyValueStore>) = if args.dry_run {
        info!("Dry run: uploading to an in-memory backend");
        (
            Arc::new(InMemoryBackend::new()),
            Arc::new(InMemoryKeyValueStore::new()),
        )
    } else {
        (http_backend(&engine_config)?, open_store(db_path)?)
    };

    let cooldown_secs = engine_config.cooldown_secs;
    let engine = build_engine(source, backend, store, engine_config)?;
    let trigger: SyncTrigger = args.trigger.into();
    if !should_auto_sync(trigger, engine.persistence(), cooldown_secs)? {
        println!("Skipping {trigger} sync: last sync was less than {cooldown_secs}s ago");
        return Ok(());
    }

    let kind = match args.kind.sync_kind() {
        Some(kind) => kind,
        None => determine_sync_kind(engine.persistence())?,
    };
    info!("Starting {} sync ({} trigger)", kind, trigger);

    let result = engine.run(SyncRequest::new(kind, trigger))?;
    if result.used_fallback_window {
        warn!("Backend timestamps unavailable, synced the fallback window only");
    }
    for target in &result.failed_targets {
        warn!("Extraction failed for {}", target.label());
    }
    for (target, count) in &result.per_target {
        if *count > 0 {
            println!("  {:<24} {}", target.label(), count);
        }
    }
    println!("{} ({} ms)", result.summary(), result.duration_ms);
    Ok(())
}

fn resume(db_path: &Option<PathBuf>, engine_config: EngineConfig) -> Result<()> {
    let backend = http_backend(&engine_config)?;
    let engine = build_engine(
        Arc::new(InMemoryHealthSource::new()),
        backend,
        open_store(db_path)?,
        engine_config,
    )?;
    let result = engine.resume()?;
    match (result.status, result.session_id) {
        (SyncStatus::Completed, Some(session)) => {
            println!("{} under session {}", result.summary(), session)
        }
        _ => println!("{}", result.summary()),
    }
    Ok(())
}

fn status(db_path: &Option<PathBuf>, engine_config: EngineConfig) -> Result<()> {
    let engine = build_engine(
        Arc::new(InMemoryHealthSource::new()),
        Arc::new(InMemoryBackend::new()),
        open_store(db_path)?,
        engine_config,
    )?;

    let last_syncs = engine.persistence().all_last_syncs()?;
    if last_syncs.is_empty() {
        println!("Never synced");
    }
    let cooldown_secs = engine.config().cooldown_secs;
    for (kind, at) in last_syncs {
        let note = if engine.persistence().in_cooldown(kind, cooldown_secs)? {
            " (cooling down)"
        } else {
            ""
        };
        println!("Last {:<14} {}{}", kind.to_string(), at.to_rfc3339(), note);
    }

    match engine.resumable_state() {
        Some(state) => println!(
            "Pending {} session: {}/{} chunks, {} readings left (saved {})",
            state.sync_kind,
            state.completed_chunks,
            state.total_chunks(),
            state.remaining_readings().len(),
            state.saved_at.to_rfc3339()
        ),
        None => println!("No pending upload"),
    }

    if let Some(progress) = engine.progress() {
        println!(
            "Progress: {}",
            serde_json::to_string_pretty(&progress).context("Failed to encode progress")?
        );
    }
    Ok(())
}

fn build_engine(
    source: Arc<dyn HealthSource>,
    backend: Arc<dyn VitalsBackend>,
    store: Arc<dyn KeyValueStore>,
    engine_config: EngineConfig,
) -> Result<SyncEngine> {
    let engine = SyncEngine::new(source, backend, store, engine_config)?;

    // Log progress from a side thread; it exits when the engine is dropped
    let events = engine.subscribe();
    thread::Builder::new()
        .name("vitalsync-progress".to_string())
        .spawn(move || {
            for event in events {
                match event {
                    SyncEvent::Progress(state) => info!(
                        "{:>3.0}% {} ({}/{})",
                        state.progress * 100.0,
                        state.message,
                        state.synced_count,
                        state.total_count
                    ),
                    SyncEvent::Finished {
                        success: false,
                        message,
                        ..
                    } => error!("Sync failed: {}", message),
                    _ => {}
                }
            }
        })
        .context("Failed to spawn progress logger")?;

    Ok(engine)
}

fn http_backend(engine_config: &EngineConfig) -> Result<Arc<dyn VitalsBackend>> {
    let backend = HttpBackend::new(
        engine_config.require_backend_url()?,
        engine_config.api_token.clone(),
        engine_config.request_timeout(),
    )?;
    Ok(Arc::new(backend))
}

fn open_store(db_path: &Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    let path = match db_path {
        Some(path) => path.clone(),
        None => {
            config::ensure_data_dir()?;
            config::data_path(DB_FILE).context("Could not determine data directory")?
        }
    };
    info!("Using sync database at {}", path.display());
    Ok(Arc::new(SqliteKeyValueStore::new(&path)?))
}
