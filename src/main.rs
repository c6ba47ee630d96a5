use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use kbrowse::app::{App, AppEvent};
use kbrowse::config::Config;
use kbrowse::knowledge::deep_link::DeepLink;
use kbrowse::knowledge::prefs::UiPreferences;
use kbrowse::storage::{Database, DatabaseError, SeedFile};
use kbrowse::ui;

/// SEC: Maximum accepted seed file size (64 MB).
const MAX_SEED_SIZE: u64 = 64 * 1024 * 1024;

/// Get the config directory path (~/.config/kbrowse/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("kbrowse");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "kbrowse", about = "Terminal browser for a hierarchical knowledge base")]
struct Args {
    /// Database file (default: ~/.config/kbrowse/kbrowse.db)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/kbrowse/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Import a JSON knowledge-base dump before starting
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// Navigation fragment to open, e.g. "#action=knowledge?article_id=5"
    #[arg(long, value_name = "FRAGMENT")]
    link: Option<String>,
}

/// Send logs to `kbrowse.log` so they never draw over the TUI.
fn init_logging(config_dir: &Path) -> Result<()> {
    let log_path = config_dir.join("kbrowse.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kbrowse=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Read and parse a seed dump, refusing anything that is not a regular file.
fn read_seed(path: &Path) -> Result<SeedFile> {
    // SEC: Canonicalize to resolve symlinks
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve import file: {}", path.display()))?;
    let metadata = std::fs::metadata(&canonical)?;
    if !metadata.is_file() {
        anyhow::bail!("Import path must be a regular file");
    }
    if metadata.len() > MAX_SEED_SIZE {
        anyhow::bail!(
            "Import file is {} bytes (max {} bytes)",
            metadata.len(),
            MAX_SEED_SIZE
        );
    }
    let content = std::fs::read_to_string(&canonical)
        .with_context(|| format!("Failed to read import file: {}", canonical.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Import file is not a valid knowledge-base dump: {}", canonical.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // SEC: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    eprintln!(
                        "Warning: failed to set permissions on {}: {}",
                        config_dir.display(),
                        e
                    );
                }
            }
            Err(e) => {
                eprintln!(
                    "Warning: failed to read metadata of {}: {}",
                    config_dir.display(),
                    e
                );
            }
        }
    }

    init_logging(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let db_path = args.db.clone().unwrap_or_else(|| config_dir.join("kbrowse.db"));

    // Handle --reset-db flag
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of kbrowse appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    // Handle --import flag
    if let Some(import_file) = &args.import {
        let seed = read_seed(import_file)?;
        let summary = db
            .import_seed(&seed)
            .await
            .context("Failed to import knowledge base")?;
        tracing::info!(?summary, "Seed imported");
        println!(
            "Imported {} articles, {} tags, {} users, {} favorites, {} comments",
            summary.articles, summary.tags, summary.users, summary.favorites, summary.comments
        );
    }

    let prefs = match UiPreferences::load(&db).await {
        Ok(prefs) => prefs,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load preferences, using defaults");
            UiPreferences::default()
        }
    };

    let link = args
        .link
        .as_deref()
        .map(DeepLink::parse)
        .unwrap_or_default();
    let mut app = App::new(db.clone(), config, link);
    app.apply_preferences(prefs);
    let user_id = app.user_id();
    app.store
        .load(&db, user_id)
        .await
        .context("Failed to load knowledge base")?;

    // Create event channel for background tasks
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    let outcome = app.mount();
    ui::after_selection(&mut app, &outcome, &event_tx);

    // Run the TUI
    ui::run(&mut app, event_tx, event_rx).await?;

    let link = app.selection.link().as_str().to_string();
    drop(app);
    db.close().await;

    println!("{}", link);
    Ok(())
}
