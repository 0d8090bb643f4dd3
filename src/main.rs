use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use codebase_indexer::config::{APP_NAME, AgentConfig, AppPaths, DEFAULT_ROOT_DIR};
use codebase_indexer::database::{DatabaseManager, SqliteManager, Workspace};
use codebase_indexer::repository::storage::codebase_id;
use codebase_indexer::repository::{
    CodebaseConfig, SqliteEventRepository, SqliteWorkspaceRepository, StorageManager,
    WorkspaceRepository,
};
use codebase_indexer::scanner::FileScanner;
use codebase_indexer::service::{ChangeDetector, EventCleaner};

#[derive(Parser, Debug)]
#[command(name = "codebase-indexer", version, about = "Local codebase change tracker")]
struct Cli {
    /// Application root holding logs, cache and the database
    #[arg(long, default_value = DEFAULT_ROOT_DIR)]
    root: String,

    /// Config file (defaults to <root>/config/codebase-indexer.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a workspace directory for tracking
    Register { path: PathBuf },
    /// Scan a workspace and record its changes as events
    Scan { path: PathBuf },
    /// Garbage collect expired events
    CleanEvents,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths =
        AppPaths::resolve(Some(cli.root.as_str())).context("invalid application root")?;
    paths
        .ensure()
        .with_context(|| format!("failed to create {}", paths.root.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("codebase_indexer=info"))
        .context("invalid log filter")?;

    let file_appender = rolling::daily(&paths.logs_dir, format!("{}.log", APP_NAME));
    let (non_blocking_file, _file_guard) = non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(true))
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_target(true)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    let config_path = cli.config.unwrap_or_else(|| paths.config_file.clone());
    let mut config = AgentConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if config.database.data_dir.as_os_str().is_empty() {
        config.database.data_dir = paths.db_dir.clone();
    }

    info!("🚀 Starting {} {}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let db: Arc<dyn DatabaseManager> =
        SqliteManager::open(config.database.clone()).context("failed to open database")?;
    let workspaces = Arc::new(SqliteWorkspaceRepository::new(db.clone()));
    let events = Arc::new(SqliteEventRepository::new(db.clone()));

    let result = match cli.command {
        Command::Register { path } => register(workspaces.as_ref(), &path),
        Command::Scan { path } => {
            let scanner = Arc::new(FileScanner::new(config.scan.clone()));
            let detector = ChangeDetector::new(scanner, events, workspaces.clone());
            StorageManager::open(&paths.workspace_dir)
                .context("failed to open baseline storage")
                .and_then(|storage| scan(&detector, workspaces.as_ref(), &storage, &path))
        }
        Command::CleanEvents => {
            let report = EventCleaner::new(events)
                .run_with_retention(config.sync.event_retention_hours)
                .context("event cleanup failed")?;
            info!(
                "🧹 Removed {} expired events (table reset: {})",
                report.expired_deleted, report.table_cleared
            );
            Ok(())
        }
    };

    db.close().context("failed to close database")?;
    result
}

fn canonical_workspace(path: &Path) -> Result<String> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("workspace {} does not exist", path.display()))?;
    Ok(canonical.to_string_lossy().to_string())
}

fn register(workspaces: &dyn WorkspaceRepository, path: &Path) -> Result<()> {
    let workspace_path = canonical_workspace(path)?;
    match workspaces.get_workspace_by_path(&workspace_path) {
        Ok(existing) => {
            info!("Workspace already registered: {}", existing.workspace_path);
            return Ok(());
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e).context("failed to look up workspace"),
    }

    let name = Path::new(&workspace_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| workspace_path.clone());
    let mut workspace = Workspace::new(name, workspace_path);
    workspaces
        .create_workspace(&mut workspace)
        .context("failed to register workspace")?;
    Ok(())
}

/// Previous scan of the workspace, or a fresh record when there is none.
fn load_baseline(storage: &StorageManager, workspace_path: &str) -> CodebaseConfig {
    match storage.get(&codebase_id(workspace_path)) {
        Ok(config) => config,
        Err(e) if e.is_not_found() => CodebaseConfig::new(workspace_path),
        Err(e) => {
            warn!("Discarding unreadable baseline for {}: {}", workspace_path, e);
            CodebaseConfig::new(workspace_path)
        }
    }
}

fn scan(
    detector: &ChangeDetector,
    workspaces: &dyn WorkspaceRepository,
    storage: &StorageManager,
    path: &Path,
) -> Result<()> {
    let workspace_path = canonical_workspace(path)?;
    let workspace = workspaces
        .get_workspace_by_path(&workspace_path)
        .with_context(|| format!("{} is not registered", workspace_path))?;

    let mut baseline = load_baseline(storage, &workspace_path);

    let outcome = detector
        .detect_file_changes(&workspace, &baseline.hash_tree)
        .context("change detection failed")?;

    baseline.hash_tree = outcome.hash_tree.clone();
    baseline.last_sync = Some(chrono::Utc::now());
    storage
        .save(&baseline)
        .with_context(|| format!("failed to save baseline for {}", workspace_path))?;

    println!(
        "{}: {} files, {} changes, {} events recorded, {} skipped",
        workspace_path,
        outcome.hash_tree.len(),
        outcome.changes.len(),
        outcome.created_events.len(),
        outcome.skipped
    );
    Ok(())
}
