use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use studio_bridge::api::HttpListenerFactory;
use studio_bridge::config::{ConfigStore, ListenerConfig};
use studio_bridge::demo::demo_project;
use studio_bridge::device_catalog::{CatalogError, DeviceCatalog};
use studio_bridge::logging::{init_logging, LoggingError, LoggingMode};
use studio_bridge::paths;
use studio_bridge::project::{load_project, ProjectError};
use studio_bridge::settings::{self, BridgeSettings, SettingsError};
use studio_bridge::state::AppState;
use studio_bridge::studio::memory::MemoryStudio;
use studio_bridge::supervisor::{ListenerError, ListenerSupervisor};

#[derive(Parser)]
#[command(name = "studio_bridge", about = "Studio bridge command server", version)]
struct Args {
    /// Config directory (settings, device catalog, audit log)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Listen host, overrides the settings file
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the settings file
    #[arg(long)]
    port: Option<u16>,

    /// Project snapshot to load instead of the demo project
    #[arg(long)]
    project: Option<PathBuf>,

    /// Seconds between settings-file checks
    #[arg(long, default_value_t = 2)]
    watch_interval: u64,

    /// Verbose logging with source locations
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Error)]
enum ServeError {
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to load project: {0}")]
    Project(#[from] ProjectError),
    #[error("failed to load device catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("failed to wait for shutdown signal: {0}")]
    Signal(std::io::Error),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!(error = %e, "studio bridge stopped");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ServeError> {
    let config_dir = args.config_dir.clone().unwrap_or_else(paths::default_config_dir);

    let loaded = settings::load_settings(&config_dir);
    let settings = match &loaded {
        Ok(Some(s)) => s.clone(),
        _ => BridgeSettings::default(),
    };
    let mode = if args.debug { LoggingMode::Debug } else { LoggingMode::Server };
    init_logging(mode, settings.log_filter.as_deref())?;
    if let Err(e) = loaded {
        warn!(error = %e, "ignoring unreadable settings, using defaults");
    }

    let listener_config = with_overrides(settings.listener_config(), &args);
    let state = Arc::new(build_state(&args, &config_dir, &settings)?);

    let store = ConfigStore::new(listener_config);
    let factory = Arc::new(HttpListenerFactory::new(Arc::clone(&state)));
    let supervisor = Arc::new(ListenerSupervisor::new(factory, settings.restart_delay()));
    let watcher = Arc::clone(&supervisor).watch_config(store.subscribe(), store.clone());

    let addr = supervisor.start(&store.listener_config()).await?;
    info!(%addr, commands = state.registry.len(), "Studio bridge listening on http://{addr}");

    let poller = tokio::spawn(poll_settings(
        config_dir,
        store.clone(),
        args.host.clone(),
        args.port,
        Duration::from_secs(args.watch_interval.max(1)),
    ));

    tokio::signal::ctrl_c().await.map_err(ServeError::Signal)?;
    info!("Shutting down");
    poller.abort();
    watcher.abort();
    supervisor.stop().await;
    Ok(())
}

fn with_overrides(mut config: ListenerConfig, args: &Args) -> ListenerConfig {
    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config
}

fn build_state(
    args: &Args,
    config_dir: &Path,
    settings: &BridgeSettings,
) -> Result<AppState, ServeError> {
    let project = match args.project.as_ref().or(settings.project_file.as_ref()) {
        Some(path) => {
            info!(path = %path.display(), "Loading project snapshot");
            load_project(path)?
        }
        None => demo_project(),
    };

    let catalog_path = paths::device_catalog_path(config_dir);
    let catalog = if catalog_path.exists() {
        DeviceCatalog::load(&catalog_path)?
    } else {
        DeviceCatalog::builtin()?
    };
    debug!(devices = catalog.total(), "Device catalog loaded");

    let state = AppState::new(Arc::new(MemoryStudio::new(project)), Arc::new(catalog));
    Ok(if settings.audit {
        state.with_audit_dir(paths::audit_dir(config_dir))
    } else {
        state
    })
}

/// Push host/port edits from the settings file into the config store. Fields
/// pinned on the command line are left alone.
async fn poll_settings(
    config_dir: PathBuf,
    store: ConfigStore,
    host_override: Option<String>,
    port_override: Option<u16>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let settings = match settings::load_settings(&config_dir) {
            Ok(Some(s)) => s,
            Ok(None) => continue,
            Err(e) => {
                debug!(error = %e, "settings file unreadable, keeping current listener");
                continue;
            }
        };
        let mut next = settings.listener_config();
        if let Some(host) = &host_override {
            next.host.clone_from(host);
        }
        if let Some(port) = port_override {
            next.port = port;
        }
        store.apply(&next);
    }
}
