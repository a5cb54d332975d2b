// CLI binary: panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unreachable, clippy::indexing_slicing)]

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use studio_bridge::demo::demo_project;
use studio_bridge::device_catalog::DeviceCatalog;
use studio_bridge::envelope::WireResponse;
use studio_bridge::logging::{init_logging, LoggingMode};
use studio_bridge::paths;
use studio_bridge::project::{load_project, save_project};
use studio_bridge::registry::{catalog, execute};
use studio_bridge::settings::{self, BridgeSettings};
use studio_bridge::state::AppState;
use studio_bridge::studio::memory::MemoryStudio;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "studiobridge-cli", about = "Studio bridge headless CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory override
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Project snapshot for headless runs (default: demo project)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Send commands to a running bridge, e.g. http://127.0.0.1:61169
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Output the raw response envelope
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every command with its parameter schema
    Tools,
    /// Command discovery: categories, a category, or one command
    Help { topic: Option<String> },
    /// Run any command by name
    Run {
        name: String,
        /// Parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
    /// Project, transport and selection overview
    Status,
    /// Start playback
    Play,
    /// Stop playback
    Stop,
    /// Move the playhead to a position in beats
    Seek { beats: f64 },
    /// List tracks
    Tracks,
    /// Persisted bridge settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Write the demo project snapshot to a file
    ExportDemo { path: PathBuf },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change the listen host
    SetHost { host: String },
    /// Change the listen port
    SetPort { port: u16 },
}

// ── Command building ─────────────────────────────────────────────

fn build_command(cmd: &Commands) -> (String, Value) {
    match cmd {
        Commands::Help { topic } => ("help".into(), json!({ "topic": topic })),
        Commands::Run { name, params } => {
            let params = params.as_deref().map_or(Value::Null, |text| {
                serde_json::from_str(text).unwrap_or_else(|e| {
                    eprintln!("Error: --params is not valid JSON: {e}");
                    process::exit(2);
                })
            });
            (name.clone(), params)
        }
        Commands::Status => ("status".into(), Value::Null),
        Commands::Play => ("transport_start".into(), Value::Null),
        Commands::Stop => ("transport_stop".into(), Value::Null),
        Commands::Seek { beats } => ("set_playback_position".into(), json!({ "beats": beats })),
        Commands::Tracks => ("list_tracks".into(), Value::Null),
        // Handled before dispatch
        Commands::Tools | Commands::Config { .. } | Commands::ExportDemo { .. } => {
            unreachable!("not a dispatched command")
        }
    }
}

// ── Local / remote execution ─────────────────────────────────────

fn initialize_state(config_dir: &Path, project: Option<&Path>) -> AppState {
    let settings = settings::load_or_default(config_dir);
    let snapshot = match project.or(settings.project_file.as_deref()) {
        Some(path) => load_project(path).unwrap_or_else(|e| {
            eprintln!("Error: failed to load project {}: {e}", path.display());
            process::exit(1);
        }),
        None => demo_project(),
    };
    let catalog_path = paths::device_catalog_path(config_dir);
    let catalog = if catalog_path.exists() {
        DeviceCatalog::load(&catalog_path).unwrap_or_else(|e| {
            eprintln!("Error: failed to load device catalog: {e}");
            process::exit(1);
        })
    } else {
        DeviceCatalog::builtin().expect("bundled device catalog is valid JSON")
    };
    AppState::new(Arc::new(MemoryStudio::new(snapshot)), Arc::new(catalog))
}

fn client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("HTTP client")
}

fn remote_call(base: &str, name: &str, params: &Value) -> WireResponse {
    let url = format!("{}/api/tools/{name}", base.trim_end_matches('/'));
    let response = client().post(&url).json(params).send().unwrap_or_else(|e| {
        eprintln!("Error: request to {url} failed: {e}");
        process::exit(1);
    });
    response.json::<WireResponse>().unwrap_or_else(|e| {
        eprintln!("Error: {url} did not answer with a response envelope: {e}");
        process::exit(1);
    })
}

fn remote_tools(base: &str) -> Value {
    let url = format!("{}/api/tools", base.trim_end_matches('/'));
    let envelope: WireResponse = client()
        .get(&url)
        .send()
        .and_then(reqwest::blocking::Response::json::<WireResponse>)
        .unwrap_or_else(|e| {
            eprintln!("Error: request to {url} failed: {e}");
            process::exit(1);
        });
    envelope.into_result().unwrap_or_else(|e| {
        eprintln!("Error: {}: {}", e.code, e.message);
        process::exit(1);
    })
}

// ── Output formatting ────────────────────────────────────────────

fn print_value(data: &Value) {
    match data {
        Value::Null => {}
        Value::String(text) => println!("{text}"),
        Value::Array(_) | Value::Object(_) => {
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
        }
        other => println!("{other}"),
    }
}

fn print_response(response: WireResponse, message: Option<&str>, raw_json: bool) {
    if raw_json {
        println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
        if !response.is_success() {
            process::exit(1);
        }
        return;
    }

    match response.into_result() {
        Ok(data) => {
            if let Some(text) = data.get("help").and_then(Value::as_str) {
                println!("{text}");
                return;
            }
            if let Some(message) = message {
                println!("{message}");
            }
            print_value(&data);
        }
        Err(e) => {
            eprintln!("Error: {}: {} ({})", e.code, e.message, e.operation);
            process::exit(1);
        }
    }
}

// ── Config ───────────────────────────────────────────────────────

fn run_config(config_dir: &Path, action: &ConfigAction, raw_json: bool) {
    let mut current: BridgeSettings = settings::load_settings(config_dir)
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(1);
        })
        .unwrap_or_default();

    match action {
        ConfigAction::Show => {}
        ConfigAction::SetHost { host } => current.host.clone_from(host),
        ConfigAction::SetPort { port } => current.port = *port,
    }
    if !matches!(action, ConfigAction::Show) {
        settings::save_settings(config_dir, &current).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(1);
        });
    }

    if raw_json {
        println!("{}", serde_json::to_string_pretty(&current).unwrap_or_default());
    } else {
        println!("Settings file: {}", paths::settings_path(config_dir).display());
        println!("Listen address: {}", current.listener_config());
        println!("Restart delay: {} ms", current.restart_delay_ms);
        println!("Audit log: {}", if current.audit { "on" } else { "off" });
    }
}

// ── Main ─────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let config_dir = cli.config_dir.clone().unwrap_or_else(paths::default_config_dir);
    let raw = cli.json;

    if let Err(e) = init_logging(LoggingMode::Cli, None) {
        eprintln!("Warning: {e}");
    }

    match &cli.command {
        Commands::Config { action } => {
            run_config(&config_dir, action, raw);
            return;
        }
        Commands::ExportDemo { path } => {
            save_project(path, &demo_project()).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                process::exit(1);
            });
            println!("Demo project written to {}", path.display());
            return;
        }
        Commands::Tools => {
            let tools = match &cli.remote {
                Some(base) => remote_tools(base),
                None => {
                    let state = initialize_state(&config_dir, cli.project.as_deref());
                    catalog::to_json_schema(&state.registry)
                }
            };
            print_value(&tools);
            return;
        }
        _ => {}
    }

    let (name, params) = build_command(&cli.command);
    match &cli.remote {
        Some(base) => print_response(remote_call(base, &name, &params), None, raw),
        None => {
            let state = initialize_state(&config_dir, cli.project.as_deref());
            let outcome = execute::execute(&state, &name, &params);
            let message = outcome.as_ref().ok().map(|o| o.message.clone());
            let response = studio_bridge::envelope::wrap(outcome.map(|o| o.data));
            print_response(response, message.as_deref(), raw);
        }
    }
}
