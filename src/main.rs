//! Time Tracker Server
//!
//! Run with: cargo run -- --config config.toml
//!
//! Without `--config` the server looks for `config.toml` in the user config
//! directory, `/etc/timetracker/` and the working directory, then falls back
//! to defaults. `TIMETRACKER_*` environment variables override the file and
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetracker::auth::{FirebaseAuth, GoogleOAuth, IdentityBackend, LocalAuth};
use timetracker::config::{self, AuthBackend, Config, StorageBackend};
use timetracker::recorder::TimeEntryRecorder;
use timetracker::store::{EntryStore, FirestoreStore, MemoryStore, SqliteStore};
use timetracker::web::{self, AppState, WebConfig};

#[derive(Parser)]
#[command(name = "timetracker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Employee time tracking server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web server (default)
    Serve,

    /// Print a default config file
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Init) = cli.command {
        print!("{}", config::generate_default_config());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config);
    config.validate()?;

    tracing::info!("Starting time tracker v{}", env!("CARGO_PKG_VERSION"));

    let backend = identity_backend(&config)?;
    let store = entry_store(&config)?;
    tracing::info!(
        identity_backend = backend.name(),
        entry_store = store.name(),
        company_id = %config.tenant.company_id,
        "Backends ready"
    );

    let recorder = Arc::new(TimeEntryRecorder::new(store, config.company_id()?));
    let mut state = AppState::new(backend, recorder, WebConfig::from_config(&config));

    match &config.google {
        Some(google) => {
            tracing::info!("Google sign-in enabled");
            let oauth = GoogleOAuth::new(google.oauth_config())
                .context("Failed to create Google OAuth client")?;
            state = state.with_google(oauth);
        }
        None => tracing::info!("Google sign-in disabled (set [google] to enable)"),
    }

    web::serve(state).await?;

    tracing::info!("Time tracker stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("timetracker={},tower_http=info", config.logging.level).into()
    });
    let json = config.logging.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn identity_backend(config: &Config) -> anyhow::Result<Arc<dyn IdentityBackend>> {
    match config.auth.backend {
        AuthBackend::Local => {
            tracing::warn!("Using in-memory accounts; they are lost on restart");
            Ok(Arc::new(LocalAuth::new()))
        }
        AuthBackend::Firebase => {
            let request_uri = match &config.google {
                Some(google) => google.redirect_uri.clone(),
                None => format!(
                    "http://localhost:{}{}",
                    config.server.port, config.server.base_path
                ),
            };
            let auth = FirebaseAuth::new(config.firebase.auth_config(&request_uri))
                .context("Failed to create Firebase identity client")?;
            Ok(Arc::new(auth))
        }
    }
}

fn entry_store(config: &Config) -> anyhow::Result<Arc<dyn EntryStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory entry store; entries are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let path = PathBuf::from(&config.storage.sqlite_path);
            tracing::info!("Entry database: {:?}", path);
            let store = SqliteStore::open(&path)
                .with_context(|| format!("Failed to open entry database {:?}", path))?;
            Ok(Arc::new(store))
        }
        StorageBackend::Firestore => {
            let store = FirestoreStore::new(config.firebase.firestore_config())
                .context("Failed to create Firestore client")?;
            Ok(Arc::new(store))
        }
    }
}
