//! # Command Line Interface
//!
//! Plans, applies, imports and destroys the CA configuration of an SSH
//! secrets engine mount, keeping one state file per mount.

pub mod config;
pub mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::backend::VaultHttpBackend;
use crate::config::ClientSettings;
use crate::observability::{init_logging, log_settings_info, LogFormat};
use crate::resource::schema::{attributes_for, CURRENT_SCHEMA_VERSION};
use crate::resource::{verify_all, CaConfigInput, CaState, MountPath, Reconciler};
use crate::secrets::SecretString;
use crate::state::FileStateStore;
use output::{print_output, OutputFormat, ReadView, StateView};

#[derive(Parser)]
#[command(name = "vault-ssh-ca")]
#[command(about = "Reconcile the signing CA of a Vault SSH secrets engine mount")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Output format for command results
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Backend address
    #[arg(long, global = true)]
    pub address: Option<String>,

    /// Backend token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Backend namespace
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Directory holding state files
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Config file to use instead of ~/.vault-ssh-ca/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show what applying a CA configuration file would change
    Plan {
        /// TOML or JSON file describing the CA
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Converge the backend on a CA configuration file
    Apply {
        /// TOML or JSON file describing the CA
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Read the CA the backend reports for a mount
    Read {
        /// Mount path of the SSH secrets engine
        backend: String,
    },

    /// Import an existing CA into local state
    Import {
        /// Mount path of the SSH secrets engine
        backend: String,
    },

    /// Delete a CA and verify it is gone
    Destroy {
        /// Mount path of the SSH secrets engine
        backend: String,
    },

    /// Check that no CA is configured at the given mounts
    VerifyDestroyed {
        /// Mount paths; defaults to every mount with stored state
        backends: Vec<String>,
    },

    /// Upgrade stored state to the current schema version
    UpgradeState {
        /// Mount paths; defaults to every mount with stored state
        backends: Vec<String>,
    },

    /// Print the resource attribute schema
    Schema {
        /// Schema version to print
        #[arg(long, default_value_t = CURRENT_SCHEMA_VERSION)]
        schema_version: u64,
    },
}

/// Run CLI commands
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    let settings = config::resolve_settings(
        config::SettingsOverrides {
            address: cli.address,
            token: cli.token.map(SecretString::new),
            namespace: cli.namespace,
            timeout: cli.timeout,
            state_dir: cli.state_dir,
        },
        cli.config.as_deref(),
    )?;
    log_settings_info(&settings);

    let store = FileStateStore::new(&settings.state_dir);
    let format = cli.output;

    match cli.command {
        Commands::Plan { file } => {
            let input = load_input(&file)?;
            let mount = MountPath::new(&input.backend)?;
            let prior = store.load(&mount)?;
            let plan = reconciler(&settings)?.plan(&input, prior.as_ref()).await?;
            print_output(&plan, format)?;
        }

        Commands::Apply { file } => {
            let input = load_input(&file)?;
            let mount = MountPath::new(&input.backend)?;
            let prior = store.load(&mount)?;
            let outcome = reconciler(&settings)?.apply(&input, prior.as_ref()).await?;
            let path = store.save(&outcome.state)?;
            info!(
                backend = %mount,
                action = %outcome.plan.action,
                path = %path.display(),
                "Applied CA configuration"
            );
            print_output(&StateView::from(&outcome.state), format)?;
        }

        Commands::Read { backend } => {
            let mount = MountPath::new(&backend)?;
            let remote = reconciler(&settings)?.read(&mount).await?;
            print_output(&ReadView::new(mount.as_str(), remote), format)?;
        }

        Commands::Import { backend } => {
            let state = import_into_store(&reconciler(&settings)?, &store, &backend).await?;
            print_output(&StateView::from(&state), format)?;
        }

        Commands::Destroy { backend } => {
            let mount = MountPath::new(&backend)?;
            reconciler(&settings)?.destroy(&mount).await?;
            store.remove(&mount)?;
            println!("CA for backend \"{}\" destroyed", mount);
        }

        Commands::VerifyDestroyed { backends } => {
            let mounts = mounts_or_stored(backends, &store)?;
            let reconciler = reconciler(&settings)?;
            verify_all(reconciler.backend(), &mounts).await?;
            println!("No CA configured at {} mount(s)", mounts.len());
        }

        Commands::UpgradeState { backends } => {
            let mut upgraded = Vec::new();
            for mount in mounts_or_stored(backends, &store)? {
                if let Some(state) = store.load(&mount)? {
                    upgraded.push(StateView::from(&state));
                }
            }
            print_output(&upgraded, format)?;
        }

        Commands::Schema { schema_version } => {
            print_output(&attributes_for(schema_version)?, format)?;
        }
    }

    Ok(())
}

fn reconciler(settings: &ClientSettings) -> Result<Reconciler> {
    Ok(Reconciler::new(Arc::new(VaultHttpBackend::new(settings)?)))
}

fn mounts_or_stored(backends: Vec<String>, store: &FileStateStore) -> Result<Vec<MountPath>> {
    if backends.is_empty() {
        return Ok(store.list()?);
    }
    backends.iter().map(|backend| MountPath::new(backend).map_err(anyhow::Error::from)).collect()
}

/// Import the CA at `backend` and store it.
///
/// Refuses mounts that already have stored state: the stored write-only
/// attributes cannot be recovered from the backend.
async fn import_into_store(
    reconciler: &Reconciler,
    store: &FileStateStore,
    backend: &str,
) -> Result<CaState> {
    let mount = MountPath::new(backend)?;
    if store.load_record(&mount)?.is_some() {
        bail!(
            "CA for backend \"{}\" is already managed in {}; destroy it or remove the state \
             file before importing",
            mount,
            store.path_for(&mount).display()
        );
    }

    let state = reconciler.import(mount.as_str()).await?;
    store.save(&state)?;
    Ok(state)
}

/// Parse a CA configuration file; `.json` files are JSON, anything else TOML
pub fn load_input(path: &Path) -> Result<CaConfigInput> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CA configuration: {}", path.display()))?;

    if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse CA configuration: {}", path.display()))
    } else {
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse CA configuration: {}", path.display()))
    }
}
