//! Search Sync Main Entry Point
//!
//! Command-line entry point for the search sync engine. Reads source records
//! from JSON-lines files and keeps the OpenSearch indices of every registered
//! entity type current.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `search-sync setup <entity>\|--all` | Create the index and aliases of an entity type |
//! | `search-sync sync <entity> --all` | Re-index every record of an entity type |
//! | `search-sync sync <entity> --ids a,b,c` | Re-index the given records |
//! | `search-sync sync-related <entity> <field> <id>` | Re-index records referencing it |
//! | `search-sync delete <entity> --ids a,b,c` | Remove documents from the index |
//! | `search-sync migrate <entity>\|--all` | Move entity types onto their current schema |
//! | `search-sync status [<entity>]` | Show the alias state of entity types |
//!
//! Exit code 0 on success, 1 when a batch permanently failed, 2 on a
//! configuration or alias fault.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use search_sync::{
    Dependencies, IndexingError, MigrationOutcome, Settings, SyncError, SyncReport,
};
use search_sync_repository::SetupOutcome;
use search_sync_shared::EntityDescriptor;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_BATCH_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(
    name = "search-sync",
    about = "Sync source records into OpenSearch and migrate index schemas",
    version
)]
struct Cli {
    /// Directory of `{entity}.jsonl` source files. Overrides SYNC_SOURCE_DIR.
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Prefix of index and alias names. Overrides SEARCH_INDEX_PREFIX.
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// OpenSearch URL. Overrides OPENSEARCH_URL.
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the physical index and both aliases of an entity type.
    Setup {
        #[arg(required_unless_present = "all")]
        entity: Option<String>,

        /// Set up every registered entity type.
        #[arg(long, conflicts_with = "entity")]
        all: bool,
    },

    /// Re-index records of an entity type.
    Sync {
        entity: String,

        /// Re-index the whole table.
        #[arg(long, conflicts_with = "ids", required_unless_present = "ids")]
        all: bool,

        /// Comma-separated record ids.
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// Re-index the records whose relation field points at a changed related record.
    SyncRelated {
        entity: String,

        /// Relation field of the entity, e.g. `company`.
        field: String,

        /// Id of the related record that changed.
        related_id: String,
    },

    /// Remove documents by record id.
    Delete {
        entity: String,

        /// Comma-separated record ids.
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },

    /// Bring entity types onto their current schema, backfilling a new index if needed.
    Migrate {
        #[arg(required_unless_present = "all")]
        entity: Option<String>,

        /// Migrate every registered entity type.
        #[arg(long, conflicts_with = "entity")]
        all: bool,
    },

    /// Show the alias state of one or all entity types.
    Status { entity: Option<String> },
}

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("search_sync=info,search_sync_repository=info"));

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();
    }

    info!(
        service_name = "search-sync",
        service_version = env!("CARGO_PKG_VERSION"),
        json,
        "Tracing initialized"
    );
}

/// Whether every batch of a command reached the cluster.
type CommandResult = Result<bool, IndexingError>;

fn selected(
    deps: &Dependencies,
    entity: Option<&str>,
) -> Result<Vec<Arc<EntityDescriptor>>, IndexingError> {
    match entity {
        Some(name) => Ok(vec![deps.registry.get(name).map_err(SyncError::from)?]),
        None => Ok(deps.registry.iter().cloned().collect()),
    }
}

fn print_report(report: &SyncReport) -> bool {
    println!("{}", report);
    report.is_success()
}

/// Keep going over entity types after an error, then surface the worst one.
fn worst_error(errors: Vec<IndexingError>) -> Result<(), IndexingError> {
    let mut errors = errors;
    match errors.iter().position(IndexingError::is_fatal) {
        Some(fatal) => Err(errors.swap_remove(fatal)),
        None => errors.pop().map_or(Ok(()), Err),
    }
}

async fn setup(deps: &Dependencies, entity: Option<&str>) -> CommandResult {
    let mut errors: Vec<IndexingError> = Vec::new();
    for descriptor in selected(deps, entity)? {
        match deps.lifecycle.set_up_index_and_aliases(&descriptor).await {
            Ok(SetupOutcome::Created(index)) => {
                println!("{}: created {}", descriptor.name(), index)
            }
            Ok(SetupOutcome::AlreadyPresent(index)) => {
                println!("{}: already set up ({})", descriptor.name(), index)
            }
            Err(e) => {
                error!(entity = %descriptor.name(), error = %e, "Setup failed");
                errors.push(SyncError::from(e).into());
            }
        }
    }
    worst_error(errors)?;
    Ok(true)
}

async fn migrate(deps: &Dependencies, entity: Option<&str>) -> CommandResult {
    let outcomes = match entity {
        Some(name) => vec![(name.to_string(), deps.migrations.migrate(name).await)],
        None => deps.migrations.migrate_all().await,
    };

    let mut all_written = true;
    let mut errors: Vec<IndexingError> = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(MigrationOutcome::Initialized { index, report }) => {
                println!("{}: initialized {}", name, index);
                all_written &= print_report(&report);
            }
            Ok(MigrationOutcome::UpToDate { index }) => {
                println!("{}: up to date ({})", name, index);
            }
            Ok(MigrationOutcome::Migrated {
                plan,
                report,
                resumed,
            }) => {
                println!(
                    "{}: migrated {} -> {}{}",
                    name,
                    plan.source_index,
                    plan.target_index,
                    if resumed { " (resumed)" } else { "" }
                );
                all_written &= print_report(&report);
            }
            Err(e) => {
                error!(entity = %name, error = %e, "Migration failed");
                errors.push(e.into());
            }
        }
    }
    worst_error(errors)?;
    Ok(all_written)
}

async fn status(deps: &Dependencies, entity: Option<&str>) -> CommandResult {
    let mut errors: Vec<IndexingError> = Vec::new();
    for descriptor in selected(deps, entity)? {
        match deps.lifecycle.inspect(&descriptor).await {
            Ok(state) => println!("{}: {}", descriptor.name(), state),
            Err(e) => {
                println!("{}: error: {}", descriptor.name(), e);
                errors.push(SyncError::from(e).into());
            }
        }
    }
    worst_error(errors)?;
    Ok(true)
}

async fn run(command: Commands, deps: &Dependencies) -> CommandResult {
    match command {
        Commands::Setup { entity, .. } => setup(deps, entity.as_deref()).await,
        Commands::Sync { entity, all, ids } => {
            let report = if all {
                deps.orchestrator.sync_all(&entity).await?
            } else {
                deps.orchestrator.sync(&entity, &ids).await?
            };
            Ok(print_report(&report))
        }
        Commands::SyncRelated {
            entity,
            field,
            related_id,
        } => {
            let report = deps
                .orchestrator
                .sync_related(&entity, &field, &related_id)
                .await?;
            Ok(print_report(&report))
        }
        Commands::Delete { entity, ids } => {
            let report = deps.orchestrator.delete(&entity, &ids).await?;
            Ok(print_report(&report))
        }
        Commands::Migrate { entity, .. } => migrate(deps, entity.as_deref()).await,
        Commands::Status { entity } => status(deps, entity.as_deref()).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    init_tracing();

    info!("Starting search sync");

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    if let Some(source_dir) = cli.source_dir {
        settings.source_dir = source_dir;
    }
    if let Some(prefix) = cli.prefix {
        settings.index_prefix = prefix;
    }
    if let Some(url) = cli.url {
        settings.opensearch_url = url;
    }

    let deps = match Dependencies::new(&settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match run(cli.command, &deps).await {
        Ok(true) => {
            info!("Search sync completed successfully");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            error!("Search sync completed with failed batches");
            ExitCode::from(EXIT_BATCH_FAILED)
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Search sync stopped on a fatal fault");
            ExitCode::from(EXIT_FATAL)
        }
        Err(e) => {
            error!(error = %e, "Search sync failed");
            ExitCode::from(EXIT_BATCH_FAILED)
        }
    }
}
