use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use metacopy::config::{Config, DEFAULT_CONFIG_FILE};
use metacopy::database::establish_connection;
use metacopy::database::migrations::{migrate_database, MigrateDirection};
use metacopy::services::{BulkCopyRequest, CopyService};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[clap(short, long, global = true)]
    database_url: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace every target environment's copy of the base collection tree
    Copy {
        #[clap(short, long)]
        root: Option<String>,
        #[clap(short, long)]
        base: Option<String>,
        /// Target database name prefix; repeat to copy to several
        #[clap(long)]
        only: Vec<String>,
        #[clap(long)]
        dry_run: bool,
    },
    /// Copy one collection subtree into one target database
    CopyCollection {
        #[clap(long)]
        collection: i32,
        #[clap(short, long)]
        target: String,
        #[clap(long)]
        dry_run: bool,
    },
    /// Copy one card into one target database
    CopyCard {
        #[clap(long)]
        card: i32,
        #[clap(short, long)]
        target: String,
        #[clap(long)]
        dry_run: bool,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Create the Metabase tables metacopy works on
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let config = Config::load(&args.config)?.with_database_url(args.database_url);
    let database_url = config.database_url();
    let db = establish_connection(&database_url, config.max_connections)
        .await
        .with_context(|| format!("Failed to connect to {}", database_url))?;

    match args.command {
        Commands::Copy {
            root,
            base,
            only,
            dry_run,
        } => {
            let request = BulkCopyRequest {
                root: root
                    .or_else(|| config.root.clone())
                    .context("No root collection given; pass --root or set `root` in the config")?,
                base: base
                    .or_else(|| config.base.clone())
                    .context("No base environment given; pass --base or set `base` in the config")?,
                only: if only.is_empty() { config.only.clone() } else { only },
                dry_run,
            };
            info!("Copying '{}' within '{}'", request.base, request.root);
            let service = CopyService::new(db, config.copy_settings());
            let report = service.bulk_copy(&request).await?;
            for (target, collection_id) in &report.copies {
                println!("{}\t{}", target.label, collection_id);
            }
        }
        Commands::CopyCollection {
            collection,
            target,
            dry_run,
        } => {
            info!("Copying collection {} to {}", collection, target);
            let service = CopyService::new(db, config.copy_settings());
            let new_id = service.copy_collection(collection, &target, dry_run).await?;
            println!("{}", new_id);
        }
        Commands::CopyCard {
            card,
            target,
            dry_run,
        } => {
            info!("Copying card {} to {}", card, target);
            let service = CopyService::new(db, config.copy_settings());
            let new_id = service.copy_card(card, &target, dry_run).await?;
            println!("{}", new_id);
        }
        Commands::Db { command } => match command {
            DbCommands::Init => {
                info!("Initializing database: {}", database_url);
                migrate_database(&db, MigrateDirection::Up).await?;
            }
            DbCommands::Migrate { direction } => {
                info!("Running database migration: {:?}", direction);
                migrate_database(&db, direction).await?;
            }
        },
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
