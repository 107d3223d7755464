mod tabulate;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "billboard-cli")]
#[command(about = "Billboard engine operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Recompute the counters of a single billboard
    Tabulate {
        /// Billboard id
        billboard_id: i64,
        /// Bypass the impression-based sampling gate
        #[arg(long)]
        force: bool,
    },
    /// Recompute the counters of every billboard
    TabulateAll {
        /// Bypass the impression-based sampling gate
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("billboard-cli: no command given (try --help)");
        return Ok(());
    };

    let config = billboard_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = billboard_db::PoolConfig::from_app_config(&config);
    let pool = billboard_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = billboard_db::run_migrations(&pool).await?;
            println!("applied {applied} new migration(s)");
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            billboard_db::ping(&pool).await?;
            println!("database ok");
        }
        Commands::Tabulate {
            billboard_id,
            force,
        } => tabulate::run_tabulate(&pool, &config, billboard_id, force).await?,
        Commands::TabulateAll { force } => {
            tabulate::run_tabulate_all(&pool, &config, force).await?;
        }
    }

    Ok(())
}
