use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rankshelf::api::{self, AppState, SecurityConfig};
use rankshelf::config::{DatabaseArgs, EngineArgs, EngineConfig};
use rankshelf::db;

#[derive(Parser)]
#[command(name = "rankshelf")]
#[command(about = "Rate books by comparing them with the ones you already rated")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the RankShelf server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, env = "RANKSHELF_PORT", default_value = "3000")]
        port: u16,

        #[command(flatten)]
        database: DatabaseArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Apply pending database migrations and exit
    Migrate {
        #[command(flatten)]
        database: DatabaseArgs,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "rankshelf=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(args: DatabaseArgs) -> anyhow::Result<db::Database> {
    let db = match args.database {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(port: u16, db: db::Database, config: EngineConfig) -> anyhow::Result<()> {
    rankshelf::rating::band::validate_partition()?;

    let security = SecurityConfig::from_env();
    if security.api_key.is_none() {
        tracing::warn!("RANKSHELF_API_KEY not set, API authentication disabled");
    }

    let app = api::create_router_with_security(AppState::new(db, &config), security);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(
        selection = ?config.selection,
        "RankShelf server listening on http://127.0.0.1:{}",
        port
    );

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve {
            port,
            database,
            engine,
        }) => {
            tracing::info!("Starting RankShelf server on port {}", port);
            let db = open_database(database)?;
            serve(port, db, engine.into()).await?;
        }
        Some(Commands::Migrate { database }) => {
            open_database(database)?;
            println!("Database is up to date");
        }
        None => {
            tracing::info!("Starting RankShelf server on port 3000");
            let db = open_database(DatabaseArgs { database: None })?;
            serve(3000, db, EngineConfig::default()).await?;
        }
    }

    Ok(())
}
