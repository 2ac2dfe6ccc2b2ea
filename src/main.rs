use clap::Parser;
use miette::{IntoDiagnostic, Result};
use migration::MigratorTrait;
use tracing_subscriber::{fmt, EnvFilter};

use umbra::{settings, storage, web};

#[derive(Parser, Debug)]
#[command(name = "umbra", version, about = "Field visibility decision service")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database)
    let db = storage::init(&settings.database).await?;
    migration::Migrator::up(&db, None).await.into_diagnostic()?;

    // seed the default catalog on first run
    ensure_default_catalog(&db).await?;

    // start web server
    web::serve(settings, db).await?;
    Ok(())
}

async fn ensure_default_catalog(db: &sea_orm::DatabaseConnection) -> Result<()> {
    if !storage::list_levels(db).await?.is_empty() {
        return Ok(());
    }

    for (name, rank) in [("public", 0u32), ("internal", 10), ("sensitive", 20)] {
        storage::create_level(db, name, rank, None).await?;
    }
    for (group, level) in [
        ("*", "public"),
        ("user", "public"),
        ("lab_member", "internal"),
        ("pi", "sensitive"),
    ] {
        storage::set_group_max_level(db, group, level).await?;
    }

    tracing::info!("Seeded default visibility levels and group assignments");
    Ok(())
}
