//! Administrative-boundary loader.
//!
//! Reads one national boundary shapefile, renames the geometry column,
//! reprojects to JGD2011 and replaces the `city` table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use meshload::shp::read_shapefile;
use meshload::{Config, Crs, PgWriter};

#[derive(Parser, Debug)]
#[command(name = "load-city")]
#[command(about = "Load an administrative-boundary shapefile into PostGIS")]
struct Args {
    /// Boundary shapefile to load
    #[arg(short, long, default_value = "N03-20240101.shp")]
    file: PathBuf,

    /// Destination table name
    #[arg(long, default_value = "city")]
    table: String,

    /// Database connection URL (overrides the config file)
    #[arg(long)]
    database_url: Option<String>,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let database_url = args.database_url.unwrap_or(config.database.url);

    info!("Loading boundaries from {}", args.file.display());
    let mut boundaries = read_shapefile(&args.file)
        .with_context(|| format!("failed to load '{}'", args.file.display()))?;
    info!("Read {} features in {}", boundaries.len(), boundaries.crs());

    boundaries.rename_geometry("geom");
    boundaries.to_crs(Crs::Jgd2011)?;

    let writer = PgWriter::connect(&database_url).await?;
    let written = writer.replace_table(&args.table, &boundaries).await?;
    info!("Replaced table '{}' with {} rows", args.table, written);

    Ok(())
}
