//! Population loader.
//!
//! Reads one population-by-mesh-cell shapefile, renames the geometry column,
//! reprojects to JGD2011, clips to the survey region and replaces the
//! `population` table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use meshload::shp::read_shapefile;
use meshload::{Config, Crs, PgWriter};

#[derive(Parser, Debug)]
#[command(name = "load-population")]
#[command(about = "Load a mesh-cell population shapefile into PostGIS")]
struct Args {
    /// Population mesh shapefile to load
    #[arg(short, long, default_value = "Mesh4_POP_16.shp")]
    file: PathBuf,

    /// Destination table name
    #[arg(long, default_value = "population")]
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

    info!("Loading population cells from {}", args.file.display());
    let mut cells = read_shapefile(&args.file)
        .with_context(|| format!("failed to load '{}'", args.file.display()))?;
    info!("Read {} features in {}", cells.len(), cells.crs());

    cells.rename_geometry("geom");
    cells.to_crs(Crs::Jgd2011)?;

    cells.retain_intersecting(&config.region.to_polygon());
    info!("{} rows intersect the survey region", cells.len());

    let writer = PgWriter::connect(&database_url).await?;
    let written = writer.replace_table(&args.table, &cells).await?;
    info!("Replaced table '{}' with {} rows", args.table, written);

    Ok(())
}
