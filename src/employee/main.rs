//! Employment-statistics loader.
//!
//! Reads two mesh-cell count CSVs and the two matching mesh shapefiles,
//! concatenates each pair, joins counts onto geometry by KEY_CODE,
//! reprojects to JGD2011, clips to the survey region and replaces the
//! `employee` table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use meshload::shp::read_shapefile;
use meshload::tabular::read_csv_table;
use meshload::{Config, Crs, PgWriter};

/// Count columns cast to i32 before the join, KEY_CODE first.
const COUNT_COLUMNS: [&str; 3] = ["KEY_CODE", "全産業事業所数", "全産業従業者数"];

#[derive(Parser, Debug)]
#[command(name = "load-employee")]
#[command(about = "Load mesh-cell employment statistics into PostGIS")]
struct Args {
    /// Count CSV for the southern mesh region
    #[arg(long, default_value = "tblT000842H5437.csv")]
    counts_south: PathBuf,

    /// Count CSV for the northern mesh region
    #[arg(long, default_value = "tblT000842H5537.csv")]
    counts_north: PathBuf,

    /// Mesh-cell shapefile for the southern region
    #[arg(long, default_value = "MESH05437.shp")]
    mesh_south: PathBuf,

    /// Mesh-cell shapefile for the northern region
    #[arg(long, default_value = "MESH05537.shp")]
    mesh_north: PathBuf,

    /// Destination table name
    #[arg(long, default_value = "employee")]
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

    let mut counts = read_csv_table(&args.counts_south)?;
    counts.append(read_csv_table(&args.counts_north)?)?;

    let mut cells = read_shapefile(&args.mesh_south)?;
    cells
        .append(read_shapefile(&args.mesh_north)?)
        .context("mesh fragments do not share a schema")?;
    info!("Read {} count rows and {} mesh cells", counts.len(), cells.len());

    for column in COUNT_COLUMNS {
        counts.cast_column_i32(column)?;
    }
    cells.cast_column_i32("KEY_CODE")?;

    let mut employees = cells.inner_join(&counts, "KEY_CODE")?;
    info!("{} mesh cells matched a count row", employees.len());

    employees.rename_geometry("geom");
    employees.to_crs(Crs::Jgd2011)?;

    employees.retain_intersecting(&config.region.to_polygon());
    info!("{} rows intersect the survey region", employees.len());

    let writer = PgWriter::connect(&database_url).await?;
    let written = writer.replace_table(&args.table, &employees).await?;
    info!("Replaced table '{}' with {} rows", args.table, written);

    Ok(())
}
