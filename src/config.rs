//! Optional TOML configuration for the loaders.
//!
//! Every setting defaults to the values the loaders were written for; a
//! config file only needs the keys it wants to override.

use anyhow::{Context, Result};
use geo::{coord, Polygon, Rect};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://postgres:0@localhost:5432/postgres";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub region: RegionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Axis-aligned clip rectangle, in EPSG:6668 coordinates. The default covers
/// the Toyama survey area shared by the employee and population loaders.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RegionConfig {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            x_min: 137.011029079,
            y_min: 36.646053135,
            x_max: 137.180130220,
            y_max: 36.793910577,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Defaults unless a file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}

impl RegionConfig {
    pub fn to_polygon(self) -> Polygon<f64> {
        Rect::new(
            coord! { x: self.x_min, y: self.y_min },
            coord! { x: self.x_max, y: self.y_max },
        )
        .to_polygon()
    }
}
