//! Meshload - batch loaders for Japanese statistical geodata into PostGIS
//!
//! This library provides the shared pieces of the three loader binaries:
//! vector and tabular file readers, attribute-table transforms, reprojection
//! to JGD2011, and the PostGIS bulk writer.

pub mod config;
pub mod crs;
pub mod postgis;
pub mod shp;
pub mod table;
pub mod tabular;

pub use config::Config;
pub use crs::Crs;
pub use postgis::PgWriter;
pub use table::{AttrTable, FeatureTable, Value};
