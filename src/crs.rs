//! Coordinate reference systems for Japanese government shapefiles.
//!
//! Sources declare their CRS through an ESRI WKT `.prj` sidecar; the datum
//! keyword is enough to tell the handful of systems that occur in national
//! boundary and mesh deliveries apart. All transforms go through `proj4rs`
//! with towgs84 datum shifts.

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, Geometry, MapCoords};
use proj4rs::Proj;
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// JGD2011 geographic (EPSG:6668), the target CRS for every loader.
    Jgd2011,
    /// JGD2000 geographic (EPSG:4612), common in e-Stat mesh deliveries.
    Jgd2000,
    /// Tokyo datum (EPSG:4301), found in older national datasets.
    Tokyo,
    /// WGS 84 (EPSG:4326).
    Wgs84,
}

impl Crs {
    pub fn epsg(self) -> u32 {
        match self {
            Crs::Jgd2011 => 6668,
            Crs::Jgd2000 => 4612,
            Crs::Tokyo => 4301,
            Crs::Wgs84 => 4326,
        }
    }

    // JGD2011 is within millimetres of JGD2000 outside the 2011 earthquake
    // deformation zone, so both carry a zero shift to WGS84.
    fn proj_string(self) -> &'static str {
        match self {
            Crs::Jgd2011 | Crs::Jgd2000 => {
                "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs"
            }
            Crs::Tokyo => {
                "+proj=longlat +ellps=bessel +towgs84=-146.414,507.337,680.507,0,0,0,0 +no_defs"
            }
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs",
        }
    }

    /// Recognize the CRS from the WKT of a `.prj` sidecar by datum keyword.
    pub fn from_prj_wkt(wkt: &str) -> Result<Self> {
        let upper = wkt.to_ascii_uppercase();
        if upper.contains("JGD_2011") || upper.contains("JGD2011") {
            Ok(Crs::Jgd2011)
        } else if upper.contains("JGD_2000") || upper.contains("JGD2000") {
            Ok(Crs::Jgd2000)
        } else if upper.contains("TOKYO") {
            Ok(Crs::Tokyo)
        } else if upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84")
        {
            Ok(Crs::Wgs84)
        } else {
            bail!("unrecognized projection: {}", wkt.trim())
        }
    }

    pub fn from_prj_file(path: &Path) -> Result<Self> {
        let wkt = fs::read_to_string(path)
            .with_context(|| format!("failed to read projection file '{}'", path.display()))?;
        Self::from_prj_wkt(&wkt)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Coordinate transformer between two geographic CRS.
pub struct Transformer {
    src: Proj,
    dst: Proj,
}

impl Transformer {
    pub fn new(src: Crs, dst: Crs) -> Result<Self> {
        let build = |crs: Crs| {
            Proj::from_proj_string(crs.proj_string())
                .map_err(|e| anyhow!("failed to initialize {crs}: {e}"))
        };
        Ok(Self {
            src: build(src)?,
            dst: build(dst)?,
        })
    }

    /// Transform one coordinate. Both ends are geographic, so proj4rs works
    /// in radians and degrees are converted at the boundary.
    pub fn transform_coord(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = (c.x.to_radians(), c.y.to_radians(), 0.0);
        proj4rs::transform::transform(&self.src, &self.dst, &mut point)
            .map_err(|e| anyhow!("coordinate transform failed at ({}, {}): {e}", c.x, c.y))?;
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }

    pub fn transform_geometry(&self, geom: &Geometry<f64>) -> Result<Geometry<f64>> {
        geom.try_map_coords(|c| self.transform_coord(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JGD2011_WKT: &str = "GEOGCS[\"GCS_JGD_2011\",DATUM[\"D_JGD_2011\",\
        SPHEROID[\"GRS_1980\",6378137.0,298.257222101]],PRIMEM[\"Greenwich\",0.0],\
        UNIT[\"Degree\",0.0174532925199433]]";
    const JGD2000_WKT: &str = "GEOGCS[\"JGD2000\",DATUM[\"Japanese_Geodetic_Datum_2000\",\
        SPHEROID[\"GRS 1980\",6378137,298.257222101]],PRIMEM[\"Greenwich\",0],\
        UNIT[\"degree\",0.0174532925199433]]";
    const TOKYO_WKT: &str = "GEOGCS[\"GCS_Tokyo\",DATUM[\"D_Tokyo\",\
        SPHEROID[\"Bessel_1841\",6377397.155,299.1528128]],PRIMEM[\"Greenwich\",0.0],\
        UNIT[\"Degree\",0.0174532925199433]]";

    #[test]
    fn recognizes_prj_datums() {
        assert_eq!(Crs::from_prj_wkt(JGD2011_WKT).unwrap(), Crs::Jgd2011);
        assert_eq!(Crs::from_prj_wkt(JGD2000_WKT).unwrap(), Crs::Jgd2000);
        assert_eq!(Crs::from_prj_wkt(TOKYO_WKT).unwrap(), Crs::Tokyo);
        assert_eq!(
            Crs::from_prj_wkt("GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\"]]").unwrap(),
            Crs::Wgs84
        );
        assert!(Crs::from_prj_wkt("PROJCS[\"OSGB_1936\"]").is_err());
    }

    #[test]
    fn jgd2000_to_jgd2011_is_the_identity() {
        let t = Transformer::new(Crs::Jgd2000, Crs::Jgd2011).unwrap();
        let c = t.transform_coord(Coord { x: 137.1, y: 36.7 }).unwrap();
        assert!((c.x - 137.1).abs() < 1e-9);
        assert!((c.y - 36.7).abs() < 1e-9);
    }

    #[test]
    fn tokyo_to_jgd2011_applies_a_datum_shift() {
        let t = Transformer::new(Crs::Tokyo, Crs::Jgd2011).unwrap();
        let c = t.transform_coord(Coord { x: 137.1, y: 36.7 }).unwrap();
        // The Tokyo datum sits several hundred metres from JGD2011 around
        // central Honshu, i.e. a shift of a few millidegrees on each axis.
        let dx = (c.x - 137.1).abs();
        let dy = (c.y - 36.7).abs();
        assert!(dx > 5e-4 && dx < 5e-2, "unexpected lon shift {dx}");
        assert!(dy > 5e-4 && dy < 5e-2, "unexpected lat shift {dy}");
    }
}
