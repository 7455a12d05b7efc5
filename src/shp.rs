//! Shapefile reading.

use anyhow::{anyhow, Context, Result};
use geo::Geometry;
use shapefile::dbase::FieldValue;
use std::path::Path;
use tracing::debug;

use crate::crs::Crs;
use crate::table::{FeatureTable, Value};

/// Read a shapefile (`.shp` + `.dbf` + `.prj`) into a `FeatureTable`.
///
/// Attribute columns come out in sorted field-name order; dbase records do
/// not preserve field order. The geometry column is named `geometry` until
/// renamed by the caller. Fails if the `.prj` sidecar is missing or names an
/// unrecognized projection.
pub fn read_shapefile(path: impl AsRef<Path>) -> Result<FeatureTable> {
    let path = path.as_ref();
    let crs = Crs::from_prj_file(&path.with_extension("prj"))?;

    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("failed to open shapefile '{}'", path.display()))?;

    let mut features = Vec::new();
    for pair in reader.iter_shapes_and_records() {
        let (shape, record) =
            pair.with_context(|| format!("failed to read feature from '{}'", path.display()))?;
        features.push((shape, record));
    }

    let mut columns: Vec<String> = match features.first() {
        Some((_, record)) => record.clone().into_iter().map(|(name, _)| name).collect(),
        None => Vec::new(),
    };
    columns.sort();

    let mut table = FeatureTable::new(columns.clone(), crs);
    for (shape, record) in features {
        let geom = Geometry::<f64>::try_from(shape)
            .map_err(|e| anyhow!("unsupported geometry in '{}': {e}", path.display()))?;
        let row = columns
            .iter()
            .map(|name| record.get(name).cloned().map_or(Value::Null, field_value))
            .collect();
        table.push_feature(row, geom)?;
    }

    debug!("read {} features from {}", table.len(), path.display());
    Ok(table)
}

fn field_value(v: FieldValue) -> Value {
    match v {
        FieldValue::Character(Some(s)) => Value::Text(s),
        FieldValue::Numeric(Some(n)) => Value::Float(n),
        FieldValue::Float(Some(f)) => Value::Float(f64::from(f)),
        FieldValue::Integer(i) => Value::Int(i),
        FieldValue::Double(d) => Value::Float(d),
        FieldValue::Currency(c) => Value::Float(c),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        FieldValue::Date(Some(d)) => {
            Value::Text(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        FieldValue::Memo(s) => Value::Text(s),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::dbase::{FieldName, Record, TableWriterBuilder};
    use shapefile::{Point, Polygon, PolygonRing};
    use std::fs;
    use std::path::PathBuf;

    const JGD2011_WKT: &str = "GEOGCS[\"GCS_JGD_2011\",DATUM[\"D_JGD_2011\",\
        SPHEROID[\"GRS_1980\",6378137.0,298.257222101]],PRIMEM[\"Greenwich\",0.0],\
        UNIT[\"Degree\",0.0174532925199433]]";

    fn square_ring(x: f64, y: f64, size: f64) -> PolygonRing<Point> {
        // Clockwise, as shapefile outer rings require.
        PolygonRing::Outer(vec![
            Point::new(x, y),
            Point::new(x, y + size),
            Point::new(x + size, y + size),
            Point::new(x + size, y),
            Point::new(x, y),
        ])
    }

    fn write_fixture(dir: &Path) -> PathBuf {
        let shp = dir.join("mesh.shp");
        let builder = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("KEY_CODE").unwrap(), 10);
        let mut writer = shapefile::Writer::from_path(&shp, builder).unwrap();
        for key in ["54370001", "54370002"] {
            let mut record = Record::default();
            record.insert(
                "KEY_CODE".to_string(),
                FieldValue::Character(Some(key.to_string())),
            );
            let ring = square_ring(137.0, 36.6, 0.0125);
            writer
                .write_shape_and_record(&Polygon::new(ring), &record)
                .unwrap();
        }
        drop(writer);
        fs::write(shp.with_extension("prj"), JGD2011_WKT).unwrap();
        shp
    }

    #[test]
    fn reads_features_attributes_and_crs() {
        let dir = tempfile::tempdir().unwrap();
        let shp = write_fixture(dir.path());

        let table = read_shapefile(&shp).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.crs(), Crs::Jgd2011);
        assert_eq!(table.geometry_name(), "geometry");
        assert_eq!(table.attrs().columns(), &["KEY_CODE".to_string()]);
        assert_eq!(
            table.attrs().rows()[0][0],
            Value::Text("54370001".to_string())
        );
        assert!(matches!(table.geoms()[0], Geometry::MultiPolygon(_) | Geometry::Polygon(_)));
    }

    #[test]
    fn fails_without_a_prj_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let shp = write_fixture(dir.path());
        fs::remove_file(shp.with_extension("prj")).unwrap();
        assert!(read_shapefile(&shp).is_err());
    }

    #[test]
    fn fails_on_a_missing_file() {
        assert!(read_shapefile("no-such-file.shp").is_err());
    }
}
