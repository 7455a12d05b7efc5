//! Delimited-text reading.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::table::{AttrTable, Value};

/// Read a headered CSV into an `AttrTable`. Every cell starts out as text
/// (empty cells as null); integer casts are applied later by the caller.
pub fn read_csv_table(path: impl AsRef<Path>) -> Result<AttrTable> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;

    let columns: Vec<String> = reader
        .headers()
        .with_context(|| format!("failed to read the header of '{}'", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut table = AttrTable::new(columns);
    for (i, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("failed to parse '{}' line {}", path.display(), i + 2))?;
        let row = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::Text(cell.to_string())
                }
            })
            .collect();
        table.push_row(row)?;
    }

    debug!("read {} rows from {}", table.len(), path.display());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "KEY_CODE,全産業事業所数,全産業従業者数").unwrap();
        writeln!(file, "54370001,12,345").unwrap();
        writeln!(file, "54370002,,0").unwrap();
        drop(file);

        let mut table = read_csv_table(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.columns(),
            &[
                "KEY_CODE".to_string(),
                "全産業事業所数".to_string(),
                "全産業従業者数".to_string(),
            ]
        );
        assert_eq!(table.rows()[1][1], Value::Null);

        table.cast_column_i32("KEY_CODE").unwrap();
        table.cast_column_i32("全産業従業者数").unwrap();
        assert_eq!(table.rows()[0][0], Value::Int(54370001));
        assert_eq!(table.rows()[1][2], Value::Int(0));
    }

    #[test]
    fn fails_on_a_missing_file() {
        assert!(read_csv_table("no-such-file.csv").is_err());
    }
}
