//! PostGIS bulk writer.
//!
//! Replaces the destination table wholesale inside a single transaction:
//! DROP TABLE IF EXISTS, CREATE TABLE with column types inferred from the
//! data, then chunked multi-row INSERTs with geometries bound as EWKB.
//! Any failure rolls the whole write back.

use anyhow::{anyhow, Context, Result};
use geozero::{CoordDimensions, ToWkb};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::table::{FeatureTable, Value};

/// Rows per INSERT statement, kept well under the Postgres bind limit.
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Int,
    Float,
    Text,
    Bool,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Int => "integer",
            ColumnType::Float => "double precision",
            ColumnType::Text => "text",
            ColumnType::Bool => "boolean",
        }
    }
}

/// PostGIS connection wrapper.
pub struct PgWriter {
    pool: PgPool,
}

impl PgWriter {
    /// Connect with a single-connection pool; the loaders are strictly
    /// sequential.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .context("failed to connect to the database")?;
        Ok(Self { pool })
    }

    /// Drop and recreate `table_name`, then insert every row of `table`.
    /// Returns the number of rows written.
    pub async fn replace_table(&self, table_name: &str, table: &FeatureTable) -> Result<u64> {
        let types = column_types(table);
        let srid = table.crs().epsg() as i32;

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to drop table '{table_name}'"))?;
        sqlx::query(&create_table_sql(table_name, table, &types))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to create table '{table_name}'"))?;

        let rows = table.attrs().rows();
        let geoms = table.geoms();
        let mut written = 0u64;

        for start in (0..rows.len()).step_by(INSERT_CHUNK) {
            let end = (start + INSERT_CHUNK).min(rows.len());

            let mut ewkbs = Vec::with_capacity(end - start);
            for geom in &geoms[start..end] {
                ewkbs.push(
                    geom.to_ewkb(CoordDimensions::xy(), Some(srid))
                        .map_err(|e| anyhow!("EWKB encoding failed: {e}"))?,
                );
            }

            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(insert_prefix(table_name, table));
            qb.push_values(start..end, |mut b, i| {
                for (value, ty) in rows[i].iter().zip(&types) {
                    match ty {
                        ColumnType::Int => {
                            b.push_bind(value.as_i32());
                        }
                        ColumnType::Float => {
                            b.push_bind(value.as_f64());
                        }
                        ColumnType::Text => {
                            b.push_bind(value.as_text());
                        }
                        ColumnType::Bool => {
                            b.push_bind(value.as_bool());
                        }
                    }
                }
                b.push("ST_GeomFromEWKB(");
                b.push_bind_unseparated(ewkbs[i - start].clone());
                b.push_unseparated(")");
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("bulk insert into '{table_name}' failed"))?;

            written += (end - start) as u64;
            debug!("inserted rows {start}..{end} into '{table_name}'");
        }

        tx.commit().await.context("failed to commit the write")?;
        Ok(written)
    }
}

/// Infer the SQL type of each attribute column; integer columns widen to
/// double precision when floating cells appear, anything mixed beyond that
/// falls back to text. All-null columns are text.
fn column_types(table: &FeatureTable) -> Vec<ColumnType> {
    let rows = table.attrs().rows();
    (0..table.attrs().columns().len())
        .map(|ci| {
            let mut ty = None;
            for row in rows {
                let cell = match &row[ci] {
                    Value::Int(_) => ColumnType::Int,
                    Value::Float(_) => ColumnType::Float,
                    Value::Text(_) => ColumnType::Text,
                    Value::Bool(_) => ColumnType::Bool,
                    Value::Null => continue,
                };
                ty = Some(match ty {
                    None => cell,
                    Some(prev) => unify(prev, cell),
                });
            }
            ty.unwrap_or(ColumnType::Text)
        })
        .collect()
}

fn unify(a: ColumnType, b: ColumnType) -> ColumnType {
    match (a, b) {
        (x, y) if x == y => x,
        (ColumnType::Int, ColumnType::Float) | (ColumnType::Float, ColumnType::Int) => {
            ColumnType::Float
        }
        _ => ColumnType::Text,
    }
}

fn create_table_sql(name: &str, table: &FeatureTable, types: &[ColumnType]) -> String {
    let mut cols: Vec<String> = table
        .attrs()
        .columns()
        .iter()
        .zip(types)
        .map(|(c, ty)| format!("{} {}", quote_ident(c), ty.sql()))
        .collect();
    cols.push(format!(
        "{} geometry(Geometry, {})",
        quote_ident(table.geometry_name()),
        table.crs().epsg()
    ));
    format!("CREATE TABLE {} ({})", quote_ident(name), cols.join(", "))
}

fn insert_prefix(name: &str, table: &FeatureTable) -> String {
    let mut cols: Vec<String> = table
        .attrs()
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect();
    cols.push(quote_ident(table.geometry_name()));
    format!("INSERT INTO {} ({}) ", quote_ident(name), cols.join(", "))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use geo::{coord, Geometry, Rect};

    fn sample_table() -> FeatureTable {
        let mut table = FeatureTable::new(
            vec![
                "KEY_CODE".to_string(),
                "全産業事業所数".to_string(),
                "名称".to_string(),
            ],
            Crs::Jgd2011,
        );
        table.rename_geometry("geom");
        table
            .push_feature(
                vec![
                    Value::Int(54370001),
                    Value::Int(12),
                    Value::Text("富山市".to_string()),
                ],
                Geometry::Polygon(
                    Rect::new(coord! { x: 137.0, y: 36.6 }, coord! { x: 137.1, y: 36.7 })
                        .to_polygon(),
                ),
            )
            .unwrap();
        table
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("KEY_CODE"), "\"KEY_CODE\"");
        assert_eq!(quote_ident("全産業事業所数"), "\"全産業事業所数\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn creates_the_table_with_inferred_types_and_srid() {
        let table = sample_table();
        let types = column_types(&table);
        assert_eq!(
            create_table_sql("employee", &table, &types),
            "CREATE TABLE \"employee\" (\"KEY_CODE\" integer, \
             \"全産業事業所数\" integer, \"名称\" text, \
             \"geom\" geometry(Geometry, 6668))"
        );
    }

    #[test]
    fn insert_prefix_lists_attribute_columns_then_geometry() {
        let table = sample_table();
        assert_eq!(
            insert_prefix("employee", &table),
            "INSERT INTO \"employee\" (\"KEY_CODE\", \"全産業事業所数\", \"名称\", \"geom\") "
        );
    }

    #[test]
    fn column_types_widen_and_default_sensibly() {
        let mut table = FeatureTable::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            Crs::Jgd2011,
        );
        let geom = Geometry::Polygon(
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }).to_polygon(),
        );
        table
            .push_feature(
                vec![Value::Int(1), Value::Null, Value::Int(2)],
                geom.clone(),
            )
            .unwrap();
        table
            .push_feature(
                vec![Value::Float(1.5), Value::Null, Value::Text("x".to_string())],
                geom,
            )
            .unwrap();
        assert_eq!(
            column_types(&table),
            vec![ColumnType::Float, ColumnType::Text, ColumnType::Text]
        );
    }
}
