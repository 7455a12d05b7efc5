//! In-memory tabular and spatial datasets.
//!
//! `AttrTable` holds plain attribute rows; `FeatureTable` pairs an attribute
//! table with one geometry per row plus CRS bookkeeping. All loader
//! transforms live here: concatenation, integer casts, the KEY_CODE join,
//! the intersects filter and reprojection.

use anyhow::{bail, Context, Result};
use geo::{Geometry, Intersects, Polygon};
use std::collections::HashMap;

use crate::crs::{Crs, Transformer};

/// A single attribute cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    /// Cast to a 32-bit integer. Floating values (numeric or textual) are
    /// truncated toward zero; anything non-numeric is an error.
    fn cast_i32(&self) -> Result<Value> {
        match self {
            Value::Int(v) => Ok(Value::Int(*v)),
            Value::Float(v) => Ok(Value::Int(*v as i32)),
            Value::Text(s) => {
                let t = s.trim();
                if let Ok(v) = t.parse::<i32>() {
                    Ok(Value::Int(v))
                } else if let Ok(v) = t.parse::<f64>() {
                    Ok(Value::Int(v as i32))
                } else {
                    bail!("'{s}' is not numeric")
                }
            }
            Value::Bool(_) => bail!("cannot cast a boolean to an integer"),
            Value::Null => Ok(Value::Null),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bool(v) => Some(v.to_string()),
            Value::Null => None,
        }
    }
}

/// Plain attribute rows, no geometry.
#[derive(Debug, Clone, Default)]
pub struct AttrTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl AttrTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("no column named '{name}'"))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!(
                "row has {} values but the table has {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    /// Row-wise union with another fragment of the same schema. All rows of
    /// both fragments are preserved, no deduplication.
    pub fn append(&mut self, other: AttrTable) -> Result<()> {
        if self.columns != other.columns {
            bail!(
                "cannot concatenate tables with different columns: {:?} vs {:?}",
                self.columns,
                other.columns
            );
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Cast every cell of `name` to a 32-bit integer.
    pub fn cast_column_i32(&mut self, name: &str) -> Result<()> {
        let idx = self.column_index(name)?;
        for (rownum, row) in self.rows.iter_mut().enumerate() {
            row[idx] = row[idx]
                .cast_i32()
                .with_context(|| format!("column '{name}', row {rownum}"))?;
        }
        Ok(())
    }
}

/// Attribute rows with one geometry each.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    attrs: AttrTable,
    geoms: Vec<Geometry<f64>>,
    geometry_name: String,
    crs: Crs,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, crs: Crs) -> Self {
        Self {
            attrs: AttrTable::new(columns),
            geoms: Vec::new(),
            geometry_name: "geometry".to_string(),
            crs,
        }
    }

    pub fn attrs(&self) -> &AttrTable {
        &self.attrs
    }

    pub fn geoms(&self) -> &[Geometry<f64>] {
        &self.geoms
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn geometry_name(&self) -> &str {
        &self.geometry_name
    }

    pub fn len(&self) -> usize {
        self.geoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geoms.is_empty()
    }

    pub fn push_feature(&mut self, row: Vec<Value>, geom: Geometry<f64>) -> Result<()> {
        self.attrs.push_row(row)?;
        self.geoms.push(geom);
        Ok(())
    }

    /// Rename the geometry column (the loaders set `geom` before writing).
    pub fn rename_geometry(&mut self, name: &str) {
        self.geometry_name = name.to_string();
    }

    pub fn cast_column_i32(&mut self, name: &str) -> Result<()> {
        self.attrs.cast_column_i32(name)
    }

    /// Row-wise union with another fragment of the same schema and CRS.
    pub fn append(&mut self, other: FeatureTable) -> Result<()> {
        if self.crs != other.crs {
            bail!(
                "cannot concatenate tables in different CRS: {} vs {}",
                self.crs,
                other.crs
            );
        }
        self.attrs.append(other.attrs)?;
        self.geoms.extend(other.geoms);
        Ok(())
    }

    /// Inner join against a tabular fragment on an integer key column.
    ///
    /// Emits one output row per (feature, matching tabular row) pair, feature
    /// columns first, then the tabular columns minus the duplicated key.
    /// Rows without a match on either side are dropped silently; the key must
    /// have been cast to i32 on both sides beforehand.
    pub fn inner_join(self, right: &AttrTable, key: &str) -> Result<FeatureTable> {
        let left_key = self.attrs.column_index(key)?;
        let right_key = right.column_index(key)?;

        let mut buckets: HashMap<i32, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows().iter().enumerate() {
            match &row[right_key] {
                Value::Int(k) => buckets.entry(*k).or_default().push(i),
                Value::Null => {}
                other => bail!("join key '{key}' is not integral ({other:?}); cast it first"),
            }
        }

        let mut columns = self.attrs.columns.clone();
        columns.extend(
            right
                .columns()
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != right_key)
                .map(|(_, c)| c.clone()),
        );

        let mut joined = FeatureTable::new(columns, self.crs);
        joined.geometry_name = self.geometry_name.clone();

        for (row, geom) in self.attrs.rows.into_iter().zip(self.geoms) {
            let k = match &row[left_key] {
                Value::Int(k) => *k,
                Value::Null => continue,
                other => bail!("join key '{key}' is not integral ({other:?}); cast it first"),
            };
            let Some(matches) = buckets.get(&k) else {
                continue;
            };
            for &ri in matches {
                let mut merged = row.clone();
                merged.extend(
                    right.rows()[ri]
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != right_key)
                        .map(|(_, v)| v.clone()),
                );
                joined.push_feature(merged, geom.clone())?;
            }
        }

        Ok(joined)
    }

    /// Reproject every geometry to `target`.
    pub fn to_crs(&mut self, target: Crs) -> Result<()> {
        let transformer = Transformer::new(self.crs, target)?;
        for geom in &mut self.geoms {
            *geom = transformer.transform_geometry(geom)?;
        }
        self.crs = target;
        Ok(())
    }

    /// Keep exactly the rows whose geometry intersects `region`
    /// (boundary-inclusive).
    pub fn retain_intersecting(&mut self, region: &Polygon<f64>) {
        let keep: Vec<bool> = self.geoms.iter().map(|g| g.intersects(region)).collect();
        let mut i = 0;
        self.attrs.rows.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
        let mut i = 0;
        self.geoms.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
    }
}
