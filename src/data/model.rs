use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Value – a single cell in a generic table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::Null
        } else {
            Value::Float(v)
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Value {
    /// Interpret the value as an `f64`; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) if !v.is_nan() => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Render the value as an identifier (peptide, protein, location).
    /// Null has no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Float(v) if v.is_nan() => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::Float(v) if v.is_nan())
    }
}

// ---------------------------------------------------------------------------
// Table – a record-oriented table with named columns
// ---------------------------------------------------------------------------

/// One row of a [`Table`]: column_name → value. Absent keys read as Null.
pub type Record = BTreeMap<String, Value>;

/// A generic, record-oriented table such as a peptide→protein mapping or a
/// protein→location annotation. `name` is only used in error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    /// Ordered list of column names.
    pub column_names: Vec<String>,
    pub rows: Vec<Record>,
}

static NULL: Value = Value::Null;

impl Table {
    pub fn new(name: impl Into<String>, column_names: Vec<String>, rows: Vec<Record>) -> Self {
        Table {
            name: name.into(),
            column_names,
            rows,
        }
    }

    /// Build a table from records, collecting the sorted union of their keys.
    pub fn from_records(name: impl Into<String>, rows: Vec<Record>) -> Self {
        let column_names: BTreeSet<String> = rows
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect();
        Table::new(name, column_names.into_iter().collect(), rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Fail with a data-contract error naming the first missing column.
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(AnalysisError::missing_column(&self.name, missing)),
            None => Ok(()),
        }
    }

    /// Cell lookup; absent cells read as Null.
    pub fn value(&self, row: usize, column: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// Identifier cell; Null becomes `None`.
    pub fn key(&self, row: usize, column: &str) -> Option<String> {
        self.value(row, column).as_key()
    }

    /// Numeric cell. Null is `Ok(None)`; a non-numeric value is an error.
    pub fn number(&self, row: usize, column: &str) -> Result<Option<f64>> {
        let value = self.value(row, column);
        if value.is_null() {
            return Ok(None);
        }
        match value.as_f64() {
            Some(v) => Ok(Some(v)),
            None => Err(AnalysisError::InvalidValue {
                table: self.name.clone(),
                column: column.to_string(),
                row,
                reason: format!("'{value}' is not a number"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame – a labelled matrix (rows × samples) with missing cells
// ---------------------------------------------------------------------------

/// A labelled matrix: unique row keys × unique sample columns, each cell
/// optional. `None` marks a missing measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    index: Vec<String>,
    samples: Vec<String>,
    cells: Vec<Vec<Option<T>>>,
}

/// Peptide × sample intensities.
pub type IntensityTable = Frame<f64>;

/// Peptide × sample outlier flags. Missing input cells stay `None`.
pub type OutlierFlagTable = Frame<bool>;

impl<T> Frame<T> {
    /// Validate and build a frame. Row keys and sample names must be unique
    /// and every row must have one cell per sample.
    pub fn new(index: Vec<String>, samples: Vec<String>, cells: Vec<Vec<Option<T>>>) -> Result<Self> {
        ensure_unique("index", &index)?;
        ensure_unique("columns", &samples)?;
        if index.len() != cells.len() {
            return Err(AnalysisError::ShapeMismatch {
                table: "frame".to_string(),
                reason: format!("{} index labels but {} rows", index.len(), cells.len()),
            });
        }
        if let Some((i, row)) = cells.iter().enumerate().find(|(_, r)| r.len() != samples.len()) {
            return Err(AnalysisError::ShapeMismatch {
                table: "frame".to_string(),
                reason: format!(
                    "row '{}' has {} cells but there are {} samples",
                    index[i],
                    row.len(),
                    samples.len()
                ),
            });
        }
        Ok(Frame {
            index,
            samples,
            cells,
        })
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Iterate `(row key, cells)` in row order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Option<T>])> {
        self.index
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(Vec::as_slice))
    }

    pub fn row(&self, key: &str) -> Option<&[Option<T>]> {
        let i = self.index.iter().position(|k| k == key)?;
        Some(&self.cells[i])
    }

    pub fn row_at(&self, i: usize) -> &[Option<T>] {
        &self.cells[i]
    }

    /// Build a new frame of the same shape by mapping each row.
    pub fn map_rows<U>(&self, mut f: impl FnMut(&[Option<T>]) -> Vec<Option<U>>) -> Frame<U> {
        Frame {
            index: self.index.clone(),
            samples: self.samples.clone(),
            cells: self.cells.iter().map(|row| f(row)).collect(),
        }
    }

    /// Build a new frame keeping only the given row positions, in that order.
    pub fn select_rows(&self, positions: &[usize]) -> Frame<T>
    where
        T: Clone,
    {
        Frame {
            index: positions.iter().map(|&i| self.index[i].clone()).collect(),
            samples: self.samples.clone(),
            cells: positions.iter().map(|&i| self.cells[i].clone()).collect(),
        }
    }

    /// Build a new frame keeping only the given column positions, in that order.
    pub fn select_columns(&self, positions: &[usize]) -> Frame<T>
    where
        T: Clone,
    {
        Frame {
            index: self.index.clone(),
            samples: positions.iter().map(|&j| self.samples[j].clone()).collect(),
            cells: self
                .cells
                .iter()
                .map(|row| positions.iter().map(|&j| row[j].clone()).collect())
                .collect(),
        }
    }
}

impl Frame<f64> {
    /// Build an intensity table, treating NaN cells as missing.
    pub fn from_values(
        index: Vec<String>,
        samples: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        let cells = values
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
            .collect();
        Frame::new(index, samples, cells)
    }
}

impl Frame<bool> {
    /// Number of `true` cells in the whole table.
    pub fn count_flagged(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| matches!(c, Some(true)))
            .count()
    }

    /// Cell-wise OR of two flag tables with identical labels.
    pub fn union(&self, other: &OutlierFlagTable) -> Result<OutlierFlagTable> {
        if self.index != other.index || self.samples != other.samples {
            return Err(AnalysisError::ShapeMismatch {
                table: "outlier flags".to_string(),
                reason: "cannot combine flag tables with different labels".to_string(),
            });
        }
        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(a, b)| {
                a.iter()
                    .zip(b)
                    .map(|(x, y)| match (x, y) {
                        (None, None) => None,
                        (x, y) => Some(x.unwrap_or(false) || y.unwrap_or(false)),
                    })
                    .collect()
            })
            .collect();
        Ok(Frame {
            index: self.index.clone(),
            samples: self.samples.clone(),
            cells,
        })
    }
}

fn ensure_unique(what: &str, labels: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(AnalysisError::DuplicateIndex {
                table: what.to_string(),
                key: label.clone(),
            });
        }
    }
    Ok(())
}
