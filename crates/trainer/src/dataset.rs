//! CSV tables, feature matrices and binary labels
//!
//! Tables are read with the `csv` crate. A column is numeric when every
//! non-missing cell parses as a float; empty, `NA`, `NaN` and `null` cells
//! are missing and become `NaN`. Everything else is kept as text.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::deterministic::SeededHashState;
use crate::errors::{Result, StarterError};

const MISSING_TOKENS: [&str; 6] = ["", "NA", "NaN", "nan", "null", "None"];

fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

/// Values of one column
#[derive(Debug, Clone)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    /// Infer the column type from raw cells
    fn infer(cells: Vec<String>) -> Self {
        let mut parsed = Vec::with_capacity(cells.len());
        for cell in &cells {
            if is_missing(cell) {
                parsed.push(f64::NAN);
                continue;
            }
            match cell.trim().parse::<f64>() {
                Ok(v) => parsed.push(v),
                Err(_) => return ColumnData::Text(cells),
            }
        }
        ColumnData::Numeric(parsed)
    }

    fn render(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) if v[row].is_nan() => String::new(),
            ColumnData::Numeric(v) => v[row].to_string(),
            ColumnData::Text(v) => v[row].clone(),
        }
    }
}

// NaN cells compare equal so copies of tables with missing values are equal
impl PartialEq for ColumnData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnData::Numeric(a), ColumnData::Numeric(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
            }
            (ColumnData::Text(a), ColumnData::Text(b)) => a == b,
            _ => false,
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }
}

/// Two-dimensional table of named columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table; columns must have equal lengths and unique names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |c| c.data.len());

        let mut seen: HashSet<&str, SeededHashState> = HashSet::default();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(StarterError::SchemaMismatch(format!(
                    "duplicate column `{}`",
                    column.name
                )));
            }
            if column.data.len() != n_rows {
                return Err(StarterError::SchemaMismatch(format!(
                    "column `{}` has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    n_rows
                )));
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Load a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StarterError::MissingInput {
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        for record in reader.records() {
            let record = record?;
            for (col, value) in cells.iter_mut().zip(record.iter()) {
                col.push(value.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column {
                name,
                data: ColumnData::infer(raw),
            })
            .collect();

        Self::new(columns)
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;

        for row in 0..self.n_rows {
            writer.write_record(self.columns.iter().map(|c| c.data.render(row)))?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column by name, or a `MissingColumn` error naming `table`
    pub fn require(&self, name: &str, table: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| StarterError::MissingColumn {
            column: name.to_string(),
            table: table.to_string(),
        })
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Replace a column's values, or append it when absent
    pub fn set_column(&mut self, name: &str, data: ColumnData) -> Result<()> {
        if data.len() != self.n_rows && !self.columns.is_empty() {
            return Err(StarterError::SchemaMismatch(format!(
                "column `{}` has {} rows, table has {}",
                name,
                data.len(),
                self.n_rows
            )));
        }

        match self.column_mut(name) {
            Some(column) => column.data = data,
            None => {
                if self.columns.is_empty() {
                    self.n_rows = data.len();
                }
                self.columns.push(Column {
                    name: name.to_string(),
                    data,
                });
            }
        }
        Ok(())
    }
}

/// Column-major numeric feature block
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(StarterError::SchemaMismatch(format!(
                "{} names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        let n_rows = columns.first().map_or(0, Vec::len);
        if let Some((name, col)) = names.iter().zip(&columns).find(|(_, c)| c.len() != n_rows) {
            return Err(StarterError::SchemaMismatch(format!(
                "feature `{}` has {} rows, expected {}",
                name,
                col.len(),
                n_rows
            )));
        }
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    /// Select `names` from `table`, in that order; each must be numeric
    pub fn from_table(table: &Table, names: &[String], table_name: &str) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| match &table.require(name, table_name)?.data {
                ColumnData::Numeric(values) => Ok(values.clone()),
                ColumnData::Text(_) => Err(StarterError::SchemaMismatch(format!(
                    "feature `{name}` in {table_name} is not numeric"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut matrix = Self::from_columns(names.to_vec(), columns)?;
        matrix.n_rows = table.n_rows();
        Ok(matrix)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    /// Copy row `row` into `buf`
    pub fn fill_row(&self, row: usize, buf: &mut Vec<f64>) {
        buf.clear();
        buf.extend(self.columns.iter().map(|c| c[row]));
    }

    /// New matrix holding `indices`, in that order
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| indices.iter().map(|&i| c[i]).collect())
                .collect(),
            n_rows: indices.len(),
        }
    }

    /// Inference matrices must carry the training names in the same order
    pub fn ensure_same_features(&self, other: &FeatureMatrix) -> Result<()> {
        if self.names != other.names {
            return Err(StarterError::SchemaMismatch(format!(
                "feature columns differ: {:?} vs {:?}",
                self.names, other.names
            )));
        }
        Ok(())
    }
}

/// Binary targets encoded as 0.0 / 1.0
#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    values: Vec<f64>,
    classes: [String; 2],
}

impl Labels {
    /// Labels from already-encoded 0/1 values
    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        if let Some((row, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| **v != 0.0 && **v != 1.0)
        {
            return Err(StarterError::InvalidLabels(format!(
                "row {row} has value {v}; numeric targets must be 0 or 1"
            )));
        }
        Ok(Self {
            values,
            classes: ["0".to_string(), "1".to_string()],
        })
    }

    /// Encode `target` of `table`. Text targets need exactly two distinct
    /// values; the lexicographically larger one is the positive class.
    pub fn from_table(table: &Table, target: &str, table_name: &str) -> Result<Self> {
        match &table.require(target, table_name)?.data {
            ColumnData::Numeric(values) => Self::from_values(values.clone()),
            ColumnData::Text(values) => {
                let classes: BTreeSet<&str> = values.iter().map(|s| s.trim()).collect();
                let classes: Vec<&str> = classes.into_iter().collect();
                if classes.len() != 2 || classes.iter().any(|c| is_missing(c)) {
                    return Err(StarterError::InvalidLabels(format!(
                        "target `{target}` must have exactly two classes, found {classes:?}"
                    )));
                }
                let positive = classes[1];
                Ok(Self {
                    values: values
                        .iter()
                        .map(|s| if s.trim() == positive { 1.0 } else { 0.0 })
                        .collect(),
                    classes: [classes[0].to_string(), classes[1].to_string()],
                })
            }
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `[negative, positive]` class names
    pub fn classes(&self) -> &[String; 2] {
        &self.classes
    }

    pub fn positive_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == 1.0).count()
    }

    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            values: indices.iter().map(|&i| self.values[i]).collect(),
            classes: self.classes.clone(),
        }
    }
}
