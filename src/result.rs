//! Result sets and operation outcomes.

use crate::error::{AskError, AskResult};

use serde_json::{Map, Value};
use std::io::Write;

/// Tabular query output: column names from the row description, then rows
/// of values in the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// A row as a column-name → value mapping, in column order.
    pub fn row_map(&self, index: usize) -> Option<Map<String, Value>> {
        let row = self.rows.get(index)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    /// All rows as mappings, for JSON output.
    pub fn to_maps(&self) -> Vec<Map<String, Value>> {
        (0..self.rows.len()).filter_map(|i| self.row_map(i)).collect()
    }

    /// Coerce a column to numbers.
    ///
    /// Numbers stay as they are, numeric strings are parsed, anything else
    /// becomes null. A missing column is left alone.
    pub fn coerce_numeric(&mut self, column: &str) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(idx) {
                *cell = to_number(cell);
            }
        }
    }

    /// Write the result as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> AskResult<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(cell_text))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> AskResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| AskError::Csv(e.to_string()))
    }
}

/// Display text for a cell. Null renders as an empty string.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

fn to_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Value::from(i)
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        _ => Value::Null,
    }
}

/// The result of a database operation that can fail without aborting the
/// session.
///
/// A failure is kept distinct from a legitimately empty result.
/// [`Outcome::into_masked`] collapses the two for callers that want the
/// empty-on-error behavior.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failed(AskError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&AskError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Success(_) => None,
        }
    }

    pub fn into_result(self) -> AskResult<T> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failed(e) => Err(e),
        }
    }
}

impl<T: Default> Outcome<T> {
    /// The value, or an empty default on failure.
    pub fn into_masked(self) -> T {
        match self {
            Self::Success(v) => v,
            Self::Failed(_) => T::default(),
        }
    }
}

impl<T> From<AskResult<T>> for Outcome<T> {
    fn from(result: AskResult<T>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failed(e),
        }
    }
}
