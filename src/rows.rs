use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RowsError {
    #[error("Failed to read rows file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Row {index} is not a JSON object")]
    NotAnObject { index: usize },
}

/// One row of named fields, positionally paired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

impl Row {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let (columns, values) = object
            .iter()
            .map(|(key, value)| (key.clone(), value_to_text(value)))
            .unzip();
        Row { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }
}

/// Text a filter sees for a JSON value: strings verbatim, null as empty,
/// everything else in JSON notation
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a JSON array of objects, or JSON lines with one object per line
pub fn parse_rows(text: &str) -> Result<Vec<Row>, RowsError> {
    if text.trim_start().starts_with('[') {
        let values: Vec<Value> =
            serde_json::from_str(text).map_err(|source| RowsError::Json { line: 1, source })?;
        return values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .as_object()
                    .map(Row::from_object)
                    .ok_or(RowsError::NotAnObject { index })
            })
            .collect();
    }

    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|source| RowsError::Json {
            line: i + 1,
            source,
        })?;
        let object = value.as_object().ok_or(RowsError::NotAnObject {
            index: rows.len(),
        })?;
        rows.push(Row::from_object(object));
    }
    Ok(rows)
}

pub fn parse_rows_file(path: &Path) -> Result<Vec<Row>, RowsError> {
    let text = std::fs::read_to_string(path).map_err(|source| RowsError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_rows(&text)
}
