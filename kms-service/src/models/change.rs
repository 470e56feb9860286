//! Change-data-capture feed types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Row operation carried by a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "OperationRepr")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream sends either the operation name or its numeric code.
#[derive(Deserialize)]
#[serde(untagged)]
enum OperationRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<OperationRepr> for Operation {
    type Error = String;

    fn try_from(repr: OperationRepr) -> Result<Self, Self::Error> {
        match repr {
            OperationRepr::Code(1) => Ok(Operation::Insert),
            OperationRepr::Code(2) => Ok(Operation::Update),
            OperationRepr::Code(3) => Ok(Operation::Delete),
            OperationRepr::Code(code) => Err(format!("unknown operation code: {}", code)),
            OperationRepr::Name(name) => match name.to_ascii_uppercase().as_str() {
                "INSERT" => Ok(Operation::Insert),
                "UPDATE" => Ok(Operation::Update),
                "DELETE" => Ok(Operation::Delete),
                _ => Err(format!("unknown operation: {}", name)),
            },
        }
    }
}

/// A single column of a row image: `{"value": ...}` or a bare scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Wrapped {
        value: serde_json::Value,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        type_id: Option<i64>,
    },
    Bare(serde_json::Value),
}

impl ColumnValue {
    fn raw(&self) -> &serde_json::Value {
        match self {
            ColumnValue::Wrapped { value, .. } => value,
            ColumnValue::Bare(value) => value,
        }
    }

    /// Render the value as column text; `None` for SQL null.
    pub fn as_text(&self) -> Option<String> {
        match self.raw() {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Wrapped {
            value: serde_json::Value::String(value.to_string()),
            type_id: None,
        }
    }
}

/// Row image keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub HashMap<String, ColumnValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a text column.
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.0.insert(column.to_string(), ColumnValue::from(value));
        self
    }

    /// Column text, with null and missing both mapped to `None`.
    pub fn text(&self, column: &str) -> Option<String> {
        self.0.get(column).and_then(ColumnValue::as_text)
    }

    /// Column text when present and not blank.
    pub fn non_empty(&self, column: &str) -> Option<String> {
        self.text(column).filter(|v| !v.trim().is_empty())
    }
}

/// One change to one row of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub table: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_row: Option<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_row: Option<Row>,
}

impl ChangeRecord {
    pub fn insert(table: &str, row: Row) -> Self {
        Self {
            table: table.to_string(),
            operation: Operation::Insert,
            new_row: Some(row),
            old_row: None,
        }
    }

    pub fn update(table: &str, old_row: Row, new_row: Row) -> Self {
        Self {
            table: table.to_string(),
            operation: Operation::Update,
            new_row: Some(new_row),
            old_row: Some(old_row),
        }
    }

    pub fn delete(table: &str, old_row: Row) -> Self {
        Self {
            table: table.to_string(),
            operation: Operation::Delete,
            new_row: None,
            old_row: Some(old_row),
        }
    }
}

/// Ordered list of changes applied as one transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
}

impl ChangeBatch {
    pub fn new(changes: Vec<ChangeRecord>) -> Self {
        Self { changes }
    }

    pub fn heartbeat() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}
