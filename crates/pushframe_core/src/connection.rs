//! Connection abstraction over the remote engine.
//!
//! The core never opens sockets itself; it drives a [`Connection`]
//! implementation supplied by the embedding application. Everything the
//! builder and the procedure wrappers need boils down to executing SQL text,
//! asking the catalog what a name denotes, and dropping objects.

use std::fmt;
use std::sync::Arc;

use crate::errors::{FrameError, Result};

/// Shared handle to a connection. Frames never own the connection.
pub type ConnectionRef = Arc<dyn Connection>;

/// What a name denotes in the engine catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
    Model,
    Absent,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::View => write!(f, "view"),
            Self::Model => write!(f, "model"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// A single cell value produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Engine truthiness: booleans and nonzero numbers count as true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Double(v) => *v != 0.0,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Column metadata as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub dtype: String,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, dtype: impl Into<String>) -> Self {
        ColumnDesc {
            name: name.into(),
            dtype: dtype.into(),
        }
    }
}

/// Rows returned by a SELECT-shaped statement, or the result channel of a
/// CALL that produced no relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    pub columns: Vec<ColumnDesc>,
    pub rows: Vec<Vec<Value>>,
}

impl TabularResult {
    pub fn empty(columns: Vec<ColumnDesc>) -> Self {
        TabularResult {
            columns,
            rows: Vec::new(),
        }
    }

    /// Single-cell result, the common shape of scoring procedures.
    pub fn scalar_result(value: impl Into<Value>) -> Self {
        TabularResult {
            columns: vec![ColumnDesc::new("VALUE", "DOUBLE")],
            rows: vec![vec![value.into()]],
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// First cell of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.first())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Synchronous access to the remote engine.
///
/// Implementations are expected to execute statements in the order issued;
/// the core relies on that for input-view cleanup sequencing. Timeouts and
/// cancellation, if any, live in the implementation.
pub trait Connection: Send + Sync {
    /// Runs arbitrary SQL/DDL/CALL text. Returns rows for SELECT-shaped
    /// statements, `None` for DDL, and whatever result/notice channel the
    /// engine exposes for CALL statements without a produced relation.
    fn execute(&self, sql: &str) -> Result<Option<TabularResult>>;

    /// Catalog introspection: what does `name` denote right now.
    fn object_kind(&self, name: &str) -> Result<ObjectKind>;

    /// Removes an object. Implementations may fail on absent objects; the
    /// core routes removals through [`Connection::drop_if_exists`] where
    /// "already gone" must count as success.
    fn drop_object(&self, name: &str, kind: ObjectKind) -> Result<()>;

    /// Single-value convenience over [`Connection::execute`].
    fn execute_scalar(&self, sql: &str) -> Result<Value> {
        match self.execute(sql)? {
            Some(res) => res.scalar().cloned().ok_or_else(|| {
                FrameError::Connection(format!("statement produced no scalar result: {sql}"))
            }),
            None => Err(FrameError::Connection(format!(
                "statement produced no result: {sql}"
            ))),
        }
    }

    fn exists_table_or_view(&self, name: &str) -> Result<bool> {
        Ok(matches!(
            self.object_kind(name)?,
            ObjectKind::Table | ObjectKind::View
        ))
    }

    /// Column names and types of a persisted table or view.
    fn table_columns(&self, name: &str) -> Result<Vec<ColumnDesc>> {
        let res = self
            .execute(&format!("SELECT * FROM {name} LIMIT 0"))?
            .ok_or_else(|| {
                FrameError::Connection(format!("no result while describing '{name}'"))
            })?;
        Ok(res.columns)
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        self.drop_object(name, ObjectKind::Table)
    }

    fn drop_view(&self, name: &str) -> Result<()> {
        self.drop_object(name, ObjectKind::View)
    }

    /// Drops `name` if the catalog still knows it; absence is success.
    fn drop_if_exists(&self, name: &str) -> Result<()> {
        match self.object_kind(name)? {
            ObjectKind::Table => self.drop_object(name, ObjectKind::Table),
            ObjectKind::View => self.drop_object(name, ObjectKind::View),
            ObjectKind::Model | ObjectKind::Absent => Ok(()),
        }
    }
}
