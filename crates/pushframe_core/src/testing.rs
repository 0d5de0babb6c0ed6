//! Scriptable in-memory connection for tests.
//!
//! `MockConnection` records every statement it is asked to execute, keeps a
//! small fake catalog, and lets tests script results and inject failures by
//! substring match. By default a `call` statement that names an `outtable`
//! also creates that table in the fake catalog, which is what the real
//! engine does for table-producing procedures; turn that off to exercise
//! the no-output-relation fork.

use std::sync::{Arc, Mutex};

use crate::connection::{ColumnDesc, Connection, ObjectKind, TabularResult};
use crate::errors::{FrameError, Result};

#[derive(Default)]
struct MockInner {
    kinds: Vec<(String, ObjectKind)>,
    columns: Vec<(String, Vec<ColumnDesc>)>,
    scripted: Vec<(String, Option<TabularResult>)>,
    failures: Vec<(String, String)>,
    statements: Vec<String>,
    produce_output_tables: bool,
    default_output_columns: Vec<ColumnDesc>,
}

impl MockInner {
    fn kind_of(&self, name: &str) -> ObjectKind {
        self.kinds
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, k)| *k)
            .unwrap_or(ObjectKind::Absent)
    }

    fn set_kind(&mut self, name: &str, kind: ObjectKind) {
        if let Some(entry) = self.kinds.iter_mut().find(|(n, _)| n == name) {
            entry.1 = kind;
        } else {
            self.kinds.push((name.to_string(), kind));
        }
    }

    fn remove(&mut self, name: &str) {
        self.kinds.retain(|(n, _)| n != name);
        self.columns.retain(|(n, _)| n != name);
    }

    fn columns_of(&self, name: &str) -> Option<Vec<ColumnDesc>> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone())
    }
}

pub struct MockConnection {
    inner: Mutex<MockInner>,
}

impl MockConnection {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Arc<MockConnection> {
        Arc::new(MockConnection {
            inner: Mutex::new(MockInner {
                produce_output_tables: true,
                default_output_columns: vec![
                    ColumnDesc::new("ID", "BIGINT"),
                    ColumnDesc::new("CLASS", "VARCHAR"),
                ],
                ..MockInner::default()
            }),
        })
    }

    /// Registers a table with the given column layout.
    pub fn add_table(&self, name: &str, columns: &[(&str, &str)]) {
        let mut inner = self.inner.lock().unwrap();
        inner.set_kind(name, ObjectKind::Table);
        let descs = columns
            .iter()
            .map(|(n, d)| ColumnDesc::new(*n, *d))
            .collect();
        inner.columns.retain(|(n, _)| n != name);
        inner.columns.push((name.to_string(), descs));
    }

    pub fn set_kind(&self, name: &str, kind: ObjectKind) {
        self.inner.lock().unwrap().set_kind(name, kind);
    }

    pub fn kind_of(&self, name: &str) -> ObjectKind {
        self.inner.lock().unwrap().kind_of(name)
    }

    /// Scripts the result for any statement containing `pattern`.
    pub fn script_result(&self, pattern: &str, result: Option<TabularResult>) {
        self.inner
            .lock()
            .unwrap()
            .scripted
            .push((pattern.to_string(), result));
    }

    /// Makes any statement containing `pattern` fail with `message`.
    pub fn fail_matching(&self, pattern: &str, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .push((pattern.to_string(), message.to_string()));
    }

    /// Whether `call` statements auto-create their `outtable` (default on).
    pub fn set_produce_output_tables(&self, produce: bool) {
        self.inner.lock().unwrap().produce_output_tables = produce;
    }

    pub fn set_default_output_columns(&self, columns: &[(&str, &str)]) {
        self.inner.lock().unwrap().default_output_columns = columns
            .iter()
            .map(|(n, d)| ColumnDesc::new(*n, *d))
            .collect();
    }

    /// Every statement executed so far, in order. Catalog lookups and drops
    /// are recorded as `DROP TABLE <name>` / `DROP VIEW <name>` pseudo
    /// statements.
    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().unwrap().statements.clone()
    }

    pub fn clear_statements(&self) {
        self.inner.lock().unwrap().statements.clear();
    }

    fn check_failures(inner: &MockInner, stmt: &str) -> Result<()> {
        for (pattern, message) in &inner.failures {
            if stmt.contains(pattern.as_str()) {
                return Err(FrameError::Connection(message.clone()));
            }
        }
        Ok(())
    }
}

fn outtable_of(sql: &str) -> Option<String> {
    let start = sql.find("outtable=")? + "outtable=".len();
    let rest = &sql[start..];
    let end = rest
        .find([',', '\''])
        .unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

impl Connection for MockConnection {
    fn execute(&self, sql: &str) -> Result<Option<TabularResult>> {
        let mut inner = self.inner.lock().unwrap();
        inner.statements.push(sql.to_string());
        Self::check_failures(&inner, sql)?;

        for (pattern, result) in &inner.scripted {
            if sql.contains(pattern.as_str()) {
                return Ok(result.clone());
            }
        }

        if let Some(rest) = sql.strip_prefix("CREATE VIEW ") {
            if let Some(name) = rest.split(' ').next() {
                inner.set_kind(name, ObjectKind::View);
            }
            return Ok(None);
        }

        if sql.starts_with("call ") {
            if inner.produce_output_tables {
                if let Some(out) = outtable_of(sql) {
                    let columns = inner.default_output_columns.clone();
                    inner.set_kind(&out, ObjectKind::Table);
                    inner.columns.retain(|(n, _)| n != &out);
                    inner.columns.push((out, columns));
                }
            }
            return Ok(None);
        }

        if let Some(rest) = sql.strip_prefix("SELECT * FROM ") {
            if let Some(name) = rest.strip_suffix(" LIMIT 0") {
                return match inner.columns_of(name) {
                    Some(columns) => Ok(Some(TabularResult::empty(columns))),
                    None => Err(FrameError::Connection(format!(
                        "relation does not exist: {name}"
                    ))),
                };
            }
        }

        if sql.starts_with("SELECT") {
            return Ok(Some(TabularResult::default()));
        }
        Ok(None)
    }

    fn object_kind(&self, name: &str) -> Result<ObjectKind> {
        Ok(self.inner.lock().unwrap().kind_of(name))
    }

    fn drop_object(&self, name: &str, kind: ObjectKind) -> Result<()> {
        let word = match kind {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::Model => "MODEL",
            ObjectKind::Absent => {
                return Err(FrameError::Connection(format!(
                    "cannot drop '{name}' of unknown kind"
                )));
            }
        };
        let stmt = format!("DROP {word} {name}");
        let mut inner = self.inner.lock().unwrap();
        inner.statements.push(stmt.clone());
        Self::check_failures(&inner, &stmt)?;
        if inner.kind_of(name) == ObjectKind::Absent {
            return Err(FrameError::Connection(format!(
                "object does not exist: {name}"
            )));
        }
        inner.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_statements_and_scripts_results() {
        let conn = MockConnection::new();
        conn.script_result("SELECT 1", Some(TabularResult::scalar_result(1i64)));
        let res = conn.execute("SELECT 1").unwrap().unwrap();
        assert_eq!(res.scalar().and_then(|v| v.as_i64()), Some(1));
        assert_eq!(conn.statements(), ["SELECT 1"]);
    }

    #[test]
    fn call_creates_the_declared_outtable() {
        let conn = MockConnection::new();
        conn.execute("call NZA..KMEANS('model=M,intable=T,outtable=OUT1')")
            .unwrap();
        assert_eq!(conn.kind_of("OUT1"), ObjectKind::Table);
    }

    #[test]
    fn dropping_an_absent_object_fails() {
        let conn = MockConnection::new();
        assert!(conn.drop_object("GONE", ObjectKind::Table).is_err());
    }

    #[test]
    fn injected_failures_match_by_substring() {
        let conn = MockConnection::new();
        conn.fail_matching("BOOM", "kapow");
        assert!(conn.execute("SELECT BOOM").is_err());
        assert!(conn.execute("SELECT OK").is_ok());
    }
}
