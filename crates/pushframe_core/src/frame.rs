//! The user-facing lazy frame.
//!
//! A [`RemoteFrame`] is a handle over a [`FrameState`] plus a shared
//! connection. Every relational operation is pure: it clones the state,
//! validates the request against the column catalog, and returns a new
//! frame. The database is only touched when the frame is materialized,
//! collected, or handed to a procedure wrapper.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::connection::{ColumnDesc, Connection, ConnectionRef, ObjectKind, TabularResult};
use crate::errors::{FrameError, Result};
use crate::filter::Predicate;
use crate::state::{AggFunc, FrameOp, FrameState, JoinKind, SortSpec, ident};

#[derive(Clone)]
pub struct RemoteFrame {
    conn: ConnectionRef,
    state: FrameState,
    name: String,
    dtypes: Arc<OnceLock<Vec<ColumnDesc>>>,
}

impl std::fmt::Debug for RemoteFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFrame")
            .field("name", &self.name)
            .field("columns", &self.state.columns())
            .field("bare", &self.state.is_bare())
            .finish()
    }
}

impl RemoteFrame {
    /// Binds a frame to an existing table or view. The catalog is consulted
    /// for the object kind and the column layout; anything else fails with
    /// [`FrameError::NoSuchObject`].
    pub fn from_table(conn: ConnectionRef, name: &str) -> Result<RemoteFrame> {
        match conn.object_kind(name)? {
            ObjectKind::Table | ObjectKind::View => {}
            _ => return Err(FrameError::NoSuchObject(name.to_string())),
        }
        let columns = conn.table_columns(name)?;
        debug!(table = %name, columns = columns.len(), "bound frame");
        Ok(RemoteFrame {
            conn,
            state: FrameState::new(name, columns),
            name: name.to_string(),
            dtypes: Arc::new(OnceLock::new()),
        })
    }

    fn derive(&self, state: FrameState) -> RemoteFrame {
        RemoteFrame {
            conn: self.conn.clone(),
            state,
            name: self.name.clone(),
            dtypes: Arc::new(OnceLock::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_name(&self) -> &str {
        self.state.base_name()
    }

    pub fn connection(&self) -> &ConnectionRef {
        &self.conn
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// Column names in projection order. No I/O.
    pub fn columns(&self) -> Vec<String> {
        self.state.columns()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.state.has_column(name)
    }

    /// True when the frame is exactly the persisted object it was bound to.
    pub fn is_bare(&self) -> bool {
        self.state.is_bare()
    }

    pub fn indexer(&self) -> Option<&str> {
        self.state.indexer()
    }

    /// Designates the unique row-identity column, validated against the
    /// catalog. Procedure wrappers use it as the default id key.
    pub fn set_indexer(&mut self, column: &str) -> Result<()> {
        self.state.set_indexer(Some(column.to_string()))
    }

    pub fn with_indexer(mut self, column: &str) -> Result<RemoteFrame> {
        self.set_indexer(column)?;
        Ok(self)
    }

    /// Renders the accumulated chain as one SELECT expression. Pure.
    pub fn current_state(&self) -> String {
        self.state.current_state()
    }

    /// Column types, fetched from the engine on first access and cached for
    /// the lifetime of this frame value. Derived frames refetch.
    pub fn dtypes(&self) -> Result<Vec<ColumnDesc>> {
        if let Some(d) = self.dtypes.get() {
            return Ok(d.clone());
        }
        let fetched = if self.state.is_bare() {
            self.conn.table_columns(self.state.base_name())?
        } else {
            let sql = format!("SELECT * FROM ({}) d LIMIT 0", self.current_state());
            self.conn
                .execute(&sql)?
                .ok_or_else(|| {
                    FrameError::Connection(format!(
                        "no result while describing frame '{}'",
                        self.name
                    ))
                })?
                .columns
        };
        let _ = self.dtypes.set(fetched.clone());
        Ok(fetched)
    }

    /// Restricts/reorders columns. No I/O; the frame stays bare.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<RemoteFrame> {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let mut state = self.state.clone();
        state.project(&columns)?;
        Ok(self.derive(state))
    }

    /// Adds a derived column computed by the given SQL expression.
    pub fn add_column(&self, name: &str, expr: &str) -> Result<RemoteFrame> {
        let mut state = self.state.clone();
        state.add_column(name, expr)?;
        Ok(self.derive(state))
    }

    pub fn drop_column(&self, name: &str) -> Result<RemoteFrame> {
        let mut state = self.state.clone();
        state.drop_column(name)?;
        Ok(self.derive(state))
    }

    pub fn rename_column(&self, old: &str, new: &str) -> Result<RemoteFrame> {
        let mut state = self.state.clone();
        state.rename_column(old, new)?;
        Ok(self.derive(state))
    }

    /// Appends a predicate filter. Structured predicates are validated
    /// against the catalog; raw fragments pass through unchecked.
    pub fn filter(&self, predicate: &Predicate) -> Result<RemoteFrame> {
        for column in predicate.referenced_columns() {
            self.state.require_column(column)?;
        }
        let mut state = self.state.clone();
        state.push_op(FrameOp::Filter(predicate.clause().to_string()));
        Ok(self.derive(state))
    }

    /// Records a materialization/display order. Row content is unchanged.
    pub fn sort<S: AsRef<str>>(&self, by: &[S], ascending: bool) -> Result<RemoteFrame> {
        if by.is_empty() {
            return Err(FrameError::InvalidOperation {
                frame: self.name.clone(),
                message: "sort requires at least one column".to_string(),
            });
        }
        let by: Vec<String> = by.iter().map(|c| c.as_ref().to_string()).collect();
        for column in &by {
            self.state.require_column(column)?;
        }
        let mut state = self.state.clone();
        state.push_op(FrameOp::Sort(SortSpec { by, ascending }));
        Ok(self.derive(state))
    }

    pub fn limit(&self, n: u64) -> Result<RemoteFrame> {
        let mut state = self.state.clone();
        state.push_op(FrameOp::Limit(n));
        Ok(self.derive(state))
    }

    /// Substitutes a raw SQL template over the current state. The template
    /// must contain a `{source}` placeholder; the caller declares the
    /// resulting column layout.
    pub fn raw_transform(&self, template: &str, columns: &[(&str, &str)]) -> Result<RemoteFrame> {
        if !template.contains("{source}") {
            return Err(FrameError::InvalidOperation {
                frame: self.name.clone(),
                message: "raw transform template is missing the {source} placeholder".to_string(),
            });
        }
        let mut state = self.state.clone();
        state.push_op(FrameOp::Raw(template.to_string()));
        state.reset_catalog(
            columns
                .iter()
                .map(|(n, d)| (n.to_string(), Some(d.to_string())))
                .collect(),
        );
        Ok(self.derive(state))
    }

    /// Key-equality join against another frame on the same connection.
    /// Right-side columns whose names collide get a `_R` suffix.
    pub fn join(
        &self,
        right: &RemoteFrame,
        kind: JoinKind,
        on: &[(&str, &str)],
    ) -> Result<RemoteFrame> {
        if kind != JoinKind::Cross && on.is_empty() {
            return Err(FrameError::InvalidOperation {
                frame: self.name.clone(),
                message: "join requires at least one key pair".to_string(),
            });
        }
        for (l, r) in on {
            self.state.require_column(l)?;
            right.state.require_column(r)?;
        }
        let condition = on
            .iter()
            .map(|(l, r)| format!("jl.{} = jr.{}", ident(l), ident(r)))
            .collect::<Vec<_>>()
            .join(" AND ");

        let mut columns: Vec<(String, String)> = Vec::new();
        for name in self.state.columns() {
            columns.push((name.clone(), format!("jl.{}", ident(&name))));
        }
        let right_keys: Vec<&str> = on.iter().map(|(_, r)| *r).collect();
        for name in right.state.columns() {
            if right_keys.contains(&name.as_str()) {
                continue;
            }
            let out = if self.state.has_column(&name) {
                let renamed = format!("{name}_R");
                if self.state.has_column(&renamed)
                    || columns.iter().any(|(existing, _)| *existing == renamed)
                {
                    return Err(FrameError::DuplicateColumn {
                        column: renamed,
                        frame: self.name.clone(),
                    });
                }
                renamed
            } else {
                name.clone()
            };
            columns.push((out, format!("jr.{}", ident(&name))));
        }

        let mut state = self.state.clone();
        state.push_op(FrameOp::Join {
            right_sql: right.current_state(),
            kind,
            condition,
            columns: columns.clone(),
        });
        state.reset_catalog(columns.into_iter().map(|(n, _)| (n, None)).collect());
        Ok(self.derive(state))
    }

    /// Set union with another frame; column layouts must match exactly.
    pub fn union(&self, other: &RemoteFrame, all: bool) -> Result<RemoteFrame> {
        if self.columns() != other.columns() {
            return Err(FrameError::InvalidOperation {
                frame: self.name.clone(),
                message: format!(
                    "union requires matching column layouts ({:?} vs {:?})",
                    self.columns(),
                    other.columns()
                ),
            });
        }
        let mut state = self.state.clone();
        state.push_op(FrameOp::Union {
            right_sql: other.current_state(),
            all,
        });
        Ok(self.derive(state))
    }

    /// Grouped aggregation. `aggs` entries are (function, column, output
    /// name); `"*"` is accepted as the count column.
    pub fn group_by<S: AsRef<str>>(
        &self,
        keys: &[S],
        aggs: &[(AggFunc, &str, &str)],
    ) -> Result<RemoteFrame> {
        if keys.is_empty() {
            return Err(FrameError::InvalidOperation {
                frame: self.name.clone(),
                message: "group_by requires at least one key column".to_string(),
            });
        }
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        for key in &keys {
            self.state.require_column(key)?;
        }
        let mut rendered: Vec<(String, String)> = Vec::new();
        for (func, column, out) in aggs {
            if *column != "*" {
                self.state.require_column(column)?;
            }
            rendered.push((out.to_string(), func.render(column)));
        }
        let mut catalog: Vec<(String, Option<String>)> =
            keys.iter().map(|k| (k.clone(), None)).collect();
        for (out, _) in &rendered {
            catalog.push((out.clone(), None));
        }
        let mut state = self.state.clone();
        state.push_op(FrameOp::GroupBy {
            keys,
            aggs: rendered,
        });
        state.reset_catalog(catalog);
        Ok(self.derive(state))
    }

    /// Executes the accumulated chain and returns the rows.
    pub fn collect(&self) -> Result<TabularResult> {
        let sql = self.current_state();
        debug!(frame = %self.name, "collecting frame");
        self.conn.execute(&sql)?.ok_or_else(|| {
            FrameError::Connection(format!("frame query produced no result: {sql}"))
        })
    }

    /// First `n` rows of the chain.
    pub fn head(&self, n: u64) -> Result<TabularResult> {
        self.limit(n)?.collect()
    }
}

/// Shorthand used by procedure wrappers to wrap a produced output table.
pub(crate) fn wrap_output_table(conn: &Arc<dyn Connection>, name: &str) -> Result<RemoteFrame> {
    RemoteFrame::from_table(conn.clone(), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CmpOp;
    use crate::testing::MockConnection;

    fn bind() -> (Arc<MockConnection>, RemoteFrame) {
        let conn = MockConnection::new();
        conn.add_table(
            "ADMIN.IRIS",
            &[("ID", "BIGINT"), ("A", "DOUBLE"), ("B", "DOUBLE")],
        );
        let frame = RemoteFrame::from_table(conn.clone(), "ADMIN.IRIS").unwrap();
        conn.clear_statements();
        (conn, frame)
    }

    #[test]
    fn chaining_is_pure_and_issues_no_sql() {
        let (conn, f) = bind();
        let f2 = f.select(&["ID", "A"]).unwrap();
        let f3 = f2
            .filter(&Predicate::cmp("A", CmpOp::Lt, 5i64))
            .unwrap()
            .sort(&["A"], true)
            .unwrap();
        assert_eq!(conn.statements().len(), 0);
        // the originals are untouched
        assert_eq!(f.columns(), vec!["ID", "A", "B"]);
        assert_eq!(f2.columns(), vec!["ID", "A"]);
        assert!(!f3.is_bare());
    }

    #[test]
    fn select_keeps_frame_bare() {
        let (_conn, f) = bind();
        let f2 = f.select(&["ID", "A"]).unwrap();
        assert!(f2.is_bare());
        assert_eq!(f2.current_state(), "SELECT \"ID\", \"A\" FROM ADMIN.IRIS");
    }

    #[test]
    fn unknown_column_errors_carry_names() {
        let (_conn, f) = bind();
        let err = f.select(&["ID", "MISSING"]).unwrap_err();
        match err {
            FrameError::UnknownColumn { column, frame } => {
                assert_eq!(column, "MISSING");
                assert_eq!(frame, "ADMIN.IRIS");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn filter_validates_structured_predicates() {
        let (_conn, f) = bind();
        let err = f
            .filter(&Predicate::cmp("MISSING", CmpOp::Eq, 1i64))
            .unwrap_err();
        assert!(matches!(err, FrameError::UnknownColumn { .. }));
    }

    #[test]
    fn filtered_frame_renders_nested_state() {
        let (_conn, f) = bind();
        let f2 = f.filter(&Predicate::cmp("A", CmpOp::Lt, 5i64)).unwrap();
        assert_eq!(
            f2.current_state(),
            "SELECT \"ID\", \"A\", \"B\" FROM \
             (SELECT * FROM ADMIN.IRIS WHERE (\"A\" < 5)) t0"
        );
    }

    #[test]
    fn join_suffixes_colliding_columns() {
        let conn = MockConnection::new();
        conn.add_table("L", &[("K", "BIGINT"), ("A", "DOUBLE")]);
        conn.add_table("R", &[("K", "BIGINT"), ("A", "DOUBLE"), ("B", "DOUBLE")]);
        let left = RemoteFrame::from_table(conn.clone(), "L").unwrap();
        let right = RemoteFrame::from_table(conn.clone(), "R").unwrap();
        let joined = left.join(&right, JoinKind::Inner, &[("K", "K")]).unwrap();
        assert_eq!(joined.columns(), vec!["K", "A", "A_R", "B"]);
        let sql = joined.current_state();
        assert!(sql.contains("INNER JOIN"));
        assert!(sql.contains("jl.\"K\" = jr.\"K\""));
    }

    #[test]
    fn union_requires_matching_layouts() {
        let conn = MockConnection::new();
        conn.add_table("L", &[("A", "DOUBLE")]);
        conn.add_table("R", &[("B", "DOUBLE")]);
        let left = RemoteFrame::from_table(conn.clone(), "L").unwrap();
        let right = RemoteFrame::from_table(conn.clone(), "R").unwrap();
        assert!(matches!(
            left.union(&right, true),
            Err(FrameError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn group_by_reshapes_catalog() {
        let (_conn, f) = bind();
        let g = f
            .group_by(&["B"], &[(AggFunc::Avg, "A", "AVG_A"), (AggFunc::Count, "*", "N")])
            .unwrap();
        assert_eq!(g.columns(), vec!["B", "AVG_A", "N"]);
        let sql = g.current_state();
        assert!(sql.contains("GROUP BY \"B\""));
        assert!(sql.contains("AVG(\"A\") AS \"AVG_A\""));
        assert!(sql.contains("COUNT(*) AS \"N\""));
    }

    #[test]
    fn collect_runs_the_rendered_chain() {
        let (conn, f) = bind();
        conn.script_result(
            "SELECT \"ID\", \"A\", \"B\" FROM ADMIN.IRIS",
            Some(TabularResult::empty(vec![])),
        );
        f.collect().unwrap();
        assert_eq!(conn.statements().len(), 1);
    }

    #[test]
    fn dtypes_are_fetched_once_and_cached() {
        logutil::try_init();
        let (conn, f) = bind();
        let d = f.dtypes().unwrap();
        assert_eq!(d.len(), 3);
        assert_eq!(d[0].dtype, "BIGINT");
        f.dtypes().unwrap();
        // only the first access hit the engine
        assert_eq!(conn.statements().len(), 1);
    }

    #[test]
    fn indexer_must_exist() {
        let (_conn, mut f) = bind();
        assert!(f.set_indexer("ID").is_ok());
        assert!(matches!(
            f.set_indexer("MISSING"),
            Err(FrameError::UnknownColumn { .. })
        ));
    }
}
