//! Replayable expression state behind a lazy frame.
//!
//! A [`FrameState`] records where a frame came from (`base_name`), the
//! ordered transformations applied since (`ops`), and the live projection
//! (`catalog`). Nothing here touches the database: [`FrameState::current_state`]
//! is a pure rendering of the accumulated chain into a single SELECT.
//!
//! Pure column projection (select / add / drop / rename) only edits the
//! catalog. An operation whose meaning depends on what came before it
//! (filter, sort, join, union, group, limit, raw substitution) first seals
//! the pending projection into `ops`, so replay preserves application order.

use indexmap::IndexMap;

use crate::connection::ColumnDesc;
use crate::errors::{FrameError, Result};

/// Quotes a bare identifier for use in generated SQL.
pub(crate) fn ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// One catalog entry: the SQL expression a logical column renders to, and
/// the declared type when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnExpr {
    pub expr: String,
    pub dtype: Option<String>,
}

impl ColumnExpr {
    fn plain(name: &str, dtype: Option<String>) -> Self {
        ColumnExpr {
            expr: ident(name),
            dtype,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    fn sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT OUTER JOIN",
            JoinKind::Right => "RIGHT OUTER JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    fn sql(&self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }

    pub(crate) fn render(&self, column: &str) -> String {
        if column == "*" {
            format!("{}(*)", self.sql())
        } else {
            format!("{}({})", self.sql(), ident(column))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub by: Vec<String>,
    pub ascending: bool,
}

impl SortSpec {
    fn render(&self) -> String {
        let dir = if self.ascending { "ASC" } else { "DESC" };
        self.by
            .iter()
            .map(|c| format!("{} {dir}", ident(c)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A sealed transformation, replayed in order by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOp {
    /// Sealed projection layer: ordered (name, expression) pairs.
    Project(Vec<(String, String)>),
    /// Boolean where-clause over the previous state.
    Filter(String),
    Sort(SortSpec),
    Limit(u64),
    Join {
        right_sql: String,
        kind: JoinKind,
        condition: String,
        /// Ordered (name, qualified expression) output columns.
        columns: Vec<(String, String)>,
    },
    Union {
        right_sql: String,
        all: bool,
    },
    GroupBy {
        keys: Vec<String>,
        /// Ordered (name, aggregate expression) pairs.
        aggs: Vec<(String, String)>,
    },
    /// Raw SQL substituted over the previous state; the template must
    /// contain a `{source}` placeholder.
    Raw(String),
}

/// The accumulated, replayable definition of a lazy frame.
///
/// Copy-on-write is realized by value semantics: the struct owns all of its
/// collections, so a `clone` shares nothing with the original.
#[derive(Debug, Clone)]
pub struct FrameState {
    base_name: String,
    ops: Vec<FrameOp>,
    catalog: IndexMap<String, ColumnExpr>,
    /// Output column names of the last sealed layer (or the base object).
    sealed_columns: Vec<String>,
    indexer: Option<String>,
}

impl FrameState {
    pub fn new(base_name: impl Into<String>, columns: Vec<ColumnDesc>) -> Self {
        let catalog: IndexMap<String, ColumnExpr> = columns
            .into_iter()
            .map(|c| {
                let expr = ColumnExpr::plain(&c.name, Some(c.dtype));
                (c.name, expr)
            })
            .collect();
        let sealed_columns = catalog.keys().cloned().collect();
        FrameState {
            base_name: base_name.into(),
            ops: Vec::new(),
            catalog,
            sealed_columns,
            indexer: None,
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn columns(&self) -> Vec<String> {
        self.catalog.keys().cloned().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.catalog.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnExpr> {
        self.catalog.get(name)
    }

    pub fn indexer(&self) -> Option<&str> {
        self.indexer.as_deref()
    }

    pub fn ops(&self) -> &[FrameOp] {
        &self.ops
    }

    /// True when the frame is exactly the persisted object it was bound to:
    /// identity through zero sealed transformations.
    pub fn is_bare(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn set_indexer(&mut self, column: Option<String>) -> Result<()> {
        if let Some(c) = &column {
            self.require_column(c)?;
        }
        self.indexer = column;
        Ok(())
    }

    pub(crate) fn require_column(&self, name: &str) -> Result<()> {
        if self.catalog.contains_key(name) {
            Ok(())
        } else {
            Err(FrameError::UnknownColumn {
                column: name.to_string(),
                frame: self.base_name.clone(),
            })
        }
    }

    /// Restricts and reorders the catalog. The selection must be non-empty
    /// and every name must exist.
    pub(crate) fn project(&mut self, columns: &[String]) -> Result<()> {
        if columns.is_empty() {
            return Err(FrameError::EmptySelection {
                frame: self.base_name.clone(),
            });
        }
        let mut next = IndexMap::with_capacity(columns.len());
        for name in columns {
            self.require_column(name)?;
            if next
                .insert(name.clone(), self.catalog[name].clone())
                .is_some()
            {
                return Err(FrameError::DuplicateColumn {
                    column: name.clone(),
                    frame: self.base_name.clone(),
                });
            }
        }
        self.catalog = next;
        if let Some(ix) = &self.indexer {
            if !self.catalog.contains_key(ix) {
                self.indexer = None;
            }
        }
        Ok(())
    }

    pub(crate) fn add_column(&mut self, name: &str, expr: &str) -> Result<()> {
        if self.catalog.contains_key(name) {
            return Err(FrameError::DuplicateColumn {
                column: name.to_string(),
                frame: self.base_name.clone(),
            });
        }
        self.catalog.insert(
            name.to_string(),
            ColumnExpr {
                expr: expr.to_string(),
                dtype: None,
            },
        );
        Ok(())
    }

    pub(crate) fn drop_column(&mut self, name: &str) -> Result<()> {
        self.require_column(name)?;
        if self.catalog.len() == 1 {
            return Err(FrameError::EmptySelection {
                frame: self.base_name.clone(),
            });
        }
        self.catalog.shift_remove(name);
        if self.indexer.as_deref() == Some(name) {
            self.indexer = None;
        }
        Ok(())
    }

    pub(crate) fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        self.require_column(old)?;
        if old == new {
            return Ok(());
        }
        if self.catalog.contains_key(new) {
            return Err(FrameError::DuplicateColumn {
                column: new.to_string(),
                frame: self.base_name.clone(),
            });
        }
        let mut next = IndexMap::with_capacity(self.catalog.len());
        for (name, col) in &self.catalog {
            if name == old {
                next.insert(new.to_string(), col.clone());
            } else {
                next.insert(name.clone(), col.clone());
            }
        }
        self.catalog = next;
        if self.indexer.as_deref() == Some(old) {
            self.indexer = Some(new.to_string());
        }
        Ok(())
    }

    fn projection_is_identity(&self) -> bool {
        self.catalog.len() == self.sealed_columns.len()
            && self
                .catalog
                .iter()
                .zip(&self.sealed_columns)
                .all(|((name, col), sealed)| name == sealed && col.expr == ident(name))
    }

    /// Seals the pending projection into the op list so that a following
    /// order-sensitive operation sees the projected shape.
    fn seal_projection(&mut self) {
        if self.projection_is_identity() {
            return;
        }
        let layer: Vec<(String, String)> = self
            .catalog
            .iter()
            .map(|(name, col)| (name.clone(), col.expr.clone()))
            .collect();
        self.ops.push(FrameOp::Project(layer));
        self.sealed_columns = self.catalog.keys().cloned().collect();
        for (name, col) in self.catalog.iter_mut() {
            col.expr = ident(name);
        }
    }

    /// Appends an order-sensitive operation, sealing the projection first.
    pub(crate) fn push_op(&mut self, op: FrameOp) {
        self.seal_projection();
        self.ops.push(op);
    }

    /// Replaces the catalog after a shape-changing op (join, group).
    /// Entries are plain passthrough columns of the new layer.
    pub(crate) fn reset_catalog(&mut self, columns: Vec<(String, Option<String>)>) {
        self.catalog = columns
            .into_iter()
            .map(|(name, dtype)| {
                let col = ColumnExpr::plain(&name, dtype);
                (name, col)
            })
            .collect();
        self.sealed_columns = self.catalog.keys().cloned().collect();
        if let Some(ix) = &self.indexer {
            if !self.catalog.contains_key(ix) {
                self.indexer = None;
            }
        }
    }

    fn render_pairs(pairs: &[(String, String)]) -> String {
        pairs
            .iter()
            .map(|(name, expr)| {
                if *expr == ident(name) {
                    expr.clone()
                } else {
                    format!("{expr} AS {}", ident(name))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render_catalog(&self) -> String {
        let pairs: Vec<(String, String)> = self
            .catalog
            .iter()
            .map(|(name, col)| (name.clone(), col.expr.clone()))
            .collect();
        Self::render_pairs(&pairs)
    }

    /// Renders the whole chain as one SELECT expression. Pure and
    /// deterministic: same state, same SQL.
    pub fn current_state(&self) -> String {
        let mut source = self.base_name.clone();
        for (idx, op) in self.ops.iter().enumerate() {
            let sql = match op {
                FrameOp::Project(pairs) => {
                    format!("SELECT {} FROM {source}", Self::render_pairs(pairs))
                }
                FrameOp::Filter(clause) => {
                    format!("SELECT * FROM {source} WHERE {clause}")
                }
                FrameOp::Sort(spec) => {
                    format!("SELECT * FROM {source} ORDER BY {}", spec.render())
                }
                FrameOp::Limit(n) => {
                    format!("SELECT * FROM {source} LIMIT {n}")
                }
                FrameOp::Join {
                    right_sql,
                    kind,
                    condition,
                    columns,
                } => {
                    let cols = columns
                        .iter()
                        .map(|(name, expr)| format!("{expr} AS {}", ident(name)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    if *kind == JoinKind::Cross {
                        format!(
                            "SELECT {cols} FROM (SELECT * FROM {source}) jl {} ({right_sql}) jr",
                            kind.sql()
                        )
                    } else {
                        format!(
                            "SELECT {cols} FROM (SELECT * FROM {source}) jl {} ({right_sql}) jr ON {condition}",
                            kind.sql()
                        )
                    }
                }
                FrameOp::Union { right_sql, all } => {
                    let op = if *all { "UNION ALL" } else { "UNION" };
                    format!("SELECT * FROM {source} {op} {right_sql}")
                }
                FrameOp::GroupBy { keys, aggs } => {
                    let mut select: Vec<String> = keys.iter().map(|k| ident(k)).collect();
                    for (name, expr) in aggs {
                        select.push(format!("{expr} AS {}", ident(name)));
                    }
                    let key_list = keys
                        .iter()
                        .map(|k| ident(k))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "SELECT {} FROM {source} GROUP BY {key_list}",
                        select.join(", ")
                    )
                }
                FrameOp::Raw(template) => template.replace("{source}", &source),
            };
            source = format!("({sql}) t{idx}");
        }
        format!("SELECT {} FROM {source}", self.render_catalog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> FrameState {
        FrameState::new(
            "ADMIN.IRIS",
            vec![
                ColumnDesc::new("ID", "BIGINT"),
                ColumnDesc::new("A", "DOUBLE"),
                ColumnDesc::new("B", "DOUBLE"),
            ],
        )
    }

    #[test]
    fn bare_state_renders_plain_select() {
        let s = state();
        assert!(s.is_bare());
        assert_eq!(
            s.current_state(),
            "SELECT \"ID\", \"A\", \"B\" FROM ADMIN.IRIS"
        );
    }

    #[test]
    fn projection_stays_bare_and_reorders() {
        let mut s = state();
        s.project(&["B".to_string(), "ID".to_string()]).unwrap();
        assert!(s.is_bare());
        assert_eq!(s.columns(), vec!["B", "ID"]);
        assert_eq!(s.current_state(), "SELECT \"B\", \"ID\" FROM ADMIN.IRIS");
    }

    #[test]
    fn unknown_column_rejected_without_mutation() {
        let mut s = state();
        let err = s
            .project(&["ID".to_string(), "NOPE".to_string()])
            .unwrap_err();
        assert!(matches!(err, FrameError::UnknownColumn { .. }));
    }

    #[test]
    fn filter_seals_pending_projection() {
        let mut s = state();
        s.add_column("C", "\"A\" + \"B\"").unwrap();
        s.push_op(FrameOp::Filter("\"C\" > 1".to_string()));
        assert!(!s.is_bare());
        assert_eq!(
            s.current_state(),
            "SELECT \"ID\", \"A\", \"B\", \"C\" FROM \
             (SELECT * FROM \
             (SELECT \"ID\", \"A\", \"B\", \"A\" + \"B\" AS \"C\" FROM ADMIN.IRIS) t0 \
             WHERE \"C\" > 1) t1"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut s = state();
        s.push_op(FrameOp::Filter("\"A\" < 5".to_string()));
        assert_eq!(s.current_state(), s.current_state());
    }

    #[test]
    fn rename_keeps_origin_expression() {
        let mut s = state();
        s.rename_column("A", "ALPHA").unwrap();
        assert_eq!(
            s.current_state(),
            "SELECT \"ID\", \"A\" AS \"ALPHA\", \"B\" FROM ADMIN.IRIS"
        );
    }

    #[test]
    fn dropping_last_column_is_rejected() {
        let mut s = state();
        s.project(&["A".to_string()]).unwrap();
        assert!(matches!(
            s.drop_column("A"),
            Err(FrameError::EmptySelection { .. })
        ));
    }
}
