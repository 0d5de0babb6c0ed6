//! Predicate construction for frame filtering.
//!
//! A [`Predicate`] is a rendered boolean where-clause plus the list of
//! columns it references, so the frame can validate references before the
//! operation is recorded. Predicates combine with [`Predicate::and`],
//! [`Predicate::or`] and [`Predicate::xor`].

use std::fmt;

use crate::connection::Value;
use crate::state::ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CmpOp {
    fn sql(&self) -> &'static str {
        match self {
            CmpOp::Lt => " < ",
            CmpOp::Le => " <= ",
            CmpOp::Eq => " = ",
            CmpOp::Ne => " != ",
            CmpOp::Ge => " >= ",
            CmpOp::Gt => " > ",
        }
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    clause: String,
    columns: Vec<String>,
}

impl Predicate {
    /// Single-column comparison against a literal.
    pub fn cmp(column: &str, op: CmpOp, value: impl Into<Value>) -> Predicate {
        Self::cmp_many(&[column], op, value)
    }

    /// Multi-column comparison: every listed column is compared against the
    /// same literal, joined with AND.
    pub fn cmp_many<S: AsRef<str>>(columns: &[S], op: CmpOp, value: impl Into<Value>) -> Predicate {
        let value = value.into();
        let rendered = literal(&value);
        let parts: Vec<String> = columns
            .iter()
            .map(|c| format!("{}{}{rendered}", ident(c.as_ref()), op.sql()))
            .collect();
        Predicate {
            clause: format!("({})", parts.join(" AND ")),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    /// Opaque SQL fragment. The caller is responsible for its validity; no
    /// column validation happens for raw predicates.
    pub fn raw(clause: impl Into<String>) -> Predicate {
        Predicate {
            clause: clause.into(),
            columns: Vec::new(),
        }
    }

    pub fn and(self, other: Predicate) -> Predicate {
        self.combine("(%l AND %r)", other)
    }

    pub fn or(self, other: Predicate) -> Predicate {
        self.combine("(%l OR %r)", other)
    }

    pub fn xor(self, other: Predicate) -> Predicate {
        self.combine("((NOT %l AND %r) OR (%l AND NOT %r))", other)
    }

    fn combine(self, template: &str, other: Predicate) -> Predicate {
        let clause = template
            .replace("%l", &self.clause)
            .replace("%r", &other.clause);
        let mut columns = self.columns;
        for c in other.columns {
            if !columns.contains(&c) {
                columns.push(c);
            }
        }
        Predicate { clause, columns }
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn referenced_columns(&self) -> &[String] {
        &self.columns
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_comparison() {
        let p = Predicate::cmp("A", CmpOp::Lt, 5i64);
        assert_eq!(p.clause(), "(\"A\" < 5)");
    }

    #[test]
    fn multi_column_fans_out_with_and() {
        let p = Predicate::cmp_many(&["A", "B"], CmpOp::Ge, 1.5);
        assert_eq!(p.clause(), "(\"A\" >= 1.5 AND \"B\" >= 1.5)");
        assert_eq!(p.referenced_columns(), ["A", "B"]);
    }

    #[test]
    fn text_literals_are_quoted_and_escaped() {
        let p = Predicate::cmp("SPECIES", CmpOp::Eq, "o'hara");
        assert_eq!(p.clause(), "(\"SPECIES\" = 'o''hara')");
    }

    #[test]
    fn combinators() {
        let a = Predicate::cmp("A", CmpOp::Lt, 5i64);
        let b = Predicate::cmp("B", CmpOp::Gt, 3i64);
        assert_eq!(
            a.clone().and(b.clone()).clause(),
            "((\"A\" < 5) AND (\"B\" > 3))"
        );
        assert_eq!(
            a.clone().or(b.clone()).clause(),
            "((\"A\" < 5) OR (\"B\" > 3))"
        );
        assert_eq!(
            a.xor(b).clause(),
            "((NOT (\"A\" < 5) AND (\"B\" > 3)) OR ((\"A\" < 5) AND NOT (\"B\" > 3)))"
        );
    }
}
