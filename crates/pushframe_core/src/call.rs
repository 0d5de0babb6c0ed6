//! Procedure invocation: property strings, quoting, temporary names.
//!
//! The engine's procedures take a single string argument in
//! `key=value,key2=value2` form. [`Props`] builds that payload with stable
//! key order, omitting unset values and joining list values with `;`.
//! Booleans render as lowercase `true`/`false` throughout.

use std::fmt;

use indexmap::IndexMap;
use rand::Rng;
use tracing::{debug, warn};

use crate::connection::{Connection, TabularResult};
use crate::errors::Result;
use crate::frame::{RemoteFrame, wrap_output_table};
use crate::materialize::materialize;
use crate::scope::AutoDeleteContext;

/// Schema the analytics procedures live in.
pub const PROC_SCHEMA: &str = "NZA";

/// Prefix for generated output table names.
pub const TEMP_TABLE_PREFIX: &str = "DATA_FRAME";

/// Prefix for materialized input view names.
pub const TEMP_VIEW_PREFIX: &str = "FRAME_VIEW";

/// Generates `<prefix>_<random>_<unix seconds>`. Uniqueness is
/// probabilistic; collisions are accepted as negligible, not locked out.
pub fn make_temp_name(prefix: &str) -> String {
    let n: u32 = rand::rng().random_range(0..100_000);
    format!("{prefix}_{n}_{}", chrono::Utc::now().timestamp())
}

/// Quotes a token for the procedure dialect.
///
/// Already-quoted tokens pass through unchanged. A token containing a colon
/// gets only the part before the *first* colon quoted: the suffix is a
/// typed annotation (`COL:nom`) and must stay bare. This is the procedure
/// dialect's rule, not generic SQL quoting.
pub fn quote(token: &str) -> String {
    if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
        return token.to_string();
    }
    match token.find(':') {
        Some(ix) => format!("\"{}\":{}", &token[..ix], &token[ix + 1..]),
        None => format!("\"{token}\""),
    }
}

/// Element-wise [`quote`] over a list.
pub fn quote_all<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    tokens.iter().map(|t| quote(t.as_ref())).collect()
}

/// One property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Text(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    List(Vec<String>),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Text(s) => write!(f, "{s}"),
            PropValue::Int(v) => write!(f, "{v}"),
            PropValue::Double(v) => write!(f, "{v}"),
            PropValue::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            PropValue::List(items) => write!(f, "{}", items.join(";")),
        }
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Text(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Text(v)
    }
}

impl From<&String> for PropValue {
    fn from(v: &String) -> Self {
        PropValue::Text(v.clone())
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(v as i64)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Double(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<Vec<String>> for PropValue {
    fn from(v: Vec<String>) -> Self {
        PropValue::List(v)
    }
}

/// Ordered property map. Insertion order is rendering order, which keeps
/// the payload stable across repeated renders of the same inputs.
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
}

impl Props {
    pub fn new() -> Props {
        Props::default()
    }

    /// Chainable insert. Empty lists are omitted, matching the treatment of
    /// unset values.
    pub fn set(mut self, key: &str, value: impl Into<PropValue>) -> Props {
        self.insert(key, value);
        self
    }

    /// Chainable insert of an optional value; `None` is omitted entirely.
    pub fn set_opt(mut self, key: &str, value: Option<impl Into<PropValue>>) -> Props {
        if let Some(v) = value {
            self.insert(key, v);
        }
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PropValue>) {
        let value = value.into();
        if let PropValue::List(items) = &value {
            if items.is_empty() {
                return;
            }
        }
        self.entries.insert(key.to_string(), value);
    }

    /// Appends every entry of `other`, preserving its order.
    pub fn extend(&mut self, other: Props) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.entries {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Issues `call NZA..<PROC>('<props>')`.
pub fn call_proc(
    conn: &dyn Connection,
    proc: &str,
    props: &Props,
) -> Result<Option<TabularResult>> {
    let sql = format!("call {PROC_SCHEMA}..{proc}('{props}')");
    debug!(%proc, "invoking in-database procedure");
    conn.execute(&sql)
}

/// What a frame-in/frame-out procedure call produced.
#[derive(Debug)]
pub enum ProcOutput {
    /// The declared output table exists; here it is as a frame.
    Frame(RemoteFrame),
    /// The call succeeded without producing a relation (print/test-style
    /// procedures); the raw engine result is passed through.
    Message(Option<TabularResult>),
}

impl ProcOutput {
    pub fn frame(self) -> Option<RemoteFrame> {
        match self {
            ProcOutput::Frame(df) => Some(df),
            ProcOutput::Message(_) => None,
        }
    }

    pub fn message(self) -> Option<TabularResult> {
        match self {
            ProcOutput::Frame(_) => None,
            ProcOutput::Message(res) => res,
        }
    }
}

/// The generic in/out procedure flow.
///
/// Materializes the input, resolves the output table name (explicit, or
/// generated-and-context-registered), issues the call, drops a temporary
/// input view on every path, and wraps the produced table. When the call
/// succeeds without producing the declared table, the raw result comes back
/// as [`ProcOutput::Message`] — a documented fork, not an error.
///
/// With no explicit `out_table` and no active [`AutoDeleteContext`], this
/// fails before any SQL is issued.
pub fn call_proc_frame_in_out(
    proc: &str,
    in_df: &RemoteFrame,
    mut props: Props,
    out_table: Option<&str>,
    copy_indexer: bool,
) -> Result<ProcOutput> {
    let conn = in_df.connection().clone();

    // Fail fast on a missing context before touching the database.
    if out_table.is_none() {
        AutoDeleteContext::require_active("out_table")?;
    }

    if let Some(out) = out_table {
        if conn.exists_table_or_view(out)? {
            conn.drop_table(out)?;
        }
    }

    let source = materialize(in_df)?;
    let out_name = match out_table {
        Some(n) => n.to_string(),
        None => make_temp_name(TEMP_TABLE_PREFIX),
    };

    props.insert("intable", source.name.as_str());
    props.insert("outtable", out_name.as_str());

    let sql = format!("call {PROC_SCHEMA}..{proc}('{props}')");
    debug!(%proc, intable = %source.name, outtable = %out_name, "invoking in-database procedure");
    let call_result = conn.execute(&sql);

    // The input view is dropped no matter how the call went; the call's own
    // error, if any, is what propagates.
    if source.is_temp {
        if let Err(e) = conn.drop_if_exists(&source.name) {
            warn!(view = %source.name, error = %e, "failed to drop temporary input view");
        }
    }
    let raw = call_result?;

    if !conn.exists_table_or_view(&out_name)? {
        // Successful call, no output relation produced.
        return Ok(ProcOutput::Message(raw));
    }

    if out_table.is_none() {
        AutoDeleteContext::register(&out_name)?;
    }

    let mut out_df = wrap_output_table(&conn, &out_name)?;
    if copy_indexer {
        if let Some(ix) = in_df.indexer() {
            if out_df.has_column(ix) {
                out_df.set_indexer(ix)?;
            }
        }
    }
    Ok(ProcOutput::Frame(out_df))
}
