//! Lazy DataFrame client core for a remote analytics engine.
//!
//! Frames accumulate relational operations as a replayable SQL expression
//! without touching the database; materialization, procedure invocation and
//! temporary-object lifecycle live here too. The engine connection is a
//! collaborator supplied by the embedding application — see [`Connection`].

pub mod call;
pub mod connection;
pub mod errors;
pub mod filter;
pub mod frame;
pub mod materialize;
pub mod scope;
pub mod state;
pub mod testing;

pub use call::{ProcOutput, Props, quote, quote_all};
pub use connection::{
    ColumnDesc, Connection, ConnectionRef, ObjectKind, TabularResult, Value,
};
pub use errors::{FrameError, Result};
pub use filter::{CmpOp, Predicate};
pub use frame::RemoteFrame;
pub use scope::{AutoDeleteContext, ContextGuard};
pub use state::{AggFunc, JoinKind};
