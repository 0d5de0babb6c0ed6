//! Scoped, guaranteed cleanup of temporary output tables.
//!
//! Procedure wrappers that are not given an explicit output name write into
//! a generated temporary table. Somebody has to delete those; an
//! [`AutoDeleteContext`] is the unit of work that does. Contexts form a
//! per-thread stack: entering pushes a fresh registry, dropping the guard
//! pops it and removes every object the context registered, tolerating ones
//! already gone and never letting one failed drop stop the rest.
//!
//! The stack is thread-local on purpose: two threads sharing a connection
//! must not clean up each other's temporaries. Guards are `!Send` so a
//! context cannot leak across threads.

use std::cell::RefCell;
use std::marker::PhantomData;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::call::make_temp_name;
use crate::connection::{ConnectionRef, ObjectKind};
use crate::errors::{FrameError, Result};

struct ContextInner {
    conn: ConnectionRef,
    tables: IndexSet<String>,
}

thread_local! {
    static STACK: RefCell<Vec<ContextInner>> = const { RefCell::new(Vec::new()) };
}

/// Namespace for the ambient context stack.
pub struct AutoDeleteContext;

impl AutoDeleteContext {
    /// Pushes a new context; the returned guard pops it (and deletes every
    /// registered object) when dropped.
    #[must_use = "dropping the guard immediately would end the context"]
    pub fn enter(conn: ConnectionRef) -> ContextGuard {
        let depth = STACK.with(|s| {
            let mut stack = s.borrow_mut();
            stack.push(ContextInner {
                conn,
                tables: IndexSet::new(),
            });
            stack.len() - 1
        });
        ContextGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Is any context active on this thread?
    pub fn is_active() -> bool {
        STACK.with(|s| !s.borrow().is_empty())
    }

    /// Fails fast with a configuration error naming the output parameter
    /// the caller should have set, before any I/O happens.
    pub fn require_active(param: &'static str) -> Result<()> {
        if Self::is_active() {
            Ok(())
        } else {
            Err(FrameError::MissingContext { param })
        }
    }

    /// Registers `name` with the innermost context.
    pub fn register(name: &str) -> Result<()> {
        STACK.with(|s| match s.borrow_mut().last_mut() {
            Some(ctx) => {
                ctx.tables.insert(name.to_string());
                Ok(())
            }
            None => Err(FrameError::InactiveContext(name.to_string())),
        })
    }

    /// Generates a fresh temporary name and registers it with the innermost
    /// context; fails (naming `param`) when no context is active.
    pub fn register_temp_output(prefix: &str, param: &'static str) -> Result<String> {
        Self::require_active(param)?;
        let name = make_temp_name(prefix);
        Self::register(&name)?;
        Ok(name)
    }

    #[cfg(test)]
    fn registered_of_current() -> Vec<String> {
        STACK.with(|s| {
            s.borrow()
                .last()
                .map(|ctx| ctx.tables.iter().cloned().collect())
                .unwrap_or_default()
        })
    }
}

/// RAII guard for one context. Not sendable across threads.
pub struct ContextGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// Explicit-handle registration: registers with *this* guard's context
    /// rather than whatever happens to be innermost.
    pub fn register(&self, name: &str) {
        STACK.with(|s| {
            let mut stack = s.borrow_mut();
            stack[self.depth].tables.insert(name.to_string());
        });
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let inner = STACK.with(|s| {
            let mut stack = s.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth + 1,
                "AutoDeleteContext guards must be dropped in LIFO order"
            );
            stack.pop()
        });
        let Some(inner) = inner else {
            return;
        };
        for name in &inner.tables {
            // Every registered name gets its drop attempt; one failure must
            // not prevent the rest.
            match inner.conn.object_kind(name) {
                Ok(ObjectKind::Absent) => {
                    debug!(table = %name, "temporary object already gone");
                }
                Ok(kind) => {
                    if let Err(e) = inner.conn.drop_object(name, kind) {
                        warn!(table = %name, error = %e, "failed to drop temporary object");
                    }
                }
                Err(e) => {
                    warn!(table = %name, error = %e, "failed to look up temporary object");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;

    #[test]
    fn register_requires_active_context() {
        assert!(!AutoDeleteContext::is_active());
        assert!(matches!(
            AutoDeleteContext::register("X"),
            Err(FrameError::InactiveContext(_))
        ));
        assert!(matches!(
            AutoDeleteContext::require_active("out_table"),
            Err(FrameError::MissingContext { param: "out_table" })
        ));
    }

    #[test]
    fn exit_drops_all_registered_tables_once() {
        let conn = MockConnection::new();
        conn.add_table("T1", &[("A", "INT")]);
        conn.add_table("T2", &[("A", "INT")]);
        conn.add_table("T3", &[("A", "INT")]);
        {
            let _ctx = AutoDeleteContext::enter(conn.clone());
            AutoDeleteContext::register("T1").unwrap();
            AutoDeleteContext::register("T2").unwrap();
            AutoDeleteContext::register("T2").unwrap(); // set semantics
            AutoDeleteContext::register("T3").unwrap();
        }
        let drops: Vec<String> = conn
            .statements()
            .iter()
            .filter(|s| s.starts_with("DROP TABLE"))
            .cloned()
            .collect();
        assert_eq!(drops, ["DROP TABLE T1", "DROP TABLE T2", "DROP TABLE T3"]);
        assert!(!AutoDeleteContext::is_active());
    }

    #[test]
    fn one_failing_drop_does_not_stop_the_rest() {
        let conn = MockConnection::new();
        conn.add_table("D1", &[("A", "INT")]);
        conn.add_table("D2", &[("A", "INT")]);
        conn.add_table("D3", &[("A", "INT")]);
        conn.fail_matching("DROP TABLE D2", "injected failure");
        {
            let _ctx = AutoDeleteContext::enter(conn.clone());
            for name in ["D1", "D2", "D3"] {
                AutoDeleteContext::register(name).unwrap();
            }
        }
        let drops: Vec<String> = conn
            .statements()
            .iter()
            .filter(|s| s.starts_with("DROP TABLE"))
            .cloned()
            .collect();
        // all three attempts happened, exactly once each
        assert_eq!(drops, ["DROP TABLE D1", "DROP TABLE D2", "DROP TABLE D3"]);
    }

    #[test]
    fn already_absent_objects_are_tolerated() {
        let conn = MockConnection::new();
        {
            let _ctx = AutoDeleteContext::enter(conn.clone());
            AutoDeleteContext::register("NEVER_CREATED").unwrap();
        }
        // no drop was attempted for an object the catalog does not know
        assert!(conn.statements().iter().all(|s| !s.contains("NEVER_CREATED")));
    }

    #[test]
    fn nested_contexts_are_isolated() {
        let conn = MockConnection::new();
        conn.add_table("OUTER_T", &[("A", "INT")]);
        conn.add_table("INNER_T", &[("A", "INT")]);
        {
            let _outer = AutoDeleteContext::enter(conn.clone());
            AutoDeleteContext::register("OUTER_T").unwrap();
            {
                let _inner = AutoDeleteContext::enter(conn.clone());
                AutoDeleteContext::register("INNER_T").unwrap();
                assert_eq!(AutoDeleteContext::registered_of_current(), ["INNER_T"]);
            }
            // inner exit dropped only its own registration
            assert!(conn.statements().contains(&"DROP TABLE INNER_T".to_string()));
            assert!(!conn.statements().contains(&"DROP TABLE OUTER_T".to_string()));
            assert_eq!(AutoDeleteContext::registered_of_current(), ["OUTER_T"]);
        }
        assert!(conn.statements().contains(&"DROP TABLE OUTER_T".to_string()));
    }

    #[test]
    fn explicit_guard_registration() {
        let conn = MockConnection::new();
        conn.add_table("VIA_GUARD", &[("A", "INT")]);
        {
            let ctx = AutoDeleteContext::enter(conn.clone());
            ctx.register("VIA_GUARD");
        }
        assert!(conn.statements().contains(&"DROP TABLE VIA_GUARD".to_string()));
    }

    #[test]
    fn register_temp_output_generates_and_registers() {
        let conn = MockConnection::new();
        {
            let _ctx = AutoDeleteContext::enter(conn.clone());
            let name = AutoDeleteContext::register_temp_output("DATA_FRAME", "out_table").unwrap();
            assert!(name.starts_with("DATA_FRAME_"));
            assert_eq!(AutoDeleteContext::registered_of_current(), [name]);
        }
    }
}
