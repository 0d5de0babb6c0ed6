//! Turning a lazy frame into something a procedure can read.
//!
//! A frame with no sealed transformations *is* its base table and is used
//! directly. Anything else is realized as a temporary view which the caller
//! must drop once the consuming statement finished; [`TempView`] makes that
//! guarantee hold on every exit path.

use tracing::{debug, warn};

use crate::call::{TEMP_VIEW_PREFIX, make_temp_name};
use crate::connection::ConnectionRef;
use crate::errors::Result;
use crate::frame::RemoteFrame;

/// Outcome of [`materialize`]: a readable object name, and whether the
/// caller owns a temporary view that must be dropped afterwards.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub name: String,
    pub is_temp: bool,
}

/// Resolves a frame to a concrete, queryable object name.
///
/// Bare frames resolve to their base table with zero SQL issued. Frames
/// with pending transformations get a freshly named view created over
/// [`RemoteFrame::current_state`]. The view is intentionally *not*
/// registered with any cleanup context: input views are call-scoped, and
/// the context registry is reserved for output tables.
pub fn materialize(frame: &RemoteFrame) -> Result<Materialized> {
    if frame.is_bare() {
        return Ok(Materialized {
            name: frame.base_name().to_string(),
            is_temp: false,
        });
    }
    let name = make_temp_name(TEMP_VIEW_PREFIX);
    let sql = format!("CREATE VIEW {name} AS ({})", frame.current_state());
    frame.connection().execute(&sql)?;
    debug!(view = %name, "materialized frame as temporary view");
    Ok(Materialized {
        name,
        is_temp: true,
    })
}

/// RAII wrapper around [`materialize`]. On drop, a temporary view is
/// removed best-effort: a failed drop is logged at warn and never replaces
/// whatever error the surrounding flow is already propagating.
pub struct TempView {
    conn: ConnectionRef,
    name: String,
    is_temp: bool,
}

impl TempView {
    pub fn create(frame: &RemoteFrame) -> Result<TempView> {
        let materialized = materialize(frame)?;
        Ok(TempView {
            conn: frame.connection().clone(),
            name: materialized.name,
            is_temp: materialized.is_temp,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_temp(&self) -> bool {
        self.is_temp
    }
}

impl Drop for TempView {
    fn drop(&mut self) {
        if !self.is_temp {
            return;
        }
        if let Err(e) = self.conn.drop_if_exists(&self.name) {
            warn!(view = %self.name, error = %e, "failed to drop temporary input view");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CmpOp, Predicate};
    use crate::frame::RemoteFrame;
    use crate::testing::MockConnection;

    #[test]
    fn bare_frame_materializes_without_io() {
        let conn = MockConnection::new();
        conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE")]);
        let frame = RemoteFrame::from_table(conn.clone(), "T").unwrap();
        conn.clear_statements();

        let m = materialize(&frame).unwrap();
        assert_eq!(m.name, "T");
        assert!(!m.is_temp);
        assert_eq!(conn.statements().len(), 0);
    }

    #[test]
    fn select_only_frame_still_counts_as_bare() {
        let conn = MockConnection::new();
        conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE")]);
        let frame = RemoteFrame::from_table(conn.clone(), "T")
            .unwrap()
            .select(&["ID"])
            .unwrap();
        conn.clear_statements();

        let m = materialize(&frame).unwrap();
        assert_eq!((m.name.as_str(), m.is_temp), ("T", false));
        assert_eq!(conn.statements().len(), 0);
    }

    #[test]
    fn transformed_frame_creates_a_view() {
        let conn = MockConnection::new();
        conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE")]);
        let frame = RemoteFrame::from_table(conn.clone(), "T")
            .unwrap()
            .filter(&Predicate::cmp("A", CmpOp::Gt, 1i64))
            .unwrap();
        conn.clear_statements();

        let m = materialize(&frame).unwrap();
        assert!(m.is_temp);
        assert!(m.name.starts_with("FRAME_VIEW_"));
        let stmts = conn.statements();
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].starts_with(&format!("CREATE VIEW {} AS (", m.name)));
    }

    #[test]
    fn temp_view_guard_drops_on_all_paths() {
        let conn = MockConnection::new();
        conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE")]);
        let frame = RemoteFrame::from_table(conn.clone(), "T")
            .unwrap()
            .filter(&Predicate::cmp("A", CmpOp::Gt, 1i64))
            .unwrap();

        let name = {
            let view = TempView::create(&frame).unwrap();
            view.name().to_string()
        };
        assert!(
            conn.statements()
                .iter()
                .any(|s| s == &format!("DROP VIEW {name}"))
        );
    }

    #[test]
    fn temp_view_guard_is_noop_for_bare_frames() {
        let conn = MockConnection::new();
        conn.add_table("T", &[("ID", "BIGINT")]);
        let frame = RemoteFrame::from_table(conn.clone(), "T").unwrap();
        conn.clear_statements();
        {
            let view = TempView::create(&frame).unwrap();
            assert!(!view.is_temp());
        }
        assert_eq!(conn.statements().len(), 0);
    }
}
