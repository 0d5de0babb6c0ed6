//! In-engine discretization: computing bin limits for numeric columns and
//! applying them to data sets.

use pushframe_core::call::{
    TEMP_TABLE_PREFIX, call_proc, call_proc_frame_in_out, make_temp_name,
};
use pushframe_core::materialize::TempView;
use pushframe_core::{AutoDeleteContext, ProcOutput, Props, RemoteFrame};

use crate::errors::{AnalyticsError, Result};

/// Computes bin limits with the given procedure and its fixed parameters.
fn fit_bins(
    proc: &str,
    base_props: Props,
    in_df: &RemoteFrame,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let mut props = Props::new();
    // all frame columns participate unless the procedure decides otherwise
    props.insert("incolumn", in_df.columns());
    props.extend(base_props);
    match call_proc_frame_in_out(proc, in_df, props, out_table, false)? {
        ProcOutput::Frame(df) => Ok(df),
        ProcOutput::Message(_) => Err(AnalyticsError::UnexpectedResult {
            proc: proc.to_string(),
            detail: "no bin table was produced".to_string(),
        }),
    }
}

/// Applies previously computed bin limits to a data set.
///
/// With `keep_org_values` the discretized columns are added next to the
/// originals (prefixed `disc_`); otherwise they replace them.
pub fn apply_disc(
    in_df: &RemoteFrame,
    in_bin_df: &RemoteFrame,
    keep_org_values: bool,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let conn = in_df.connection().clone();
    if out_table.is_none() {
        AutoDeleteContext::require_active("out_table")?;
    }

    let in_view = TempView::create(in_df)?;
    let bin_view = TempView::create(in_bin_df)?;

    let (out_name, registered) = match out_table {
        Some(n) => (n.to_string(), false),
        None => (make_temp_name(TEMP_TABLE_PREFIX), true),
    };

    let props = Props::new()
        .set("intable", in_view.name())
        .set("outtable", out_name.as_str())
        .set("btable", bin_view.name())
        .set("outtabletype", "table")
        .set("replace", !keep_org_values);
    call_proc(conn.as_ref(), "APPLY_DISC", &props)?;

    if registered {
        AutoDeleteContext::register(&out_name)?;
    }
    Ok(RemoteFrame::from_table(conn, &out_name)?)
}

/// Equal-width discretization.
pub struct EWDisc {
    bins: i64,
}

impl EWDisc {
    pub fn new(bins: i64) -> Self {
        EWDisc { bins }
    }

    /// Computes bin limits for every column of the frame.
    pub fn fit(&self, in_df: &RemoteFrame, out_table: Option<&str>) -> Result<RemoteFrame> {
        let props = Props::new().set("bins", self.bins);
        fit_bins("EWDISC", props, in_df, out_table)
    }

    pub fn apply(
        &self,
        in_df: &RemoteFrame,
        in_bin_df: &RemoteFrame,
        keep_org_values: bool,
        out_table: Option<&str>,
    ) -> Result<RemoteFrame> {
        apply_disc(in_df, in_bin_df, keep_org_values, out_table)
    }
}

/// Equal-frequency discretization.
pub struct EFDisc {
    bins: i64,
    bin_precision: f64,
}

impl EFDisc {
    pub fn new(bins: i64, bin_precision: f64) -> Self {
        EFDisc {
            bins,
            bin_precision,
        }
    }

    pub fn fit(&self, in_df: &RemoteFrame, out_table: Option<&str>) -> Result<RemoteFrame> {
        let props = Props::new()
            .set("bins", self.bins)
            .set("binprec", self.bin_precision);
        fit_bins("EFDISC", props, in_df, out_table)
    }

    pub fn apply(
        &self,
        in_df: &RemoteFrame,
        in_bin_df: &RemoteFrame,
        keep_org_values: bool,
        out_table: Option<&str>,
    ) -> Result<RemoteFrame> {
        apply_disc(in_df, in_bin_df, keep_org_values, out_table)
    }
}

/// Entropy-minimizing discretization against a class column.
pub struct EMDisc {
    target: String,
}

impl EMDisc {
    pub fn new(target: impl Into<String>) -> Self {
        EMDisc {
            target: target.into(),
        }
    }

    pub fn fit(&self, in_df: &RemoteFrame, out_table: Option<&str>) -> Result<RemoteFrame> {
        let props = Props::new().set("target", self.target.as_str());
        fit_bins("EMDISC", props, in_df, out_table)
    }

    pub fn apply(
        &self,
        in_df: &RemoteFrame,
        in_bin_df: &RemoteFrame,
        keep_org_values: bool,
        out_table: Option<&str>,
    ) -> Result<RemoteFrame> {
        apply_disc(in_df, in_bin_df, keep_org_values, out_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushframe_core::testing::MockConnection;

    #[test]
    fn fit_lists_all_frame_columns() {
        let conn = MockConnection::new();
        conn.add_table("DATA", &[("A", "DOUBLE"), ("B", "DOUBLE")]);
        let df = RemoteFrame::from_table(conn.clone(), "DATA").unwrap();
        conn.clear_statements();
        let disc = EWDisc::new(10);
        disc.fit(&df, Some("BINS")).unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("call NZA..EWDISC("))
            .cloned()
            .unwrap();
        assert!(call.contains("incolumn=A;B"));
        assert!(call.contains("bins=10"));
        assert!(call.contains("outtable=BINS"));
    }

    #[test]
    fn apply_disc_replaces_unless_told_otherwise() {
        let conn = MockConnection::new();
        conn.add_table("DATA", &[("A", "DOUBLE")]);
        conn.add_table("BINS", &[("COLNAME", "VARCHAR"), ("BREAK", "DOUBLE")]);
        let df = RemoteFrame::from_table(conn.clone(), "DATA").unwrap();
        let bins = RemoteFrame::from_table(conn.clone(), "BINS").unwrap();
        conn.clear_statements();
        apply_disc(&df, &bins, false, Some("DISCED")).unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("APPLY_DISC"))
            .cloned()
            .unwrap();
        assert!(call.contains("btable=BINS"));
        assert!(call.contains("replace=true"));
        assert!(call.contains("outtabletype=table"));
    }
}
