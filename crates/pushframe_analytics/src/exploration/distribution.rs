//! Distribution summaries of single columns and column pairs.

use pushframe_core::call::call_proc_frame_in_out;
use pushframe_core::{ProcOutput, Props, RemoteFrame};

use crate::errors::{AnalyticsError, Result};
use crate::opt_fn;

fn explore(
    proc: &str,
    in_df: &RemoteFrame,
    props: Props,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    match call_proc_frame_in_out(proc, in_df, props, out_table, false)? {
        ProcOutput::Frame(df) => Ok(df),
        ProcOutput::Message(_) => Err(AnalyticsError::UnexpectedResult {
            proc: proc.to_string(),
            detail: "no output table was produced".to_string(),
        }),
    }
}

/// Moments of a numeric column (mean, variance, skewness, kurtosis),
/// optionally grouped.
pub fn moments(
    in_df: &RemoteFrame,
    in_column: &str,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", in_column)
        .set_opt("by", by_column);
    explore("MOMENTS", in_df, props, out_table)
}

/// Quantile limits of a numeric column.
pub fn quantile(
    in_df: &RemoteFrame,
    in_column: &str,
    quantiles: &[i64],
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", in_column)
        .set(
            "quantiles",
            quantiles.iter().map(|q| q.to_string()).collect::<Vec<_>>(),
        );
    explore("QUANTILE", in_df, props, out_table)
}

/// IQR-based outlier detection on a numeric column.
pub fn outliers(
    in_df: &RemoteFrame,
    in_column: &str,
    multiplier: f64,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", in_column)
        .set("multiplier", multiplier);
    explore("OUTLIERS", in_df, props, out_table)
}

/// Univariate frequency table of one column.
pub fn unitable(
    in_df: &RemoteFrame,
    in_column: &str,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new().set("incolumn", in_column);
    explore("UNITABLE", in_df, props, out_table)
}

/// Bivariate frequency table of two columns.
pub fn bitable(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    freq: bool,
    cum: bool,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set(
            "incolumn",
            in_columns.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
        )
        .set("freq", freq)
        .set("cum", cum);
    explore("BITABLE", in_df, props, out_table)
}

/// Options for [`histogram`].
#[derive(Debug, Clone)]
pub struct HistogramParams {
    pub nbreaks: Option<i64>,
    /// Right-closed bin intervals.
    pub right: bool,
    /// Table with externally supplied break points.
    pub btable: Option<String>,
    pub bcolumn: Option<String>,
    pub density: bool,
    pub midpoints: bool,
    pub freq: bool,
    pub cum: bool,
}

impl Default for HistogramParams {
    fn default() -> Self {
        HistogramParams {
            nbreaks: None,
            right: true,
            btable: None,
            bcolumn: None,
            density: false,
            midpoints: false,
            freq: false,
            cum: false,
        }
    }
}

impl HistogramParams {
    opt_fn!(btable, String);

    opt_fn!(bcolumn, String);

    pub fn nbreaks(mut self, nbreaks: i64) -> Self {
        self.nbreaks = Some(nbreaks);
        self
    }

    pub fn right(mut self, right: bool) -> Self {
        self.right = right;
        self
    }

    pub fn density(mut self, density: bool) -> Self {
        self.density = density;
        self
    }

    pub fn midpoints(mut self, midpoints: bool) -> Self {
        self.midpoints = midpoints;
        self
    }

    pub fn freq(mut self, freq: bool) -> Self {
        self.freq = freq;
        self
    }

    pub fn cum(mut self, cum: bool) -> Self {
        self.cum = cum;
        self
    }
}

/// Histogram of a column, with automatic or supplied break points.
pub fn histogram(
    in_df: &RemoteFrame,
    in_column: &str,
    params: HistogramParams,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", in_column)
        .set_opt("nbreaks", params.nbreaks)
        .set("right", params.right)
        .set_opt("btable", params.btable)
        .set_opt("bcolumn", params.bcolumn)
        .set("density", params.density)
        .set("midpoints", params.midpoints)
        .set("freq", params.freq)
        .set("cum", params.cum);
    explore("HIST", in_df, props, out_table)
}
