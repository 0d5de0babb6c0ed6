//! Data preparation procedures: normalization, imputation and sampling.
//! Each takes a frame in and hands a new frame back.

use pushframe_core::call::call_proc_frame_in_out;
use pushframe_core::{ProcOutput, Props, RemoteFrame};

use crate::errors::{AnalyticsError, Result};
use crate::opt_fn;

fn prepare(proc: &str, in_df: &RemoteFrame, props: Props, out_table: Option<&str>) -> Result<RemoteFrame> {
    match call_proc_frame_in_out(proc, in_df, props, out_table, false)? {
        ProcOutput::Frame(df) => Ok(df),
        ProcOutput::Message(_) => Err(AnalyticsError::UnexpectedResult {
            proc: proc.to_string(),
            detail: "no output table was produced".to_string(),
        }),
    }
}

/// Normalizes/standardizes columns of the input frame.
///
/// `in_column` follows the engine syntax: `;`-separated column names, each
/// optionally annotated with `:L` (leave), `:S` (standardize), `:N`
/// (normalize) or `:U` (unit length).
pub fn std_norm(
    in_df: &RemoteFrame,
    id_column: &str,
    in_column: &str,
    by: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("id", id_column)
        .set("incolumn", in_column)
        .set_opt("by", by);
    prepare("STD_NORM", in_df, props, out_table)
}

/// Options for [`impute_data`].
#[derive(Debug, Clone)]
pub struct ImputeParams {
    pub in_column: Option<String>,
    /// Replacement strategy: mean, median, freq or replace.
    pub method: Option<String>,
    pub numeric_value: f64,
    pub nominal_value: String,
}

impl Default for ImputeParams {
    fn default() -> Self {
        ImputeParams {
            in_column: None,
            method: None,
            numeric_value: -1.0,
            nominal_value: "missing".to_string(),
        }
    }
}

impl ImputeParams {
    opt_fn!(in_column, String);

    opt_fn!(method, String);

    pub fn numeric_value(mut self, numeric_value: f64) -> Self {
        self.numeric_value = numeric_value;
        self
    }

    pub fn nominal_value(mut self, nominal_value: impl Into<String>) -> Self {
        self.nominal_value = nominal_value.into();
        self
    }
}

/// Replaces missing values in the input frame.
pub fn impute_data(
    in_df: &RemoteFrame,
    params: ImputeParams,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set_opt("incolumn", params.in_column)
        .set_opt("method", params.method)
        .set("numericvalue", params.numeric_value)
        .set("nominalvalue", params.nominal_value);
    prepare("IMPUTE_DATA", in_df, props, out_table)
}

/// Draws a random sample of the input frame, by row count or fraction.
pub fn random_sample(
    in_df: &RemoteFrame,
    size: i64,
    fraction: Option<f64>,
    by: Option<&str>,
    rand_seed: Option<i64>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("size", size)
        .set_opt("fraction", fraction)
        .set_opt("by", by)
        .set_opt("randseed", rand_seed);
    prepare("RANDOM_SAMPLE", in_df, props, out_table)
}
