//! Conventions shared by the classification family: CERROR scoring
//! (reported as `1 - error`), fixed `ID`/`CLASS` output columns, and the
//! confusion-matrix report.

use pushframe_core::call::{TEMP_TABLE_PREFIX, call_proc, make_temp_name};
use pushframe_core::materialize::TempView;
use pushframe_core::{AutoDeleteContext, Props, RemoteFrame, quote};
use tracing::warn;

use super::{PredictiveModel, scalar_f64};
use crate::errors::Result;

/// Prediction options common to the classification wrappers.
#[derive(Debug, Clone, Default)]
pub struct PredictParams {
    pub out_table: Option<String>,
    pub id_column: Option<String>,
}

impl PredictParams {
    pub fn out_table(mut self, out_table: impl Into<String>) -> Self {
        self.out_table = Some(out_table.into());
        self
    }

    pub fn id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = Some(id_column.into());
        self
    }
}

pub(crate) fn predict(
    model: &PredictiveModel,
    in_df: &RemoteFrame,
    params: &PredictParams,
) -> Result<RemoteFrame> {
    let props = Props::new().set_opt("id", params.id_column.as_deref().map(quote));
    model.predict(in_df, props, params.out_table.as_deref())
}

pub(crate) fn score(
    model: &PredictiveModel,
    in_df: &RemoteFrame,
    id_column: &str,
    target_column: &str,
) -> Result<f64> {
    let props = Props::new().set("id", quote(id_column));
    model.score(in_df, props, target_column)
}

/// Predicts over `in_df` and builds a confusion matrix against the true
/// classes, returning the matrix frame plus accuracy and weighted accuracy.
///
/// Without an explicit matrix table name this requires an active
/// [`AutoDeleteContext`], which then owns the produced table. The scratch
/// prediction table and any input views are cleaned up on every path.
pub(crate) fn conf_matrix(
    model: &PredictiveModel,
    in_df: &RemoteFrame,
    id_column: &str,
    target_column: &str,
    out_matrix_table: Option<&str>,
) -> Result<(RemoteFrame, f64, f64)> {
    let conn = model.connection().clone();
    if out_matrix_table.is_none() {
        AutoDeleteContext::require_active("out_matrix_table")?;
    }

    let out_table = make_temp_name(TEMP_TABLE_PREFIX);
    let result = conf_matrix_inner(model, in_df, id_column, target_column, out_matrix_table, &out_table);
    match conn.exists_table_or_view(&out_table) {
        Ok(true) => {
            if let Err(e) = conn.drop_table(&out_table) {
                warn!(table = %out_table, error = %e, "failed to drop scratch prediction table");
            }
        }
        Ok(false) => {}
        Err(e) => {
            warn!(table = %out_table, error = %e, "failed to look up scratch prediction table");
        }
    }
    result
}

fn conf_matrix_inner(
    model: &PredictiveModel,
    in_df: &RemoteFrame,
    id_column: &str,
    target_column: &str,
    out_matrix_table: Option<&str>,
    out_table: &str,
) -> Result<(RemoteFrame, f64, f64)> {
    let conn = model.connection().clone();
    let params = PredictParams::default()
        .out_table(out_table)
        .id_column(id_column);
    let pred_df = predict(model, in_df, &params)?;

    let pred_view = TempView::create(&pred_df)?;
    let true_view = TempView::create(in_df)?;

    let (matrix_table, registered) = match out_matrix_table {
        Some(n) => (n.to_string(), false),
        None => (make_temp_name(TEMP_TABLE_PREFIX), true),
    };

    let props = Props::new()
        .set("resulttable", pred_view.name())
        .set("intable", true_view.name())
        .set("resultid", "ID")
        .set("id", id_column)
        .set("resulttarget", "CLASS")
        .set("target", target_column)
        .set("matrixTable", matrix_table.as_str());
    call_proc(conn.as_ref(), "CONFUSION_MATRIX", &props)?;

    if registered {
        AutoDeleteContext::register(&matrix_table)?;
    }
    let out_df = RemoteFrame::from_table(conn.clone(), &matrix_table)?;

    let matrix_props = Props::new().set("matrixTable", matrix_table.as_str());
    let acc = scalar_f64(
        call_proc(conn.as_ref(), "CMATRIX_ACC", &matrix_props)?,
        "CMATRIX_ACC",
    )?;
    let wacc = scalar_f64(
        call_proc(conn.as_ref(), "CMATRIX_WACC", &matrix_props)?,
        "CMATRIX_WACC",
    )?;
    Ok((out_df, acc, wacc))
}
