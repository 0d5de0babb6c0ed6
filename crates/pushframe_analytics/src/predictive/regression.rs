//! Conventions shared by the regression family: MSE scoring plus the
//! four-way score report (MSE, MAE, RSE, RAE).

use pushframe_core::call::{TEMP_TABLE_PREFIX, call_proc, make_temp_name};
use pushframe_core::materialize::TempView;
use pushframe_core::{Props, RemoteFrame, quote};
use tracing::warn;

use super::{PredictiveModel, scalar_f64};
use crate::errors::{AnalyticsError, Result};

pub use super::classification::PredictParams;

/// The four regression error measures of the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionScores {
    pub mse: f64,
    pub mae: f64,
    pub rse: f64,
    pub rae: f64,
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
    target_column: &str,
    id_column: Option<&str>,
) -> Result<f64> {
    let props = Props::new().set_opt("id", id_column.map(quote));
    model.score(in_df, props, target_column)
}

/// Scores the model with all four error measures in one prediction pass.
pub(crate) fn score_all(
    model: &PredictiveModel,
    in_df: &RemoteFrame,
    target_column: &str,
    id_column: Option<&str>,
) -> Result<RegressionScores> {
    let conn = model.connection().clone();
    let id = match id_column {
        Some(c) => quote(c),
        None => match in_df.indexer() {
            Some(ix) => quote(ix),
            None => return Err(AnalyticsError::MissingIdColumn),
        },
    };

    let out_table = make_temp_name(TEMP_TABLE_PREFIX);
    let result = score_all_inner(model, in_df, target_column, &id, &out_table);
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

fn score_all_inner(
    model: &PredictiveModel,
    in_df: &RemoteFrame,
    target_column: &str,
    id: &str,
    out_table: &str,
) -> Result<RegressionScores> {
    let conn = model.connection().clone();
    let props = Props::new().set("id", id);
    let pred_df = model.predict(in_df, props, Some(out_table))?;

    let pred_view = TempView::create(&pred_df)?;
    let true_view = TempView::create(in_df)?;

    let procs = model.procs();
    let score_props = Props::new()
        .set("pred_table", pred_view.name())
        .set("true_table", true_view.name())
        .set(
            "pred_id",
            match procs.id_column_in_output {
                Some(c) => quote(c),
                None => id.to_string(),
            },
        )
        .set("true_id", id)
        .set(
            "pred_column",
            match procs.target_column_in_output {
                Some(c) => quote(c),
                None => quote(target_column),
            },
        )
        .set("true_column", quote(target_column));

    let mut scores = [0.0f64; 4];
    for (slot, proc) in scores.iter_mut().zip(["MSE", "MAE", "RSE", "RAE"]) {
        *slot = scalar_f64(call_proc(conn.as_ref(), proc, &score_props)?, proc)?;
    }
    Ok(RegressionScores {
        mse: scores[0],
        mae: scores[1],
        rse: scores[2],
        rae: scores[3],
    })
}
