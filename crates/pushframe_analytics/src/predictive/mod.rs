//! Shared plumbing for the fit/predict/score model families.
//!
//! Every predictive wrapper composes a [`PredictiveModel`]: the model name,
//! the procedure set of its family, and the conventions its output tables
//! follow. The wrappers themselves only marshal their typed parameters into
//! property maps.

pub mod association_rules;
pub mod bisecting_kmeans;
pub mod classification;
pub mod decision_trees;
pub mod glm;
pub mod kmeans;
pub mod knn;
pub mod linear_regression;
pub mod naive_bayes;
pub mod regression;
pub mod regression_trees;
pub mod timeseries;
pub mod two_step;

use pushframe_core::call::{TEMP_TABLE_PREFIX, call_proc, call_proc_frame_in_out, make_temp_name};
use pushframe_core::materialize::{TempView, materialize};
use pushframe_core::{ConnectionRef, ProcOutput, Props, RemoteFrame, TabularResult, quote};
use tracing::warn;

use crate::errors::{AnalyticsError, Result};
use crate::model_manager::ModelManager;

/// The procedure set and output conventions of one model family.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProcSet {
    pub fit: &'static str,
    pub predict: &'static str,
    pub score: &'static str,
    /// The score procedure reports an error rate; report `1 - value`.
    pub score_inverted: bool,
    /// Fixed id column name in prediction output tables, when the family
    /// has one.
    pub id_column_in_output: Option<&'static str>,
    /// Fixed prediction column name in output tables, when fixed.
    pub target_column_in_output: Option<&'static str>,
    pub has_print_proc: bool,
}

pub(crate) fn scalar_f64(res: Option<TabularResult>, proc: &str) -> Result<f64> {
    res.as_ref()
        .and_then(|r| r.scalar())
        .and_then(|v| v.as_f64())
        .ok_or_else(|| AnalyticsError::UnexpectedResult {
            proc: proc.to_string(),
            detail: "expected a numeric scalar result".to_string(),
        })
}

pub struct PredictiveModel {
    conn: ConnectionRef,
    model_name: String,
    procs: ProcSet,
}

impl PredictiveModel {
    pub(crate) fn new(conn: ConnectionRef, model_name: impl Into<String>, procs: ProcSet) -> Self {
        PredictiveModel {
            conn,
            model_name: model_name.into(),
            procs,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub(crate) fn connection(&self) -> &ConnectionRef {
        &self.conn
    }

    pub(crate) fn procs(&self) -> &ProcSet {
        &self.procs
    }

    /// Fills the `id` property from the frame indexer when the caller did
    /// not provide one; predictive procedures need a row identity.
    fn fill_id(&self, props: &mut Props, in_df: &RemoteFrame) -> Result<()> {
        if !props.contains("id") {
            match in_df.indexer() {
                Some(ix) => props.insert("id", quote(ix)),
                None => return Err(AnalyticsError::MissingIdColumn),
            }
        }
        Ok(())
    }

    /// Trains the model: any stale model of the same name is dropped, the
    /// input frame is materialized, and the family's fit procedure runs.
    /// A temporary input view is removed on every path.
    pub(crate) fn fit(&self, in_df: &RemoteFrame, params: Props, needs_id: bool) -> Result<()> {
        let mut props = Props::new()
            .set("model", self.model_name.as_str());
        let mut params = params;
        if needs_id {
            self.fill_id(&mut params, in_df)?;
        }

        ModelManager::new(self.conn.clone()).drop_model(&self.model_name)?;

        let source = materialize(in_df)?;
        props.insert("intable", source.name.as_str());
        props.extend(params);

        let result = call_proc(self.conn.as_ref(), self.procs.fit, &props);
        if source.is_temp {
            if let Err(e) = self.conn.drop_if_exists(&source.name) {
                warn!(view = %source.name, error = %e, "failed to drop temporary input view");
            }
        }
        result?;
        Ok(())
    }

    /// Applies the model to a frame. The model must exist.
    pub(crate) fn predict(
        &self,
        in_df: &RemoteFrame,
        params: Props,
        out_table: Option<&str>,
    ) -> Result<RemoteFrame> {
        if !ModelManager::new(self.conn.clone()).model_exists(&self.model_name)? {
            return Err(AnalyticsError::NoSuchModel(self.model_name.clone()));
        }
        let mut props = params;
        props.insert("model", self.model_name.as_str());
        match call_proc_frame_in_out(self.procs.predict, in_df, props, out_table, false)? {
            ProcOutput::Frame(df) => Ok(df),
            ProcOutput::Message(_) => Err(AnalyticsError::UnexpectedResult {
                proc: self.procs.predict.to_string(),
                detail: "no output table was produced".to_string(),
            }),
        }
    }

    /// Predicts into a scratch table and runs the family's score procedure
    /// over predicted vs. true values. All temporaries are cleaned up on
    /// every path; the score itself is what propagates.
    pub(crate) fn score(
        &self,
        in_df: &RemoteFrame,
        mut predict_params: Props,
        target_column: &str,
    ) -> Result<f64> {
        self.fill_id(&mut predict_params, in_df)?;
        let id = predict_params
            .get("id")
            .map(|v| v.to_string())
            .unwrap_or_default();

        let out_table = make_temp_name(TEMP_TABLE_PREFIX);
        let result = self.score_inner(in_df, predict_params, target_column, &id, &out_table);
        match self.conn.exists_table_or_view(&out_table) {
            Ok(true) => {
                if let Err(e) = self.conn.drop_table(&out_table) {
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

    fn score_inner(
        &self,
        in_df: &RemoteFrame,
        predict_params: Props,
        target_column: &str,
        id: &str,
        out_table: &str,
    ) -> Result<f64> {
        let pred_df = self.predict(in_df, predict_params, Some(out_table))?;

        let pred_view = TempView::create(&pred_df)?;
        let true_view = TempView::create(in_df)?;

        let props = Props::new()
            .set("pred_table", pred_view.name())
            .set("true_table", true_view.name())
            .set(
                "pred_id",
                match self.procs.id_column_in_output {
                    Some(c) => quote(c),
                    None => id.to_string(),
                },
            )
            .set("true_id", id)
            .set(
                "pred_column",
                match self.procs.target_column_in_output {
                    Some(c) => quote(c),
                    None => quote(target_column),
                },
            )
            .set("true_column", quote(target_column));

        let res = call_proc(self.conn.as_ref(), self.procs.score, &props)?;
        let value = scalar_f64(res, self.procs.score)?;
        Ok(if self.procs.score_inverted {
            1.0 - value
        } else {
            value
        })
    }

    /// Model description from the engine, for families with a print
    /// procedure; empty otherwise.
    pub fn describe(&self) -> Result<String> {
        if !self.procs.has_print_proc {
            return Ok(String::new());
        }
        let props = Props::new().set("model", self.model_name.as_str());
        let res = call_proc(self.conn.as_ref(), "PRINT_MODEL", &props)?;
        Ok(res
            .and_then(|r| {
                r.scalar()
                    .and_then(|v| v.as_str().map(|s| s.to_string()))
            })
            .unwrap_or_default())
    }
}
