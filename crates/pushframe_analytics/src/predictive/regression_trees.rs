//! Regression tree modeling: tree-structured prediction of a continuous
//! target, grown and applied inside the engine.

use pushframe_core::{ConnectionRef, Props, RemoteFrame, quote, quote_all};

use super::regression::{self, RegressionScores};
use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "REGTREE",
    predict: "PREDICT_REGTREE",
    score: "MSE",
    score_inverted: false,
    id_column_in_output: Some("ID"),
    target_column_in_output: None,
    has_print_proc: true,
};

/// Training parameters for [`RegressionTree::fit`].
#[derive(Debug, Clone)]
pub struct RegressionTreeParams {
    pub id_column: Option<String>,
    pub in_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
    pub eval_measure: Option<String>,
    pub min_improve: f64,
    pub min_split: i64,
    pub max_depth: i64,
    pub val_table: Option<String>,
    pub qmeasure: Option<String>,
    pub statistics: Option<String>,
}

impl Default for RegressionTreeParams {
    fn default() -> Self {
        RegressionTreeParams {
            id_column: None,
            in_columns: None,
            col_def_type: None,
            col_def_role: None,
            col_properties_table: None,
            eval_measure: None,
            min_improve: 0.02,
            min_split: 50,
            max_depth: 10,
            val_table: None,
            qmeasure: None,
            statistics: None,
        }
    }
}

impl RegressionTreeParams {
    opt_fn!(id_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    opt_fn!(eval_measure, String);

    opt_fn!(val_table, String);

    opt_fn!(qmeasure, String);

    opt_fn!(statistics, String);

    pub fn min_improve(mut self, min_improve: f64) -> Self {
        self.min_improve = min_improve;
        self
    }

    pub fn min_split(mut self, min_split: i64) -> Self {
        self.min_split = min_split;
        self
    }

    pub fn max_depth(mut self, max_depth: i64) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Prediction options for [`RegressionTree::predict`].
#[derive(Debug, Clone, Default)]
pub struct RegressionTreePredictParams {
    pub out_table: Option<String>,
    pub id_column: Option<String>,
    /// Include the variance of the prediction in the output.
    pub variance: bool,
}

impl RegressionTreePredictParams {
    opt_fn!(out_table, String);

    opt_fn!(id_column, String);

    pub fn variance(mut self, variance: bool) -> Self {
        self.variance = variance;
        self
    }
}

pub struct RegressionTree {
    model: PredictiveModel,
}

impl RegressionTree {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        RegressionTree {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Grows the regression tree and stores its model in the database.
    pub fn fit(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        params: RegressionTreeParams,
    ) -> Result<()> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set("target", quote(target_column))
            .set_opt("incolumn", params.in_columns.as_deref().map(quote_all))
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("colpropertiestable", params.col_properties_table)
            .set_opt("eval", params.eval_measure)
            .set("minimprove", params.min_improve)
            .set("minsplit", params.min_split)
            .set("maxdepth", params.max_depth)
            .set_opt("valtable", params.val_table)
            .set_opt("qmeasure", params.qmeasure)
            .set_opt("statistics", params.statistics);
        self.model.fit(in_df, props, true)
    }

    pub fn predict(
        &self,
        in_df: &RemoteFrame,
        params: RegressionTreePredictParams,
    ) -> Result<RemoteFrame> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set("var", params.variance);
        self.model
            .predict(in_df, props, params.out_table.as_deref())
    }

    /// Mean squared error of the model on a labeled data set.
    pub fn score(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        id_column: Option<&str>,
    ) -> Result<f64> {
        regression::score(&self.model, in_df, target_column, id_column)
    }

    /// MSE, MAE, RSE and RAE in one prediction pass.
    pub fn score_all(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        id_column: Option<&str>,
    ) -> Result<RegressionScores> {
        regression::score_all(&self.model, in_df, target_column, id_column)
    }

    pub fn describe(&self) -> Result<String> {
        self.model.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushframe_core::TabularResult;
    use pushframe_core::testing::MockConnection;

    #[test]
    fn score_all_runs_all_four_measures() {
        let conn = MockConnection::new();
        conn.add_table("TRAIN", &[("ROW_ID", "BIGINT"), ("Y", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        for proc in ["MSE", "MAE", "RSE", "RAE"] {
            conn.script_result(
                &format!("call NZA..{proc}("),
                Some(TabularResult::scalar_result(0.5)),
            );
        }
        let df = RemoteFrame::from_table(conn.clone(), "TRAIN").unwrap();
        let tree = RegressionTree::new(conn.clone(), "RT1");
        let scores = tree.score_all(&df, "Y", Some("ROW_ID")).unwrap();
        assert_eq!(scores.mse, 0.5);
        assert_eq!(scores.rae, 0.5);
        let stmts = conn.statements();
        for proc in ["MSE", "MAE", "RSE", "RAE"] {
            assert!(stmts.iter().any(|s| s.contains(&format!("call NZA..{proc}("))));
        }
    }

    #[test]
    fn predict_carries_the_variance_flag() {
        let conn = MockConnection::new();
        conn.add_table("TRAIN", &[("ROW_ID", "BIGINT"), ("Y", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        let df = RemoteFrame::from_table(conn.clone(), "TRAIN").unwrap();
        let tree = RegressionTree::new(conn.clone(), "RT1");
        tree.predict(
            &df,
            RegressionTreePredictParams::default()
                .out_table("PRED_OUT")
                .id_column("ROW_ID")
                .variance(true),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("PREDICT_REGTREE"))
            .cloned()
            .unwrap();
        assert!(call.contains("var=true"));
        assert!(call.contains("outtable=PRED_OUT"));
    }
}
