//! Linear regression with optional SVD solving and fit diagnostics.

use pushframe_core::{ConnectionRef, Props, RemoteFrame, quote, quote_all};

use super::regression::{self, PredictParams, RegressionScores};
use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "LINEAR_REGRESSION",
    predict: "PREDICT_LINEAR_REGRESSION",
    score: "MSE",
    score_inverted: false,
    id_column_in_output: Some("ID"),
    target_column_in_output: None,
    has_print_proc: true,
};

/// Training parameters for [`LinearRegression::fit`].
#[derive(Debug, Clone)]
pub struct LinearRegressionParams {
    pub id_column: Option<String>,
    pub in_columns: Option<Vec<String>>,
    pub nominal_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
    pub use_svd_solver: bool,
    pub intercept: bool,
    pub calculate_diagnostics: bool,
}

impl Default for LinearRegressionParams {
    fn default() -> Self {
        LinearRegressionParams {
            id_column: None,
            in_columns: None,
            nominal_columns: None,
            col_def_type: None,
            col_def_role: None,
            col_properties_table: None,
            use_svd_solver: false,
            intercept: true,
            calculate_diagnostics: false,
        }
    }
}

impl LinearRegressionParams {
    opt_fn!(id_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(nominal_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    pub fn use_svd_solver(mut self, use_svd_solver: bool) -> Self {
        self.use_svd_solver = use_svd_solver;
        self
    }

    pub fn intercept(mut self, intercept: bool) -> Self {
        self.intercept = intercept;
        self
    }

    pub fn calculate_diagnostics(mut self, calculate_diagnostics: bool) -> Self {
        self.calculate_diagnostics = calculate_diagnostics;
        self
    }
}

pub struct LinearRegression {
    model: PredictiveModel,
}

impl LinearRegression {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        LinearRegression {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    pub fn fit(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        params: LinearRegressionParams,
    ) -> Result<()> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set("target", quote(target_column))
            .set_opt("nominalCols", params.nominal_columns.as_deref().map(quote_all))
            .set_opt("incolumn", params.in_columns.as_deref().map(quote_all))
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("colpropertiestable", params.col_properties_table)
            .set("useSVDSolver", params.use_svd_solver)
            .set("intercept", params.intercept)
            .set("calculateDiagnostics", params.calculate_diagnostics);
        self.model.fit(in_df, props, true)
    }

    pub fn predict(&self, in_df: &RemoteFrame, params: PredictParams) -> Result<RemoteFrame> {
        regression::predict(&self.model, in_df, &params)
    }

    pub fn score(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        id_column: Option<&str>,
    ) -> Result<f64> {
        regression::score(&self.model, in_df, target_column, id_column)
    }

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
    fn fit_emits_solver_flags() {
        let conn = MockConnection::new();
        conn.add_table("TRAIN", &[("RID", "BIGINT"), ("Y", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let df = RemoteFrame::from_table(conn.clone(), "TRAIN").unwrap();
        let lr = LinearRegression::new(conn.clone(), "LR1");
        lr.fit(
            &df,
            "Y",
            LinearRegressionParams::default()
                .id_column("RID")
                .use_svd_solver(true),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("call NZA..LINEAR_REGRESSION("))
            .cloned()
            .unwrap();
        assert!(call.contains("useSVDSolver=true"));
        assert!(call.contains("intercept=true"));
        assert!(call.contains("calculateDiagnostics=false"));
    }
}
