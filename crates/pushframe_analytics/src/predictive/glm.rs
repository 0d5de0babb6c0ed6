//! Generalized linear models. The distribution family and link function
//! are free parameters of the engine procedure; the common families get
//! shorthand constructors.

use pushframe_core::{ConnectionRef, Props, RemoteFrame, quote, quote_all};

use super::regression::{self, RegressionScores};
use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "GLM",
    predict: "PREDICT_GLM",
    score: "MSE",
    score_inverted: false,
    id_column_in_output: None,
    target_column_in_output: Some("PRED"),
    has_print_proc: true,
};

/// Training parameters for [`Glm::fit`].
#[derive(Debug, Clone)]
pub struct GlmParams {
    pub id_column: Option<String>,
    pub in_columns: Option<Vec<String>>,
    pub intercept: bool,
    /// Interaction terms, in the engine's formula syntax.
    pub interaction: Option<String>,
    pub family_param: f64,
    pub link: String,
    pub link_param: f64,
    pub max_iter: i64,
    pub epsilon: f64,
    pub tolerance: f64,
    /// Fitting method, `irls` or `psgd`.
    pub method: String,
    /// Trials column for binomial regression.
    pub trials: Option<String>,
    pub debug: bool,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
}

impl Default for GlmParams {
    fn default() -> Self {
        GlmParams {
            id_column: None,
            in_columns: None,
            intercept: true,
            interaction: None,
            family_param: -1.0,
            link: "logit".to_string(),
            link_param: 1.0,
            max_iter: 20,
            epsilon: 1e-3,
            tolerance: 1e-7,
            method: "irls".to_string(),
            trials: None,
            debug: false,
            col_def_type: None,
            col_def_role: None,
            col_properties_table: None,
        }
    }
}

impl GlmParams {
    opt_fn!(id_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(interaction, String);

    opt_fn!(trials, String);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    pub fn intercept(mut self, intercept: bool) -> Self {
        self.intercept = intercept;
        self
    }

    pub fn family_param(mut self, family_param: f64) -> Self {
        self.family_param = family_param;
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn link_param(mut self, link_param: f64) -> Self {
        self.link_param = link_param;
        self
    }

    pub fn max_iter(mut self, max_iter: i64) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

pub struct Glm {
    model: PredictiveModel,
    family: String,
}

impl Glm {
    /// A GLM with an explicit distribution family.
    pub fn new(
        conn: ConnectionRef,
        model_name: impl Into<String>,
        family: impl Into<String>,
    ) -> Self {
        Glm {
            model: PredictiveModel::new(conn, model_name, PROCS),
            family: family.into(),
        }
    }

    pub fn bernoulli(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        Self::new(conn, model_name, "bernoulli")
    }

    pub fn binomial(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        Self::new(conn, model_name, "binomial")
    }

    pub fn poisson(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        Self::new(conn, model_name, "poisson")
    }

    pub fn negativebinomial(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        Self::new(conn, model_name, "negativebinomial")
    }

    pub fn gaussian(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        Self::new(conn, model_name, "gaussian")
    }

    pub fn gamma(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        Self::new(conn, model_name, "gamma")
    }

    pub fn wald(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        Self::new(conn, model_name, "wald")
    }

    pub fn fit(&self, in_df: &RemoteFrame, target_column: &str, params: GlmParams) -> Result<()> {
        let props = Props::new()
            .set("family", self.family.as_str())
            .set("target", quote(target_column))
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set_opt("incolumn", params.in_columns.as_deref().map(quote_all))
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("colPropertiesTable", params.col_properties_table)
            .set("intercept", params.intercept)
            .set("family_param", params.family_param)
            .set("link", params.link)
            .set("link_param", params.link_param)
            .set("maxit", params.max_iter)
            .set("eps", params.epsilon)
            .set("tol", params.tolerance)
            .set("method", params.method)
            .set("debug", params.debug)
            .set_opt("interaction", params.interaction)
            .set_opt("trials", params.trials.as_deref().map(quote));
        self.model.fit(in_df, props, true)
    }

    pub fn predict(
        &self,
        in_df: &RemoteFrame,
        out_table: Option<&str>,
        id_column: Option<&str>,
        debug: bool,
    ) -> Result<RemoteFrame> {
        let props = Props::new()
            .set_opt("id", id_column.map(quote))
            .set("debug", debug);
        self.model.predict(in_df, props, out_table)
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
