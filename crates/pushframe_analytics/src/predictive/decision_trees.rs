//! Decision tree classification.
//!
//! Decision trees decompose the training data with attribute-based splits
//! chosen to reduce class impurity, yielding a model that is both accurate
//! and human-readable. Growing, pruning against a validation set and
//! statistics collection all happen inside the engine.

use pushframe_core::{ConnectionRef, Props, RemoteFrame, quote, quote_all};

use super::classification;
use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "DECTREE",
    predict: "PREDICT_DECTREE",
    score: "CERROR",
    score_inverted: true,
    id_column_in_output: Some("ID"),
    target_column_in_output: Some("CLASS"),
    has_print_proc: true,
};

/// Training parameters for [`DecisionTreeClassifier::fit`].
#[derive(Debug, Clone)]
pub struct DecisionTreeParams {
    pub id_column: Option<String>,
    /// Columns with special properties, each optionally annotated with a
    /// type (`:nom`, `:cont`) and/or role (`:id`, `:target`, `:input`,
    /// `:ignore`) suffix.
    pub in_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
    pub weights: Option<String>,
    /// Split evaluation measure, `entropy` or `gini`.
    pub eval_measure: Option<String>,
    pub min_improve: f64,
    pub min_split: i64,
    pub max_depth: i64,
    pub val_table: Option<String>,
    pub val_weights: Option<String>,
    pub qmeasure: Option<String>,
    pub statistics: Option<String>,
}

impl Default for DecisionTreeParams {
    fn default() -> Self {
        DecisionTreeParams {
            id_column: None,
            in_columns: None,
            col_def_type: None,
            col_def_role: None,
            col_properties_table: None,
            weights: None,
            eval_measure: None,
            min_improve: 0.02,
            min_split: 50,
            max_depth: 10,
            val_table: None,
            val_weights: None,
            qmeasure: None,
            statistics: None,
        }
    }
}

impl DecisionTreeParams {
    opt_fn!(id_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    opt_fn!(weights, String);

    opt_fn!(eval_measure, String);

    opt_fn!(val_table, String);

    opt_fn!(val_weights, String);

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

/// Prediction options for [`DecisionTreeClassifier::predict`].
#[derive(Debug, Clone, Default)]
pub struct DecisionTreePredictParams {
    pub out_table: Option<String>,
    pub id_column: Option<String>,
    /// Include the probability of the predicted class in the output.
    pub prob: bool,
    pub out_table_prob: Option<String>,
}

impl DecisionTreePredictParams {
    opt_fn!(out_table, String);

    opt_fn!(id_column, String);

    opt_fn!(out_table_prob, String);

    pub fn prob(mut self, prob: bool) -> Self {
        self.prob = prob;
        self
    }
}

pub struct DecisionTreeClassifier {
    model: PredictiveModel,
}

impl DecisionTreeClassifier {
    /// Wraps the named model; if it does not exist yet it must be trained
    /// with [`DecisionTreeClassifier::fit`] before predicting or scoring.
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        DecisionTreeClassifier {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Grows the decision tree and stores its model in the database.
    pub fn fit(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        params: DecisionTreeParams,
    ) -> Result<()> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set("target", quote(target_column))
            .set_opt("incolumn", params.in_columns.as_deref().map(quote_all))
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("colpropertiestable", params.col_properties_table)
            .set_opt("weights", params.weights)
            .set_opt("eval", params.eval_measure)
            .set("minimprove", params.min_improve)
            .set("minsplit", params.min_split)
            .set("maxdepth", params.max_depth)
            .set_opt("valtable", params.val_table)
            .set_opt("valweights", params.val_weights)
            .set_opt("qmeasure", params.qmeasure)
            .set_opt("statistics", params.statistics);
        self.model.fit(in_df, props, true)
    }

    /// Makes predictions based on this model. The model must exist.
    pub fn predict(
        &self,
        in_df: &RemoteFrame,
        params: DecisionTreePredictParams,
    ) -> Result<RemoteFrame> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set("prob", params.prob)
            .set_opt("outtableprob", params.out_table_prob);
        self.model
            .predict(in_df, props, params.out_table.as_deref())
    }

    /// Classification accuracy against the true classes, `1 - CERROR`.
    pub fn score(&self, in_df: &RemoteFrame, id_column: &str, target_column: &str) -> Result<f64> {
        classification::score(&self.model, in_df, id_column, target_column)
    }

    /// Confusion matrix plus ACC and WACC for a labeled data set.
    pub fn conf_matrix(
        &self,
        in_df: &RemoteFrame,
        id_column: &str,
        target_column: &str,
        out_matrix_table: Option<&str>,
    ) -> Result<(RemoteFrame, f64, f64)> {
        classification::conf_matrix(&self.model, in_df, id_column, target_column, out_matrix_table)
    }

    pub fn describe(&self) -> Result<String> {
        self.model.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushframe_core::AutoDeleteContext;
    use pushframe_core::TabularResult;
    use pushframe_core::testing::MockConnection;

    fn setup() -> (std::sync::Arc<MockConnection>, RemoteFrame) {
        let conn = MockConnection::new();
        conn.add_table(
            "TRAIN",
            &[("ROW_ID", "BIGINT"), ("A", "DOUBLE"), ("LABEL", "VARCHAR")],
        );
        let df = RemoteFrame::from_table(conn.clone(), "TRAIN").unwrap();
        conn.clear_statements();
        (conn, df)
    }

    #[test]
    fn fit_emits_the_expected_call() {
        let (conn, df) = setup();
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let clf = DecisionTreeClassifier::new(conn.clone(), "TREE1");
        clf.fit(
            &df,
            "LABEL",
            DecisionTreeParams::default()
                .id_column("ROW_ID")
                .eval_measure("gini"),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("DECTREE"))
            .cloned()
            .unwrap();
        assert_eq!(
            call,
            "call NZA..DECTREE('model=TREE1,intable=TRAIN,id=\"ROW_ID\",\
             target=\"LABEL\",eval=gini,minimprove=0.02,minsplit=50,maxdepth=10')"
        );
    }

    #[test]
    fn fit_uses_the_frame_indexer_when_no_id_given() {
        let (conn, df) = setup();
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let df = df.with_indexer("ROW_ID").unwrap();
        let clf = DecisionTreeClassifier::new(conn.clone(), "TREE1");
        clf.fit(&df, "LABEL", DecisionTreeParams::default()).unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("DECTREE"))
            .cloned()
            .unwrap();
        assert!(call.contains("id=\"ROW_ID\""));
    }

    #[test]
    fn fit_without_id_or_indexer_fails() {
        let (conn, df) = setup();
        let clf = DecisionTreeClassifier::new(conn.clone(), "TREE1");
        let err = clf
            .fit(&df, "LABEL", DecisionTreeParams::default())
            .unwrap_err();
        assert!(matches!(err, crate::AnalyticsError::MissingIdColumn));
        assert_eq!(conn.statements().len(), 0);
    }

    #[test]
    fn predict_requires_an_existing_model() {
        let (conn, df) = setup();
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let clf = DecisionTreeClassifier::new(conn.clone(), "TREE1");
        let err = clf
            .predict(&df, DecisionTreePredictParams::default())
            .unwrap_err();
        assert!(matches!(err, crate::AnalyticsError::NoSuchModel(name) if name == "TREE1"));
    }

    #[test]
    fn predict_registers_its_output_with_the_context() {
        let (conn, df) = setup();
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        let clf = DecisionTreeClassifier::new(conn.clone(), "TREE1");
        let out_name = {
            let _ctx = AutoDeleteContext::enter(conn.clone());
            let out = clf
                .predict(&df, DecisionTreePredictParams::default().id_column("ROW_ID"))
                .unwrap();
            out.base_name().to_string()
        };
        assert!(out_name.starts_with("DATA_FRAME_"));
        assert!(
            conn.statements()
                .contains(&format!("DROP TABLE {out_name}"))
        );
    }

    #[test]
    fn conf_matrix_returns_matrix_and_accuracies() {
        let (conn, df) = setup();
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        conn.script_result("CMATRIX_ACC", Some(TabularResult::scalar_result(0.9)));
        conn.script_result("CMATRIX_WACC", Some(TabularResult::scalar_result(0.8)));
        conn.add_table(
            "MATRIX_T",
            &[("REAL", "VARCHAR"), ("PREDICTION", "VARCHAR"), ("CNT", "BIGINT")],
        );
        let clf = DecisionTreeClassifier::new(conn.clone(), "TREE1");
        let (matrix, acc, wacc) = clf
            .conf_matrix(&df, "ROW_ID", "LABEL", Some("MATRIX_T"))
            .unwrap();
        assert_eq!(matrix.base_name(), "MATRIX_T");
        assert!((acc - 0.9).abs() < 1e-9);
        assert!((wacc - 0.8).abs() < 1e-9);
        let cm = conn
            .statements()
            .iter()
            .find(|s| s.contains("CONFUSION_MATRIX"))
            .cloned()
            .unwrap();
        assert!(cm.contains("resultid=ID"));
        assert!(cm.contains("resulttarget=CLASS"));
        assert!(cm.contains("matrixTable=MATRIX_T"));
        // the scratch prediction table is gone afterwards
        let scratch_drops = conn
            .statements()
            .iter()
            .filter(|s| s.starts_with("DROP TABLE DATA_FRAME_"))
            .count();
        assert_eq!(scratch_drops, 1);
    }

    #[test]
    fn score_inverts_the_classification_error() {
        let (conn, df) = setup();
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        conn.script_result("CERROR", Some(TabularResult::scalar_result(0.25)));
        let clf = DecisionTreeClassifier::new(conn.clone(), "TREE1");
        let score = clf.score(&df, "ROW_ID", "LABEL").unwrap();
        assert!((score - 0.75).abs() < 1e-9);
        let cerror = conn
            .statements()
            .iter()
            .find(|s| s.contains("CERROR"))
            .cloned()
            .unwrap();
        assert!(cerror.contains("pred_id=\"ID\""));
        assert!(cerror.contains("true_id=\"ROW_ID\""));
        assert!(cerror.contains("pred_column=\"CLASS\""));
        assert!(cerror.contains("true_column=\"LABEL\""));
    }
}
