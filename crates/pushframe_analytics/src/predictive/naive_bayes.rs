//! Naive Bayes classification, with optional in-engine discretization of
//! continuous attributes and m-estimation at prediction time.

use pushframe_core::{ConnectionRef, Props, RemoteFrame, quote, quote_all};

use super::classification;
use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "NAIVEBAYES",
    predict: "PREDICT_NAIVEBAYES",
    score: "CERROR",
    score_inverted: true,
    id_column_in_output: Some("ID"),
    target_column_in_output: Some("CLASS"),
    has_print_proc: false,
};

/// Training parameters for [`NaiveBayesClassifier::fit`].
#[derive(Debug, Clone, Default)]
pub struct NaiveBayesParams {
    pub id_column: Option<String>,
    pub in_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
    /// Discretization applied to continuous columns: `ew` (equal width),
    /// `ef` (equal frequency) or `em` (entropy minimization).
    pub disc: Option<String>,
    pub bins: Option<i64>,
}

impl NaiveBayesParams {
    opt_fn!(id_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    opt_fn!(disc, String);

    pub fn bins(mut self, bins: i64) -> Self {
        self.bins = Some(bins);
        self
    }
}

/// Prediction options for [`NaiveBayesClassifier::predict`].
#[derive(Debug, Clone, Default)]
pub struct NaiveBayesPredictParams {
    pub out_table: Option<String>,
    pub id_column: Option<String>,
    pub out_table_prob: Option<String>,
    /// Use m-estimation when computing conditional probabilities.
    pub mestimation: bool,
}

impl NaiveBayesPredictParams {
    opt_fn!(out_table, String);

    opt_fn!(id_column, String);

    opt_fn!(out_table_prob, String);

    pub fn mestimation(mut self, mestimation: bool) -> Self {
        self.mestimation = mestimation;
        self
    }
}

pub struct NaiveBayesClassifier {
    model: PredictiveModel,
}

impl NaiveBayesClassifier {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        NaiveBayesClassifier {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    pub fn fit(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        params: NaiveBayesParams,
    ) -> Result<()> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set("target", quote(target_column))
            .set_opt("incolumn", params.in_columns.as_deref().map(quote_all))
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("colpropertiestable", params.col_properties_table)
            .set_opt("disc", params.disc)
            .set_opt("bins", params.bins);
        self.model.fit(in_df, props, true)
    }

    pub fn predict(
        &self,
        in_df: &RemoteFrame,
        params: NaiveBayesPredictParams,
    ) -> Result<RemoteFrame> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set_opt("outtableProb", params.out_table_prob.as_deref())
            .set("mestimation", params.mestimation);
        self.model
            .predict(in_df, props, params.out_table.as_deref())
    }

    pub fn score(&self, in_df: &RemoteFrame, id_column: &str, target_column: &str) -> Result<f64> {
        classification::score(&self.model, in_df, id_column, target_column)
    }

    pub fn conf_matrix(
        &self,
        in_df: &RemoteFrame,
        id_column: &str,
        target_column: &str,
        out_matrix_table: Option<&str>,
    ) -> Result<(RemoteFrame, f64, f64)> {
        classification::conf_matrix(&self.model, in_df, id_column, target_column, out_matrix_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushframe_core::TabularResult;
    use pushframe_core::testing::MockConnection;

    #[test]
    fn fit_quotes_columns_and_keeps_disc_settings() {
        let conn = MockConnection::new();
        conn.add_table("TRAIN", &[("RID", "BIGINT"), ("X", "DOUBLE"), ("Y", "VARCHAR")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let df = RemoteFrame::from_table(conn.clone(), "TRAIN").unwrap();
        let nb = NaiveBayesClassifier::new(conn.clone(), "NB1");
        nb.fit(
            &df,
            "Y",
            NaiveBayesParams::default()
                .id_column("RID")
                .in_columns(vec!["X:cont".to_string()])
                .disc("ew")
                .bins(12),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("call NZA..NAIVEBAYES("))
            .cloned()
            .unwrap();
        assert!(call.contains("id=\"RID\""));
        assert!(call.contains("incolumn=\"X\":cont"));
        assert!(call.contains("disc=ew"));
        assert!(call.contains("bins=12"));
    }
}
