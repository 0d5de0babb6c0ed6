//! K-nearest neighbors classification. Training only registers the data;
//! the neighbor search happens at prediction time, which is why the
//! hyperparameters live on predict and score.

use pushframe_core::{ConnectionRef, Props, RemoteFrame};

use super::classification;
use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "KNN",
    predict: "PREDICT_KNN",
    score: "CERROR",
    score_inverted: true,
    id_column_in_output: Some("ID"),
    target_column_in_output: Some("CLASS"),
    has_print_proc: false,
};

/// Training parameters for [`KNeighborsClassifier::fit`].
#[derive(Debug, Clone, Default)]
pub struct KnnFitParams {
    pub id_column: Option<String>,
    pub in_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
}

impl KnnFitParams {
    opt_fn!(id_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);
}

/// Neighbor-search options used by predict and score.
#[derive(Debug, Clone)]
pub struct KnnSearchParams {
    pub out_table: Option<String>,
    pub id_column: Option<String>,
    pub target_column: Option<String>,
    pub distance: String,
    pub k: i64,
    /// Standardize the input attributes before measuring distance.
    pub stand: bool,
    /// Use the engine's accelerated (approximate coreset) search.
    pub fast: bool,
    pub weights: Option<String>,
}

impl Default for KnnSearchParams {
    fn default() -> Self {
        KnnSearchParams {
            out_table: None,
            id_column: None,
            target_column: None,
            distance: "euclidean".to_string(),
            k: 3,
            stand: true,
            fast: true,
            weights: None,
        }
    }
}

impl KnnSearchParams {
    opt_fn!(out_table, String);

    opt_fn!(id_column, String);

    opt_fn!(target_column, String);

    opt_fn!(weights, String);

    pub fn distance(mut self, distance: impl Into<String>) -> Self {
        self.distance = distance.into();
        self
    }

    pub fn k(mut self, k: i64) -> Self {
        self.k = k;
        self
    }

    pub fn stand(mut self, stand: bool) -> Self {
        self.stand = stand;
        self
    }

    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    fn to_props(&self) -> Props {
        Props::new()
            .set_opt("id", self.id_column.as_deref())
            .set_opt("target", self.target_column.as_deref())
            .set("distance", self.distance.as_str())
            .set("k", self.k)
            .set("stand", self.stand)
            .set("fast", self.fast)
            .set_opt("weights", self.weights.as_deref())
    }
}

pub struct KNeighborsClassifier {
    model: PredictiveModel,
}

impl KNeighborsClassifier {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        KNeighborsClassifier {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Registers the training data as the model.
    pub fn fit(&self, in_df: &RemoteFrame, target_column: &str, params: KnnFitParams) -> Result<()> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref())
            .set("target", target_column)
            .set_opt("incolumn", params.in_columns)
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("colpropertiestable", params.col_properties_table);
        self.model.fit(in_df, props, true)
    }

    pub fn predict(&self, in_df: &RemoteFrame, params: KnnSearchParams) -> Result<RemoteFrame> {
        let props = params.to_props();
        self.model
            .predict(in_df, props, params.out_table.as_deref())
    }

    /// Classification accuracy under the given search options.
    pub fn score(
        &self,
        in_df: &RemoteFrame,
        id_column: &str,
        target_column: &str,
        params: KnnSearchParams,
    ) -> Result<f64> {
        let props = params.id_column(id_column).to_props();
        self.model.score(in_df, props, target_column)
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
    fn predict_carries_search_hyperparameters() {
        let conn = MockConnection::new();
        conn.add_table("TRAIN", &[("RID", "BIGINT"), ("X", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        let df = RemoteFrame::from_table(conn.clone(), "TRAIN").unwrap();
        let knn = KNeighborsClassifier::new(conn.clone(), "KNN1");
        knn.predict(
            &df,
            KnnSearchParams::default()
                .out_table("OUT_K")
                .id_column("RID")
                .k(7)
                .fast(false),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("PREDICT_KNN"))
            .cloned()
            .unwrap();
        assert!(call.contains("distance=euclidean"));
        assert!(call.contains("k=7"));
        assert!(call.contains("stand=true"));
        assert!(call.contains("fast=false"));
    }
}
