//! Two-step clustering: a CF-tree pre-clustering pass followed by
//! hierarchical refinement, suited to large inputs and mixed column types.

use pushframe_core::call::{TEMP_TABLE_PREFIX, make_temp_name};
use pushframe_core::{AutoDeleteContext, ConnectionRef, Props, RemoteFrame, quote, quote_all};

use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "TWOSTEP",
    predict: "PREDICT_TWOSTEP",
    score: "MSE",
    score_inverted: false,
    id_column_in_output: Some("ID"),
    target_column_in_output: Some("CLUSTER_ID"),
    has_print_proc: true,
};

/// Training parameters for [`TwoStepClustering::fit`].
#[derive(Debug, Clone)]
pub struct TwoStepParams {
    pub id_column: Option<String>,
    pub target_column: Option<String>,
    pub in_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
    pub out_table: Option<String>,
    /// Number of clusters; 0 lets the engine pick up to `max_k`.
    pub k: i64,
    pub max_k: i64,
    pub bins: i64,
    pub statistics: Option<String>,
    pub rand_seed: i64,
    pub distance: String,
    pub distance_threshold: Option<f64>,
    pub distance_threshold_factor: f64,
    pub epsilon: f64,
    pub node_capacity: i64,
    pub leaf_capacity: i64,
    pub max_leaves: i64,
    pub outlier_fraction: f64,
}

impl Default for TwoStepParams {
    fn default() -> Self {
        TwoStepParams {
            id_column: None,
            target_column: None,
            in_columns: None,
            col_def_type: None,
            col_def_role: None,
            col_properties_table: None,
            out_table: None,
            k: 0,
            max_k: 20,
            bins: 10,
            statistics: None,
            rand_seed: 12345,
            distance: "loglikelihood".to_string(),
            distance_threshold: None,
            distance_threshold_factor: 2.0,
            epsilon: 0.0,
            node_capacity: 6,
            leaf_capacity: 8,
            max_leaves: 1000,
            outlier_fraction: 0.0,
        }
    }
}

impl TwoStepParams {
    opt_fn!(id_column, String);

    opt_fn!(target_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    opt_fn!(out_table, String);

    opt_fn!(statistics, String);

    pub fn k(mut self, k: i64) -> Self {
        self.k = k;
        self
    }

    pub fn max_k(mut self, max_k: i64) -> Self {
        self.max_k = max_k;
        self
    }

    pub fn bins(mut self, bins: i64) -> Self {
        self.bins = bins;
        self
    }

    pub fn rand_seed(mut self, rand_seed: i64) -> Self {
        self.rand_seed = rand_seed;
        self
    }

    pub fn distance(mut self, distance: impl Into<String>) -> Self {
        self.distance = distance.into();
        self
    }

    pub fn distance_threshold(mut self, distance_threshold: f64) -> Self {
        self.distance_threshold = Some(distance_threshold);
        self
    }

    pub fn outlier_fraction(mut self, outlier_fraction: f64) -> Self {
        self.outlier_fraction = outlier_fraction;
        self
    }
}

pub struct TwoStepClustering {
    model: PredictiveModel,
}

impl TwoStepClustering {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        TwoStepClustering {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Trains the clustering model and returns the assignment frame.
    pub fn fit(&self, in_df: &RemoteFrame, params: TwoStepParams) -> Result<RemoteFrame> {
        let (out_table, registered) = match &params.out_table {
            Some(n) => (n.clone(), false),
            None => {
                AutoDeleteContext::require_active("out_table")?;
                (make_temp_name(TEMP_TABLE_PREFIX), true)
            }
        };

        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set_opt("target", params.target_column.as_deref().map(quote))
            .set_opt("incolumn", params.in_columns.as_deref().map(quote_all))
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("colpropertiestable", params.col_properties_table)
            .set("k", params.k)
            .set("maxk", params.max_k)
            .set("bins", params.bins)
            .set_opt("statistics", params.statistics)
            .set("randseed", params.rand_seed)
            .set("distance", params.distance)
            .set_opt("distancethreshold", params.distance_threshold)
            .set("distancethresholdfactor", params.distance_threshold_factor)
            .set("epsilon", params.epsilon)
            .set("nodecapacity", params.node_capacity)
            .set("leafcapacity", params.leaf_capacity)
            .set("maxleaves", params.max_leaves)
            .set("outlierfraction", params.outlier_fraction)
            .set("outtable", out_table.as_str());
        self.model.fit(in_df, props, true)?;

        if registered {
            AutoDeleteContext::register(&out_table)?;
        }
        Ok(RemoteFrame::from_table(
            self.model.connection().clone(),
            &out_table,
        )?)
    }

    pub fn predict(
        &self,
        in_df: &RemoteFrame,
        out_table: Option<&str>,
        id_column: Option<&str>,
    ) -> Result<RemoteFrame> {
        let props = Props::new().set_opt("id", id_column.map(quote));
        self.model.predict(in_df, props, out_table)
    }

    pub fn score(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        id_column: Option<&str>,
    ) -> Result<f64> {
        let props = Props::new().set_opt("id", id_column.map(quote));
        self.model.score(in_df, props, target_column)
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
    fn fit_carries_the_tree_tuning_parameters() {
        let conn = MockConnection::new();
        conn.add_table("POINTS", &[("PID", "BIGINT"), ("X", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let df = RemoteFrame::from_table(conn.clone(), "POINTS").unwrap();
        let ts = TwoStepClustering::new(conn.clone(), "TS1");
        ts.fit(
            &df,
            TwoStepParams::default()
                .id_column("PID")
                .out_table("ASSIGN")
                .max_k(8),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("call NZA..TWOSTEP("))
            .cloned()
            .unwrap();
        assert!(call.contains("maxk=8"));
        assert!(call.contains("distance=loglikelihood"));
        assert!(call.contains("nodecapacity=6"));
        assert!(call.contains("outtable=ASSIGN"));
        // unset optional threshold is omitted
        assert!(!call.contains("distancethreshold="));
        assert!(call.contains("distancethresholdfactor=2"));
    }
}
