//! K-means clustering.
//!
//! Training assigns every instance to its closest cluster center and then
//! recomputes centers as the mean of their members, for a fixed number of
//! iterations. The fit itself produces an output table assigning a cluster
//! to every training row, which is returned as a frame.

use pushframe_core::call::{TEMP_TABLE_PREFIX, call_proc, make_temp_name};
use pushframe_core::{AutoDeleteContext, ConnectionRef, Props, RemoteFrame};

use super::classification::PredictParams;
use super::{PredictiveModel, ProcSet, scalar_f64};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "KMEANS",
    predict: "PREDICT_KMEANS",
    score: "MSE",
    score_inverted: false,
    id_column_in_output: Some("ID"),
    target_column_in_output: Some("CLUSTER_ID"),
    has_print_proc: false,
};

/// Training parameters for [`KMeans::fit`].
#[derive(Debug, Clone)]
pub struct KMeansParams {
    pub in_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
    /// Output table assigning clusters to the training rows; generated and
    /// context-registered when unset.
    pub out_table: Option<String>,
    /// Distance function: euclidean, norm_euclidean, manhattan, canberra,
    /// maximum or mahalanobis.
    pub distance: String,
    pub k: i64,
    pub max_iter: i64,
    pub rand_seed: i64,
    pub id_based: bool,
    pub statistics: Option<String>,
    /// Column transformation: L (leave), N (normalize), S (standardize).
    pub transform: String,
}

impl Default for KMeansParams {
    fn default() -> Self {
        KMeansParams {
            in_columns: None,
            col_def_type: None,
            col_def_role: None,
            col_properties_table: None,
            out_table: None,
            distance: "norm_euclidean".to_string(),
            k: 3,
            max_iter: 5,
            rand_seed: 12345,
            id_based: false,
            statistics: None,
            transform: "L".to_string(),
        }
    }
}

impl KMeansParams {
    opt_fn!(in_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    opt_fn!(out_table, String);

    opt_fn!(statistics, String);

    pub fn distance(mut self, distance: impl Into<String>) -> Self {
        self.distance = distance.into();
        self
    }

    pub fn k(mut self, k: i64) -> Self {
        self.k = k;
        self
    }

    pub fn max_iter(mut self, max_iter: i64) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn rand_seed(mut self, rand_seed: i64) -> Self {
        self.rand_seed = rand_seed;
        self
    }

    pub fn id_based(mut self, id_based: bool) -> Self {
        self.id_based = id_based;
        self
    }

    pub fn transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = transform.into();
        self
    }
}

pub struct KMeans {
    model: PredictiveModel,
}

impl KMeans {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        KMeans {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Trains the clustering model and returns the cluster-assignment
    /// frame the fit produced.
    pub fn fit(
        &self,
        in_df: &RemoteFrame,
        id_column: &str,
        target_column: &str,
        params: KMeansParams,
    ) -> Result<RemoteFrame> {
        let (out_table, registered) = match &params.out_table {
            Some(n) => (n.clone(), false),
            None => {
                AutoDeleteContext::require_active("out_table")?;
                (make_temp_name(TEMP_TABLE_PREFIX), true)
            }
        };

        let props = Props::new()
            .set("id", id_column)
            .set("target", target_column)
            .set_opt("incolumn", params.in_columns)
            .set_opt("coldeftype", params.col_def_type)
            .set_opt("coldefrole", params.col_def_role)
            .set_opt("colpropertiestable", params.col_properties_table)
            .set("distance", params.distance)
            .set("k", params.k)
            .set("maxiter", params.max_iter)
            .set("randseed", params.rand_seed)
            .set("idbased", params.id_based)
            .set_opt("statistics", params.statistics)
            .set("transform", params.transform)
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

    pub fn predict(&self, in_df: &RemoteFrame, params: PredictParams) -> Result<RemoteFrame> {
        let props = Props::new().set_opt("id", params.id_column.as_deref());
        self.model
            .predict(in_df, props, params.out_table.as_deref())
    }

    /// Mean squared distance of instances to their assigned cluster.
    pub fn score(&self, in_df: &RemoteFrame, id_column: &str, target_column: &str) -> Result<f64> {
        let props = Props::new().set("id", id_column);
        self.model.score(in_df, props, target_column)
    }

    /// Cluster description via the engine's PRINT_KMEANS.
    pub fn describe(&self) -> Result<String> {
        let props = Props::new().set("model", self.model.model_name());
        let res = call_proc(self.model.connection().as_ref(), "PRINT_KMEANS", &props)?;
        let text = res
            .as_ref()
            .and_then(|r| r.scalar())
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        match text {
            Some(s) => Ok(s),
            None => scalar_f64(res, "PRINT_KMEANS").map(|v| v.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushframe_core::TabularResult;
    use pushframe_core::testing::MockConnection;

    #[test]
    fn fit_returns_the_assignment_frame_and_registers_it() {
        let conn = MockConnection::new();
        conn.add_table("POINTS", &[("PID", "BIGINT"), ("X", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let df = RemoteFrame::from_table(conn.clone(), "POINTS").unwrap();
        conn.clear_statements();
        let km = KMeans::new(conn.clone(), "KM1");

        let out_name = {
            let _ctx = AutoDeleteContext::enter(conn.clone());
            let out = km
                .fit(&df, "PID", "X", KMeansParams::default().k(4))
                .unwrap();
            out.base_name().to_string()
        };

        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("call NZA..KMEANS("))
            .cloned()
            .unwrap();
        assert!(call.contains("id=PID"));
        assert!(call.contains("distance=norm_euclidean"));
        assert!(call.contains("k=4"));
        assert!(call.contains("idbased=false"));
        assert!(call.contains(&format!("outtable={out_name}")));
        // context exit removed the generated assignment table
        assert!(conn.statements().contains(&format!("DROP TABLE {out_name}")));
    }

    #[test]
    fn fit_without_context_and_without_out_table_fails_fast() {
        let conn = MockConnection::new();
        conn.add_table("POINTS", &[("PID", "BIGINT"), ("X", "DOUBLE")]);
        let df = RemoteFrame::from_table(conn.clone(), "POINTS").unwrap();
        conn.clear_statements();
        let km = KMeans::new(conn.clone(), "KM1");
        let err = km
            .fit(&df, "PID", "X", KMeansParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::AnalyticsError::Frame(pushframe_core::FrameError::MissingContext {
                param: "out_table"
            })
        ));
        assert_eq!(conn.statements().len(), 0);
    }
}
