//! Bisecting k-means: hierarchical clustering by repeated binary splits,
//! predictable at any level of the resulting cluster tree.

use pushframe_core::call::{TEMP_TABLE_PREFIX, make_temp_name};
use pushframe_core::{AutoDeleteContext, ConnectionRef, Props, RemoteFrame, quote, quote_all};

use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "DIVCLUSTER",
    predict: "PREDICT_DIVCLUSTER",
    score: "MSE",
    score_inverted: false,
    id_column_in_output: Some("ID"),
    target_column_in_output: Some("CLUSTER_ID"),
    has_print_proc: true,
};

/// Training parameters for [`BisectingKMeans::fit`].
#[derive(Debug, Clone)]
pub struct BisectingKMeansParams {
    pub id_column: Option<String>,
    pub target_column: Option<String>,
    pub in_columns: Option<Vec<String>>,
    pub col_def_type: Option<String>,
    pub col_def_role: Option<String>,
    pub col_properties_table: Option<String>,
    pub out_table: Option<String>,
    pub distance: String,
    pub max_iter: i64,
    pub min_split: i64,
    pub max_depth: i64,
    pub rand_seed: i64,
}

impl Default for BisectingKMeansParams {
    fn default() -> Self {
        BisectingKMeansParams {
            id_column: None,
            target_column: None,
            in_columns: None,
            col_def_type: None,
            col_def_role: None,
            col_properties_table: None,
            out_table: None,
            distance: "euclidean".to_string(),
            max_iter: 5,
            min_split: 5,
            max_depth: 3,
            rand_seed: 12345,
        }
    }
}

impl BisectingKMeansParams {
    opt_fn!(id_column, String);

    opt_fn!(target_column, String);

    opt_fn!(in_columns, Vec<String>);

    opt_fn!(col_def_type, String);

    opt_fn!(col_def_role, String);

    opt_fn!(col_properties_table, String);

    opt_fn!(out_table, String);

    pub fn distance(mut self, distance: impl Into<String>) -> Self {
        self.distance = distance.into();
        self
    }

    pub fn max_iter(mut self, max_iter: i64) -> Self {
        self.max_iter = max_iter;
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

    pub fn rand_seed(mut self, rand_seed: i64) -> Self {
        self.rand_seed = rand_seed;
        self
    }
}

/// Prediction options for [`BisectingKMeans::predict`].
#[derive(Debug, Clone)]
pub struct BisectingKMeansPredictParams {
    pub out_table: Option<String>,
    pub id_column: Option<String>,
    /// Hierarchy level to assign at; -1 means the leaf level.
    pub level: i64,
}

impl Default for BisectingKMeansPredictParams {
    fn default() -> Self {
        BisectingKMeansPredictParams {
            out_table: None,
            id_column: None,
            level: -1,
        }
    }
}

impl BisectingKMeansPredictParams {
    opt_fn!(out_table, String);

    opt_fn!(id_column, String);

    pub fn level(mut self, level: i64) -> Self {
        self.level = level;
        self
    }
}

pub struct BisectingKMeans {
    model: PredictiveModel,
}

impl BisectingKMeans {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        BisectingKMeans {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Trains the cluster tree and returns the assignment frame.
    pub fn fit(&self, in_df: &RemoteFrame, params: BisectingKMeansParams) -> Result<RemoteFrame> {
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
            .set("distance", params.distance)
            .set("maxiter", params.max_iter)
            .set("minsplit", params.min_split)
            .set("maxdepth", params.max_depth)
            .set("randseed", params.rand_seed)
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
        params: BisectingKMeansPredictParams,
    ) -> Result<RemoteFrame> {
        let props = Props::new()
            .set_opt("id", params.id_column.as_deref().map(quote))
            .set("level", params.level);
        self.model
            .predict(in_df, props, params.out_table.as_deref())
    }

    /// Mean squared distance at the given hierarchy level.
    pub fn score(
        &self,
        in_df: &RemoteFrame,
        target_column: &str,
        id_column: Option<&str>,
        level: i64,
    ) -> Result<f64> {
        let props = Props::new()
            .set_opt("id", id_column.map(quote))
            .set("level", level);
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
    fn predict_defaults_to_leaf_level() {
        let conn = MockConnection::new();
        conn.add_table("POINTS", &[("PID", "BIGINT"), ("X", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        let df = RemoteFrame::from_table(conn.clone(), "POINTS").unwrap();
        let bkm = BisectingKMeans::new(conn.clone(), "BK1");
        bkm.predict(
            &df,
            BisectingKMeansPredictParams::default().out_table("OUT_B"),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("PREDICT_DIVCLUSTER"))
            .cloned()
            .unwrap();
        assert!(call.contains("level=-1"));
    }
}
