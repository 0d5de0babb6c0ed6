//! Association rule mining over transaction tables (FP-growth in the
//! engine), and rule-based recommendation scoring.

use pushframe_core::{ConnectionRef, Props, RemoteFrame, quote};

use super::{PredictiveModel, ProcSet};
use crate::errors::Result;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "ARULE",
    predict: "PREDICT_ARULE",
    score: "",
    score_inverted: false,
    id_column_in_output: None,
    target_column_in_output: None,
    has_print_proc: true,
};

/// Mining parameters for [`AssociationRules::fit`].
#[derive(Debug, Clone)]
pub struct AssociationRulesParams {
    pub transaction_id_column: String,
    pub item_column: String,
    pub by_column: Option<String>,
    pub level: i64,
    pub max_set_size: i64,
    /// Minimum support; interpreted per `support_type`.
    pub support: Option<f64>,
    pub support_type: String,
    pub confidence: f64,
}

impl Default for AssociationRulesParams {
    fn default() -> Self {
        AssociationRulesParams {
            transaction_id_column: "tid".to_string(),
            item_column: "item".to_string(),
            by_column: None,
            level: 1,
            max_set_size: 6,
            support: None,
            support_type: "percent".to_string(),
            confidence: 0.5,
        }
    }
}

impl AssociationRulesParams {
    opt_fn!(by_column, String);

    pub fn transaction_id_column(mut self, transaction_id_column: impl Into<String>) -> Self {
        self.transaction_id_column = transaction_id_column.into();
        self
    }

    pub fn item_column(mut self, item_column: impl Into<String>) -> Self {
        self.item_column = item_column.into();
        self
    }

    pub fn level(mut self, level: i64) -> Self {
        self.level = level;
        self
    }

    pub fn max_set_size(mut self, max_set_size: i64) -> Self {
        self.max_set_size = max_set_size;
        self
    }

    pub fn support(mut self, support: f64) -> Self {
        self.support = Some(support);
        self
    }

    pub fn support_type(mut self, support_type: impl Into<String>) -> Self {
        self.support_type = support_type.into();
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Scoring parameters for [`AssociationRules::predict`].
#[derive(Debug, Clone)]
pub struct AssociationRulesPredictParams {
    pub out_table: Option<String>,
    pub transaction_id_column: String,
    pub item_column: String,
    pub by_column: Option<String>,
    /// Scoring behavior, e.g. `exclusiveRecommend` or `recommend`.
    pub scoring_type: String,
    pub name_map_column: Option<String>,
    pub item_name_column: String,
    pub item_name_mapped_column: String,
    pub min_size: i64,
    pub max_size: i64,
    pub min_support: f64,
    pub max_support: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub min_lift: Option<f64>,
    pub max_lift: Option<f64>,
    pub min_conviction: Option<f64>,
}

impl Default for AssociationRulesPredictParams {
    fn default() -> Self {
        AssociationRulesPredictParams {
            out_table: None,
            transaction_id_column: "tid".to_string(),
            item_column: "item".to_string(),
            by_column: None,
            scoring_type: "exclusiveRecommend".to_string(),
            name_map_column: None,
            item_name_column: "item".to_string(),
            item_name_mapped_column: "item_name".to_string(),
            min_size: 1,
            max_size: 64,
            min_support: 0.0,
            max_support: 1.0,
            min_confidence: 0.0,
            max_confidence: 1.0,
            min_lift: None,
            max_lift: None,
            min_conviction: None,
        }
    }
}

impl AssociationRulesPredictParams {
    opt_fn!(out_table, String);

    opt_fn!(by_column, String);

    opt_fn!(name_map_column, String);

    pub fn scoring_type(mut self, scoring_type: impl Into<String>) -> Self {
        self.scoring_type = scoring_type.into();
        self
    }

    pub fn min_size(mut self, min_size: i64) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn max_size(mut self, max_size: i64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn min_support(mut self, min_support: f64) -> Self {
        self.min_support = min_support;
        self
    }

    pub fn max_support(mut self, max_support: f64) -> Self {
        self.max_support = max_support;
        self
    }

    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn max_confidence(mut self, max_confidence: f64) -> Self {
        self.max_confidence = max_confidence;
        self
    }

    pub fn min_lift(mut self, min_lift: f64) -> Self {
        self.min_lift = Some(min_lift);
        self
    }

    pub fn max_lift(mut self, max_lift: f64) -> Self {
        self.max_lift = Some(max_lift);
        self
    }

    pub fn min_conviction(mut self, min_conviction: f64) -> Self {
        self.min_conviction = Some(min_conviction);
        self
    }
}

pub struct AssociationRules {
    model: PredictiveModel,
}

impl AssociationRules {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        AssociationRules {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Mines the rule set. Transactions need no row identity beyond the
    /// transaction id column, so no indexer is required.
    pub fn fit(&self, in_df: &RemoteFrame, params: AssociationRulesParams) -> Result<()> {
        let props = Props::new()
            .set("tid", quote(&params.transaction_id_column))
            .set("item", quote(&params.item_column))
            .set_opt("by", params.by_column.as_deref().map(quote))
            .set("lvl", params.level)
            .set("maxsetsize", params.max_set_size)
            .set_opt("support", params.support)
            .set("supporttype", params.support_type)
            .set("confidence", params.confidence);
        self.model.fit(in_df, props, false)
    }

    /// Applies the mined rules to transactions, producing recommendations.
    pub fn predict(
        &self,
        in_df: &RemoteFrame,
        params: AssociationRulesPredictParams,
    ) -> Result<RemoteFrame> {
        let props = Props::new()
            .set("tid", quote(&params.transaction_id_column))
            .set("item", quote(&params.item_column))
            .set_opt("by", params.by_column.as_deref().map(quote))
            .set("type", params.scoring_type.as_str())
            .set_opt("namemap", params.name_map_column.as_deref())
            .set("itemname", params.item_name_column.as_str())
            .set("itemnamemapped", params.item_name_mapped_column.as_str())
            .set("minsize", params.min_size)
            .set("maxsize", params.max_size)
            .set("minsupp", params.min_support)
            .set("maxsupp", params.max_support)
            .set("minconf", params.min_confidence)
            .set("maxconf", params.max_confidence)
            .set_opt("minlift", params.min_lift)
            .set_opt("maxlift", params.max_lift)
            .set_opt("minconv", params.min_conviction);
        self.model
            .predict(in_df, props, params.out_table.as_deref())
    }

    pub fn describe(&self) -> Result<String> {
        self.model.describe()
    }
}
