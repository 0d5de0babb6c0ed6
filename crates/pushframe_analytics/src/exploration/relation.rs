//! Relation identification: correlation measures and statistical tests
//! between columns, optionally within groups.
//!
//! Several of these procedures only print their result when no grouping is
//! requested; callers therefore get a [`ProcOutput`] and decide what to do
//! with the message fork.

use pushframe_core::call::call_proc_frame_in_out;
use pushframe_core::{ProcOutput, Props, RemoteFrame, quote, quote_all};

use crate::errors::{AnalyticsError, Result};

fn relation(
    proc: &str,
    in_df: &RemoteFrame,
    props: Props,
    out_table: Option<&str>,
) -> Result<ProcOutput> {
    Ok(call_proc_frame_in_out(proc, in_df, props, out_table, false)?)
}

fn relation_frame(
    proc: &str,
    in_df: &RemoteFrame,
    props: Props,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    match relation(proc, in_df, props, out_table)? {
        ProcOutput::Frame(df) => Ok(df),
        ProcOutput::Message(_) => Err(AnalyticsError::UnexpectedResult {
            proc: proc.to_string(),
            detail: "no output table was produced".to_string(),
        }),
    }
}

fn columns_props(in_columns: &[&str], by_column: Option<&str>) -> Props {
    Props::new()
        .set("incolumn", quote_all(in_columns))
        .set_opt("by", by_column.map(quote))
}

/// Pearson correlation between two numeric columns.
pub fn corr(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    relation_frame("CORR", in_df, columns_props(in_columns, by_column), out_table)
}

/// Covariance between two numeric columns.
pub fn cov(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    relation_frame("COV", in_df, columns_props(in_columns, by_column), out_table)
}

/// Covariance matrix over the X/Y split of the input columns.
pub fn covariance_matrix(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    relation_frame(
        "COVARIANCEMATRIX",
        in_df,
        columns_props(in_columns, by_column),
        out_table,
    )
}

/// Spearman rank correlation between two ordered columns.
pub fn spearman_corr(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<ProcOutput> {
    relation(
        "SPEARMAN_CORR",
        in_df,
        columns_props(in_columns, by_column),
        out_table,
    )
}

/// Mutual information between two nominal columns.
pub fn mutual_info(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    relation_frame(
        "MUTUALINFO",
        in_df,
        columns_props(in_columns, by_column),
        out_table,
    )
}

/// Chi-square independence test between two nominal columns.
pub fn chisq(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    relation_frame(
        "CHISQ_TEST",
        in_df,
        columns_props(in_columns, by_column),
        out_table,
    )
}

/// t-test of a column mean against an expected mean.
pub fn t_me_test(
    in_df: &RemoteFrame,
    in_column: &str,
    mean_value: f64,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", quote(in_column))
        .set_opt("by", by_column.map(quote))
        .set("mean", mean_value);
    relation_frame("T_ME_TEST", in_df, props, out_table)
}

/// t-test of unpaired mean difference between two classes.
pub fn t_umd_test(
    in_df: &RemoteFrame,
    in_column: &str,
    class_column: &str,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", quote(in_column))
        .set_opt("by", by_column.map(quote))
        .set("class", quote(class_column));
    relation_frame("T_UMD_TEST", in_df, props, out_table)
}

/// t-test of paired mean difference between two columns.
pub fn t_pmd_test(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    expected_diff: f64,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = columns_props(in_columns, by_column).set("expdiff", expected_diff);
    relation_frame("T_PMD_TEST", in_df, props, out_table)
}

/// t-test of the least-squares slope between two columns.
pub fn t_ls_test(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    slope: f64,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = columns_props(in_columns, by_column).set("slope", slope);
    relation_frame("T_LS_TEST", in_df, props, out_table)
}

/// Mann-Whitney-Wilcoxon test on a column split into two classes.
/// Ungrouped runs may only print; the caller gets the fork.
pub fn mww_test(
    in_df: &RemoteFrame,
    in_column: &str,
    class_column: &str,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<ProcOutput> {
    let props = Props::new()
        .set("incolumn", quote(in_column))
        .set_opt("by", by_column.map(quote))
        .set("class", quote(class_column));
    relation("MWW_TEST", in_df, props, out_table)
}

/// Wilcoxon signed-rank test on two paired columns.
/// Ungrouped runs may only print; the caller gets the fork.
pub fn wilcoxon_test(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<ProcOutput> {
    relation(
        "WILCOXON_TEST",
        in_df,
        columns_props(in_columns, by_column),
        out_table,
    )
}

/// Canonical correlation over the X/Y split of the input columns.
pub fn canonical_corr(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    relation_frame(
        "CANONICAL_CORR",
        in_df,
        columns_props(in_columns, by_column),
        out_table,
    )
}

/// One-way ANOVA with a completely randomized design.
pub fn anova_crd_test(
    in_df: &RemoteFrame,
    in_columns: &[&str],
    treatment_column: &str,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = columns_props(in_columns, by_column).set("treatment", quote(treatment_column));
    relation_frame("ANOVA_CRD_TEST", in_df, props, out_table)
}

/// Two-way ANOVA with a randomized block design.
pub fn anova_rbd_test(
    in_df: &RemoteFrame,
    in_column: &str,
    treatment_column: &str,
    block_column: &str,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", quote(in_column))
        .set_opt("by", by_column.map(quote))
        .set("treatment", quote(treatment_column))
        .set("block", quote(block_column));
    relation_frame("ANOVA_RBD_TEST", in_df, props, out_table)
}

/// One-way MANOVA over a repeated-measures table.
pub fn manova_one_way_test(
    in_df: &RemoteFrame,
    in_column: &str,
    factor1_column: &str,
    id_column: Option<&str>,
    table_type: &str,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", quote(in_column))
        .set_opt("by", by_column.map(quote))
        .set("factor1", quote(factor1_column))
        .set("type", table_type)
        .set_opt("id", id_column.map(quote));
    relation_frame("MANOVA_ONE_WAY_TEST", in_df, props, out_table)
}

/// Two-way MANOVA over a repeated-measures table.
#[allow(clippy::too_many_arguments)]
pub fn manova_two_way_test(
    in_df: &RemoteFrame,
    in_column: &str,
    factor1_column: &str,
    factor2_column: &str,
    id_column: Option<&str>,
    table_type: &str,
    by_column: Option<&str>,
    out_table: Option<&str>,
) -> Result<RemoteFrame> {
    let props = Props::new()
        .set("incolumn", quote(in_column))
        .set_opt("by", by_column.map(quote))
        .set("factor1", quote(factor1_column))
        .set("factor2", quote(factor2_column))
        .set("type", table_type)
        .set_opt("id", id_column.map(quote));
    relation_frame("MANOVA_TWO_WAY_TEST", in_df, props, out_table)
}
