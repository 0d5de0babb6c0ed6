//! End-to-end flows against the mock connection: build a lazy frame, run a
//! fit-style procedure inside a cleanup context, and watch the temporary
//! objects go away on context exit.

use pushframe_analytics::predictive::decision_trees::{
    DecisionTreeClassifier, DecisionTreeParams, DecisionTreePredictParams,
};
use pushframe_analytics::predictive::kmeans::{KMeans, KMeansParams};
use pushframe_core::testing::MockConnection;
use pushframe_core::{AutoDeleteContext, RemoteFrame, TabularResult};

#[test]
fn lazy_chain_then_fit_with_bare_input() {
    logutil::try_init();

    let conn = MockConnection::new();
    conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE"), ("B", "DOUBLE")]);
    let f = RemoteFrame::from_table(conn.clone(), "T").unwrap();
    conn.clear_statements();

    // chaining is pure: narrowing the projection issues no SQL
    let f2 = f.select(&["ID", "A"]).unwrap();
    assert_eq!(conn.statements().len(), 0);
    assert_eq!(f2.columns(), vec!["ID", "A"]);
    assert_eq!(f.columns(), vec!["ID", "A", "B"]);

    conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));

    let out_name = {
        let _ctx = AutoDeleteContext::enter(conn.clone());
        let out = KMeans::new(conn.clone(), "M")
            .fit(&f2, "ID", "A", KMeansParams::default())
            .unwrap();
        out.base_name().to_string()
    };

    let stmts = conn.statements();
    let call = stmts
        .iter()
        .find(|s| s.contains("call NZA..KMEANS("))
        .cloned()
        .unwrap();
    // the select-only input counts as bare: intable is the table itself and
    // no CREATE VIEW was emitted
    assert_eq!(
        call,
        format!(
            "call NZA..KMEANS('model=M,intable=T,id=ID,target=A,\
             distance=norm_euclidean,k=3,maxiter=5,randseed=12345,\
             idbased=false,transform=L,outtable={out_name}')"
        )
    );
    assert!(stmts.iter().all(|s| !s.starts_with("CREATE VIEW")));

    // exiting the context dropped the generated output table
    assert!(stmts.contains(&format!("DROP TABLE {out_name}")));
}

#[test]
fn transformed_input_gets_a_view_that_is_dropped_after_the_call() {
    let conn = MockConnection::new();
    conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE"), ("B", "DOUBLE")]);
    conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
    let f = RemoteFrame::from_table(conn.clone(), "T").unwrap();
    let filtered = f
        .filter(&pushframe_core::Predicate::cmp(
            "A",
            pushframe_core::CmpOp::Gt,
            1i64,
        ))
        .unwrap();
    conn.clear_statements();

    DecisionTreeClassifier::new(conn.clone(), "TREE")
        .fit(
            &filtered,
            "B",
            DecisionTreeParams::default().id_column("ID"),
        )
        .unwrap();

    let stmts = conn.statements();
    let view_name = stmts
        .iter()
        .find_map(|s| s.strip_prefix("CREATE VIEW "))
        .map(|s| s.split(' ').next().unwrap().to_string())
        .expect("the filtered input should have been materialized");
    assert!(view_name.starts_with("FRAME_VIEW_"));

    let call_pos = stmts
        .iter()
        .position(|s| s.contains("call NZA..DECTREE("))
        .unwrap();
    let drop_pos = stmts
        .iter()
        .position(|s| s == &format!("DROP VIEW {view_name}"))
        .unwrap();
    // the view outlives the call that consumes it, and not longer
    assert!(drop_pos > call_pos);
    assert!(stmts[call_pos].contains(&format!("intable={view_name}")));
}

#[test]
fn predict_then_score_cleans_up_every_temporary() {
    let conn = MockConnection::new();
    conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE"), ("LABEL", "VARCHAR")]);
    conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
    conn.script_result("CERROR", Some(TabularResult::scalar_result(0.1)));
    let f = RemoteFrame::from_table(conn.clone(), "T").unwrap();
    conn.clear_statements();

    let clf = DecisionTreeClassifier::new(conn.clone(), "TREE");
    let score = clf.score(&f, "ID", "LABEL").unwrap();
    assert!((score - 0.9).abs() < 1e-9);

    // the scratch prediction table was dropped after scoring
    let stmts = conn.statements();
    let scratch = stmts
        .iter()
        .find_map(|s| {
            s.strip_prefix("call NZA..PREDICT_DECTREE('")
                .and_then(|rest| rest.split("outtable=").nth(1))
                .map(|rest| rest.trim_end_matches("')").to_string())
        })
        .expect("predict should have run into a scratch table");
    assert!(stmts.contains(&format!("DROP TABLE {scratch}")));
}

#[test]
fn predictions_survive_until_their_context_ends() {
    let conn = MockConnection::new();
    conn.add_table("T", &[("ID", "BIGINT"), ("A", "DOUBLE")]);
    conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
    let f = RemoteFrame::from_table(conn.clone(), "T").unwrap();
    conn.clear_statements();
    let clf = DecisionTreeClassifier::new(conn.clone(), "TREE");

    let (outer_name, inner_name) = {
        let _outer = AutoDeleteContext::enter(conn.clone());
        let outer_pred = clf
            .predict(&f, DecisionTreePredictParams::default().id_column("ID"))
            .unwrap();
        let inner_name = {
            let _inner = AutoDeleteContext::enter(conn.clone());
            let inner_pred = clf
                .predict(&f, DecisionTreePredictParams::default().id_column("ID"))
                .unwrap();
            inner_pred.base_name().to_string()
        };
        // the inner context cleaned only its own output
        assert!(conn.statements().contains(&format!("DROP TABLE {inner_name}")));
        assert!(
            !conn
                .statements()
                .contains(&format!("DROP TABLE {}", outer_pred.base_name()))
        );
        (outer_pred.base_name().to_string(), inner_name)
    };
    assert_ne!(outer_name, inner_name);
    assert!(conn.statements().contains(&format!("DROP TABLE {outer_name}")));
}
