//! Discovery, endpoint resolution and bisection wired through `Session`.

use snapbisect_core::fakes::{commit_id, MemoryHistory, MemoryIndex, RecordingRunner};
use snapbisect_core::{
    build_order, render_report, BisectError, CommitId, Endpoint, ScriptedOracle, Session,
    SnapshotCatalog, Verdict,
};

fn commits(n: usize) -> Vec<CommitId> {
    (1..=n).map(commit_id).collect()
}

// ── Discovery ──

#[tokio::test]
async fn empty_catalog_fails_before_any_test() {
    let history = MemoryHistory::new(commits(4));
    let index = MemoryIndex::new(SnapshotCatalog::new());

    let err = Session::discover(&history, &index).await.unwrap_err();
    assert!(matches!(err, BisectError::NoSnapshots));
}

#[tokio::test]
async fn order_follows_history_not_catalog() {
    let c = commits(6);
    let history = MemoryHistory::new(c.clone());
    // Snapshots for a subset, listed out of order.
    let index = MemoryIndex::for_commits(&[c[4].clone(), c[0].clone(), c[2].clone()]);

    let session = Session::discover(&history, &index).await.unwrap();
    assert_eq!(session.order.as_slice(), &[c[0].clone(), c[2].clone(), c[4].clone()]);
    assert_eq!(session.catalog.len(), 3);
}

#[tokio::test]
async fn unstable_history_is_an_ordering_error() {
    let c = commits(5);
    let history = MemoryHistory::new(c.clone()).unstable();

    let err = build_order(&history, &c).await.unwrap_err();
    assert!(matches!(err, BisectError::Ordering(_)));
}

#[tokio::test]
async fn duplicate_refs_are_collapsed() {
    let c = commits(3);
    let history = MemoryHistory::new(c.clone());
    let refs = vec![c[2].clone(), c[0].clone(), c[2].clone(), c[1].clone()];

    let order = build_order(&history, &refs).await.unwrap();
    assert_eq!(order.as_slice(), c.as_slice());

    // Ordering an ordered list again reproduces it.
    let again = build_order(&history, order.as_slice()).await.unwrap();
    assert_eq!(again, order);
}

#[tokio::test]
async fn commit_unknown_to_history_is_an_ordering_error() {
    let c = commits(3);
    let history = MemoryHistory::new(c[..2].to_vec());

    let err = build_order(&history, &c).await.unwrap_err();
    assert!(matches!(err, BisectError::Ordering(_)));
}

// ── Endpoints ──

#[tokio::test]
async fn endpoints_default_to_first_and_last_snapshot() {
    let c = commits(6);
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c[1..5]);
    let session = Session::discover(&history, &index).await.unwrap();

    let interval = session.endpoints(&history, None, None).await.unwrap();
    assert_eq!((interval.low(), interval.high()), (0, 3));
}

#[tokio::test]
async fn endpoints_resolve_named_refs_and_ids() {
    let c = commits(6);
    let history = MemoryHistory::new(c.clone()).with_ref("v1.0", c[1].clone());
    let index = MemoryIndex::for_commits(&c);
    let session = Session::discover(&history, &index).await.unwrap();

    let upper = c[4].as_str().to_uppercase();
    let interval = session
        .endpoints(&history, Some("v1.0"), Some(upper.as_str()))
        .await
        .unwrap();
    assert_eq!((interval.low(), interval.high()), (1, 4));
}

#[tokio::test]
async fn bad_endpoint_without_snapshot_is_unknown() {
    let c = commits(6);
    let history = MemoryHistory::new(c.clone()).with_ref("HEAD", c[5].clone());
    let index = MemoryIndex::for_commits(&c[..4]);
    let session = Session::discover(&history, &index).await.unwrap();

    let err = session
        .endpoints(&history, None, Some("HEAD"))
        .await
        .unwrap_err();
    match err {
        BisectError::UnknownCommit { which, commit } => {
            assert_eq!(which, Endpoint::Bad);
            assert_eq!(commit, c[5].to_string());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn same_commit_endpoints_are_invalid() {
    let c = commits(4);
    let history = MemoryHistory::new(c.clone()).with_ref("tip", c[2].clone());
    let index = MemoryIndex::for_commits(&c);
    let session = Session::discover(&history, &index).await.unwrap();

    let err = session
        .endpoints(&history, Some("tip"), Some(c[2].as_str()))
        .await
        .unwrap_err();
    assert!(matches!(err, BisectError::InvalidRange { .. }));
    assert!(err.is_range_error());
}

#[tokio::test]
async fn reversed_endpoints_are_invalid() {
    let c = commits(4);
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let session = Session::discover(&history, &index).await.unwrap();

    let err = session
        .endpoints(&history, Some(c[3].as_str()), Some(c[0].as_str()))
        .await
        .unwrap_err();
    assert!(matches!(err, BisectError::InvalidRange { .. }));
}

#[tokio::test]
async fn single_snapshot_has_no_range() {
    let c = commits(3);
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c[1..2]);
    let session = Session::discover(&history, &index).await.unwrap();

    let err = session.endpoints(&history, None, None).await.unwrap_err();
    assert!(matches!(err, BisectError::InvalidRange { .. }));
}

#[tokio::test]
async fn unresolvable_ref_is_reported() {
    let c = commits(4);
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let session = Session::discover(&history, &index).await.unwrap();

    let err = session
        .endpoints(&history, Some("no-such-branch"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BisectError::UnresolvableRef(r) if r == "no-such-branch"));
}

// ── End to end ──

#[tokio::test]
async fn full_run_produces_report() {
    let c = commits(8);
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let runner = RecordingRunner::new();
    let mut oracle = ScriptedOracle::new([Verdict::Bad, Verdict::Good, Verdict::Bad]);

    let session = Session::discover(&history, &index).await.unwrap();
    let interval = session.endpoints(&history, None, None).await.unwrap();
    let report = session
        .bisect(&history, &runner, &mut oracle, interval)
        .await
        .unwrap();

    assert_eq!(report.first_bad.id, c[2]);
    let text = render_report(&report);
    assert!(text.contains("3 step"));
    assert!(text.contains(c[2].short()));
}
