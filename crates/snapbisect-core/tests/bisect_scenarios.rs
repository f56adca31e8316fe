//! Engine scenarios driven by scripted and rule-based oracles.

use async_trait::async_trait;

use snapbisect_core::fakes::{commit_id, MemoryHistory, MemoryIndex, RecordingRunner};
use snapbisect_core::{
    ArtifactStage, BisectError, Bisector, CommitId, CommitOrder, CommitSummary, Result,
    ScriptedOracle, SearchInterval, Verdict, VerdictProvider,
};

/// Answers `bad` for every commit at or after the regression.
struct BoundaryOracle {
    order: Vec<CommitId>,
    first_bad: usize,
    asked: usize,
}

#[async_trait]
impl VerdictProvider for BoundaryOracle {
    async fn prompt_verdict(&mut self, context: &CommitSummary) -> Result<Verdict> {
        self.asked += 1;
        let index = self.order.iter().position(|c| *c == context.id).unwrap();
        Ok(if index >= self.first_bad {
            Verdict::Bad
        } else {
            Verdict::Good
        })
    }
}

fn commits(n: usize) -> Vec<CommitId> {
    (1..=n).map(commit_id).collect()
}

fn ceil_log2(width: usize) -> usize {
    let mut steps = 0;
    while (1usize << steps) < width {
        steps += 1;
    }
    steps
}

// ── Section 8 walk-through ──

#[tokio::test]
async fn eight_commit_walkthrough() {
    let c = commits(8);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let runner = RecordingRunner::new();
    let mut oracle = ScriptedOracle::new([Verdict::Bad, Verdict::Good, Verdict::Bad]);

    let bisector = Bisector::new(&order, index.catalog(), &history, &runner);
    let report = bisector
        .run(&mut oracle, SearchInterval::new(0, 7).unwrap())
        .await
        .unwrap();

    let tested: Vec<usize> = report.steps.iter().map(|s| s.index).collect();
    assert_eq!(tested, vec![3, 1, 2]);
    assert_eq!(report.last_good.id, c[1]);
    assert_eq!(report.first_bad.id, c[2]);

    let asked: Vec<&CommitId> = oracle.asked().iter().map(|s| &s.id).collect();
    assert_eq!(asked, vec![&c[3], &c[1], &c[2]]);
    assert_eq!(oracle.remaining(), 0);

    let ran: Vec<String> = runner.runs().into_iter().map(|l| l.name).collect();
    assert_eq!(
        ran,
        vec![
            format!("viewer-{}.dmg", c[3].short()),
            format!("viewer-{}.dmg", c[1].short()),
            format!("viewer-{}.dmg", c[2].short()),
        ]
    );
}

#[tokio::test]
async fn walkthrough_with_good_last_verdict() {
    let c = commits(8);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let runner = RecordingRunner::new();
    let mut oracle = ScriptedOracle::new([Verdict::Bad, Verdict::Good, Verdict::Good]);

    let report = Bisector::new(&order, index.catalog(), &history, &runner)
        .run(&mut oracle, SearchInterval::new(0, 7).unwrap())
        .await
        .unwrap();

    assert_eq!(report.last_good.id, c[2]);
    assert_eq!(report.first_bad.id, c[3]);
}

// ── Correctness for every boundary ──

#[tokio::test]
async fn finds_every_boundary_within_log_bound() {
    for n in 2..=40 {
        let c = commits(n);
        let order = CommitOrder::new(c.clone()).unwrap();
        let history = MemoryHistory::new(c.clone());
        let index = MemoryIndex::for_commits(&c);
        let runner = RecordingRunner::new();

        for first_bad in 1..n {
            let mut oracle = BoundaryOracle {
                order: c.clone(),
                first_bad,
                asked: 0,
            };
            let report = Bisector::new(&order, index.catalog(), &history, &runner)
                .run(&mut oracle, SearchInterval::new(0, n - 1).unwrap())
                .await
                .unwrap();

            assert_eq!(report.first_bad.id, c[first_bad], "n={n} boundary={first_bad}");
            assert_eq!(report.last_good.id, c[first_bad - 1], "n={n} boundary={first_bad}");
            assert!(oracle.asked <= ceil_log2(n - 1), "n={n} asked {}", oracle.asked);
        }
    }
}

// ── Arbitrary verdict sequences ──

#[tokio::test]
async fn arbitrary_verdicts_respect_bound_and_invariant() {
    for width in 1..=33usize {
        let c = commits(width + 1);
        let order = CommitOrder::new(c.clone()).unwrap();
        let history = MemoryHistory::new(c.clone());
        let index = MemoryIndex::for_commits(&c);
        let runner = RecordingRunner::new();
        let bound = ceil_log2(width);

        for mask in 0u32..(1 << bound.min(6)) {
            let script: Vec<Verdict> = (0..bound)
                .map(|bit| {
                    if mask & (1 << (bit % 6)) == 0 {
                        Verdict::Good
                    } else {
                        Verdict::Bad
                    }
                })
                .collect();
            let mut oracle = ScriptedOracle::new(script);

            let report = Bisector::new(&order, index.catalog(), &history, &runner)
                .run(&mut oracle, SearchInterval::new(0, width).unwrap())
                .await
                .unwrap();

            assert!(report.steps.len() <= bound, "width={width} mask={mask}");

            let low = order.position(&report.last_good.id).unwrap();
            let high = order.position(&report.first_bad.id).unwrap();
            assert_eq!(high, low + 1);

            // The reported bounds only ever received the matching verdict.
            for step in &report.steps {
                if step.commit == report.last_good.id {
                    assert_eq!(step.verdict, Verdict::Good);
                }
                if step.commit == report.first_bad.id {
                    assert_eq!(step.verdict, Verdict::Bad);
                }
            }
            if low != 0 {
                assert!(report.steps.iter().any(|s| s.index == low));
            }
            if high != width {
                assert!(report.steps.iter().any(|s| s.index == high));
            }
        }
    }
}

#[tokio::test]
async fn adjacent_endpoints_converge_without_testing() {
    let c = commits(5);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let runner = RecordingRunner::new();
    let mut oracle = ScriptedOracle::new([]);

    let report = Bisector::new(&order, index.catalog(), &history, &runner)
        .run(&mut oracle, SearchInterval::new(2, 3).unwrap())
        .await
        .unwrap();

    assert!(report.steps.is_empty());
    assert!(runner.runs().is_empty());
    assert_eq!(report.last_good.id, c[2]);
    assert_eq!(report.first_bad.id, c[3]);
}

// ── Failure semantics ──

#[tokio::test]
async fn artifact_failure_aborts_the_run() {
    let c = commits(8);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let failing = format!("viewer-{}.dmg", c[1].short());
    let runner = RecordingRunner::failing_on(&failing, ArtifactStage::Mount);
    let mut oracle = ScriptedOracle::new([Verdict::Bad, Verdict::Good, Verdict::Good]);

    let err = Bisector::new(&order, index.catalog(), &history, &runner)
        .run(&mut oracle, SearchInterval::new(0, 7).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BisectError::ArtifactRun { stage: ArtifactStage::Mount, .. }
    ));
    // The verdict for the failed snapshot was never requested.
    assert_eq!(oracle.asked().len(), 1);
    assert_eq!(runner.runs().len(), 2);
}

#[tokio::test]
async fn oracle_failure_aborts_the_run() {
    let c = commits(4);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let runner = RecordingRunner::new();
    let mut oracle = ScriptedOracle::new([]);

    let err = Bisector::new(&order, index.catalog(), &history, &runner)
        .run(&mut oracle, SearchInterval::new(0, 3).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, BisectError::Oracle(_)));
}

#[tokio::test]
async fn missing_descriptions_do_not_change_the_search() {
    let c = commits(8);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone())
        .without_description(c[3].clone())
        .without_description(c[2].clone());
    let index = MemoryIndex::for_commits(&c);
    let runner = RecordingRunner::new().with_exit_code(139);
    let mut oracle = ScriptedOracle::new([Verdict::Bad, Verdict::Good, Verdict::Bad]);

    let report = Bisector::new(&order, index.catalog(), &history, &runner)
        .run(&mut oracle, SearchInterval::new(0, 7).unwrap())
        .await
        .unwrap();

    assert_eq!(report.first_bad.id, c[2]);
    assert!(report.first_bad.description.is_none());
    assert_eq!(
        report.last_good.description.as_ref().unwrap().subject,
        "commit 1"
    );
}

#[tokio::test]
async fn ordered_commit_without_snapshot_is_reported() {
    let c = commits(4);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone());
    // Catalog lacks the midpoint c[1].
    let index = MemoryIndex::for_commits(&[c[0].clone(), c[2].clone(), c[3].clone()]);
    let runner = RecordingRunner::new();
    let mut oracle = ScriptedOracle::new([Verdict::Good]);

    let err = Bisector::new(&order, index.catalog(), &history, &runner)
        .run(&mut oracle, SearchInterval::new(0, 3).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, BisectError::MissingSnapshot(id) if id == c[1]));
}

#[tokio::test]
async fn interval_beyond_order_is_rejected() {
    let c = commits(3);
    let order = CommitOrder::new(c.clone()).unwrap();
    let history = MemoryHistory::new(c.clone());
    let index = MemoryIndex::for_commits(&c);
    let runner = RecordingRunner::new();
    let mut oracle = ScriptedOracle::new([]);

    let err = Bisector::new(&order, index.catalog(), &history, &runner)
        .run(&mut oracle, SearchInterval::new(0, 5).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, BisectError::InvalidRange { .. }));
}
