//! End-to-end scenarios: known networks and their expected trees

mod common;

use std::convert::Infallible;
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use confluence::*;
use test_case::test_case;

fn build(segments: Vec<Segment>, workers: usize) -> BuildReport {
    let pool = SegmentPool::from_segments(segments).expect("valid pool");
    TreeBuilder::new(config(workers))
        .build(pool)
        .expect("build succeeds")
}

#[test_case(1 ; "single worker")]
#[test_case(2 ; "two workers")]
#[test_case(8 ; "more workers than nodes")]
fn scenario_a_two_tributaries(workers: usize) {
    let tree = build(scenario_a(), workers).tree;

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.root().map(TreeNode::kind), Some(NodeKind::Branch));
    assert_eq!(tree.get(&addr(2)).map(TreeNode::kind), Some(NodeKind::Leaf));
    assert_eq!(tree.get(&addr(3)).map(TreeNode::kind), Some(NodeKind::Leaf));
    assert_eq!(tree.get(&addr(2)).map(TreeNode::start), Some(Point::new(1.0, 1.0)));
    assert_eq!(tree.get(&addr(3)).map(TreeNode::start), Some(Point::new(-1.0, 1.0)));
    assert!(tree.validate().is_ok());
}

#[test_case(1 ; "single worker")]
#[test_case(3 ; "three workers")]
fn scenario_b_three_tributaries(workers: usize) {
    let report = build(scenario_b(), workers);
    let tree = &report.tree;

    assert_eq!(report.ghosts_inserted, 1);
    assert_eq!(tree.len(), 5);
    assert_eq!(tree.root().map(TreeNode::kind), Some(NodeKind::Branch));
    assert_eq!(tree.get(&addr(2)).map(TreeNode::kind), Some(NodeKind::Leaf));

    let ghost = tree.get(&addr(3)).expect("ghost at 3");
    assert_eq!(ghost.kind(), NodeKind::GhostBranch);
    assert_eq!(ghost.start(), ghost.end());
    assert_eq!(ghost.left_child(), Some(&addr(6)));
    assert_eq!(ghost.right_child(), Some(&addr(7)));

    // second and third tributaries end up below the ghost
    let six = tree.get(&addr(6)).expect("leaf at 6");
    let seven = tree.get(&addr(7)).expect("leaf at 7");
    assert_eq!((six.kind(), six.start()), (NodeKind::Leaf, Point::new(0.0, 1.0)));
    assert_eq!((seven.kind(), seven.start()), (NodeKind::Leaf, Point::new(-1.0, 1.0)));
    assert_eq!(six.depth(), 3);
    assert!(tree.validate().is_ok());
}

#[test_case(1 ; "single worker")]
#[test_case(4 ; "four workers")]
fn scenario_c_lone_origin(workers: usize) {
    let tree = build(scenario_c(), workers).tree;
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root().map(TreeNode::kind), Some(NodeKind::Leaf));

    let calls = AtomicUsize::new(0);
    let report = SimulationScheduler::new(config(workers))
        .run_fn(tree, |_node, _upstream: Upstream<()>| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        })
        .expect("simulation succeeds");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(report.remaining.is_empty());
}

#[test]
fn ghost_receives_children_results() {
    let tree = build(scenario_b(), 2).tree;
    let report = SimulationScheduler::new(config(2))
        .run_fn(tree, |node, upstream: Upstream<Vec<u64>>| {
            let mut seen: Vec<u64> = upstream.results().flatten().copied().collect();
            seen.extend(node.address().to_index());
            Ok::<_, Infallible>(seen)
        })
        .expect("simulation succeeds");

    let mut at_ghost = report.results[&addr(3)].clone();
    at_ghost.sort_unstable();
    assert_eq!(at_ghost, vec![3, 6, 7]);

    let mut at_outlet = report.outlet().cloned().unwrap_or_default();
    at_outlet.sort_unstable();
    assert_eq!(at_outlet, vec![1, 2, 3, 6, 7]);
}

#[test]
fn reader_feeds_builder() {
    let file = File::open(data_path("scenario_b.txt")).expect("fixture exists");
    let pool = read_segments(BufReader::new(file)).expect("fixture parses");
    let report = TreeBuilder::new(config(2)).build(pool).expect("build succeeds");
    assert_eq!(report.tree.count(NodeKind::GhostBranch), 1);
    assert_eq!(report.tree.count(NodeKind::Leaf), 3);
}

#[test]
fn disconnected_segment_fails_build() {
    let file = File::open(data_path("disconnected.txt")).expect("fixture exists");
    let pool = read_segments(BufReader::new(file)).expect("fixture parses");
    let err = TreeBuilder::new(config(3)).build(pool).unwrap_err();
    assert!(
        matches!(err, NetworkError::IncompleteComputation { remaining: 1, .. }),
        "got {err:?}"
    );
}

#[test]
fn gauge_waits_for_its_subtree() {
    let tree = build(scenario_b(), 2).tree;
    let gauge = InsertionPoint::new(addr(3), Point::new(0.0, 0.0), "confluence gauge");
    let decorated = insert_local_points(tree, &[gauge]).expect("gauge inserted");

    let report = SimulationScheduler::new(config(3))
        .run_fn(decorated, |_node, upstream: Upstream<usize>| {
            Ok::<_, Infallible>(1 + upstream.results().sum::<usize>())
        })
        .expect("simulation succeeds");

    // gauge at 3 sees the moved ghost (6) and its leaves (12, 13)
    assert_eq!(report.results[&addr(3)], 4);
    assert_eq!(report.outlet(), Some(&6));
}

#[test]
fn pipeline_runs_both_phases() {
    let pool = SegmentPool::from_segments(scenario_b()).expect("valid pool");
    let outcome = Pipeline::new(config(4))
        .with_local_points(vec![InsertionPoint::new(
            Address::root(),
            Point::new(0.0, -1.0),
            "outlet",
        )])
        .run_fn(pool, |node, upstream: Upstream<f64>| {
            Ok::<_, Infallible>(node.length() + upstream.results().sum::<f64>())
        })
        .expect("pipeline succeeds");

    assert_eq!(outcome.build.tree.len(), 6);
    let total = outcome.simulation.outlet().copied().unwrap_or_default();
    let expected = 1.0 + 2f64.sqrt() * 2.0 + 1.0;
    assert!((total - expected).abs() < 1e-9, "total {total}");
}
