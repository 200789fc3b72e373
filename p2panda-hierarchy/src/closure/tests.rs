// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::config::Limits;
use crate::error::{GraphLimit, ResolverError};
use crate::test_utils::{FailingEdgeSource, TestSource, chain, setup_logging};

use super::{ClosureEngine, ClosureQuery, CycleEvent, Direction};

/// ```text
///        1
///      /   \
///     2     3
///    / \     \
///   4   5     6
///             |
///             7
/// ```
async fn tree() -> TestSource {
    let source = TestSource::new();
    source.add_container(1, None).await.unwrap();
    for (id, parent) in [(2, 1), (3, 1), (4, 2), (5, 2), (6, 3), (7, 6)] {
        source.add_container(id, Some(parent)).await.unwrap();
    }
    source
}

#[tokio::test]
async fn descendants_with_depth() {
    setup_logging();
    let source = tree().await;
    let mut engine = ClosureEngine::new(&source, Limits::default());

    let closure = engine.descendants(ClosureQuery::new([3])).await.unwrap();
    assert_eq!(closure.direction(), Direction::Descendants);
    assert_eq!(closure.containers().collect::<Vec<_>>(), vec![3, 6, 7]);
    assert_eq!(closure.depth(&3), Some(1));
    assert_eq!(closure.depth(&6), Some(2));
    assert_eq!(closure.depth(&7), Some(3));
    assert_eq!(closure.max_depth(), 3);
    assert!(!closure.has_cycles());

    // A leaf container has descendant depth 1.
    let leaf = engine.descendants(ClosureQuery::new([7])).await.unwrap();
    assert_eq!(leaf.max_depth(), 1);
    assert_eq!(leaf.len(), 1);
}

#[tokio::test]
async fn ancestors_with_depth() {
    let source = tree().await;
    let mut engine = ClosureEngine::new(&source, Limits::default());

    let closure = engine.ancestors(ClosureQuery::new([7, 5])).await.unwrap();
    assert_eq!(
        closure.containers().collect::<Vec<_>>(),
        vec![1, 2, 3, 5, 6, 7]
    );
    assert_eq!(closure.depth(&7), Some(1));
    assert_eq!(closure.depth(&5), Some(1));
    assert_eq!(closure.depth(&2), Some(2));
    assert_eq!(closure.depth(&6), Some(2));
    // Reached from 5 at depth 3 and from 7 at depth 4.
    assert_eq!(closure.depth(&1), Some(3));
    assert_eq!(closure.get(&1).unwrap().origin, 5);
}

#[tokio::test]
async fn empty_base_set() {
    let source = tree().await;
    let mut engine = ClosureEngine::new(&source, Limits::default());

    let closure = engine
        .descendants(ClosureQuery::new(Vec::new()))
        .await
        .unwrap();
    assert!(closure.is_empty());
    assert_eq!(closure.max_depth(), 0);
    assert_eq!(engine.budget().edge_source_calls(), 0);
}

#[tokio::test]
async fn unknown_containers_stay_in_closure() {
    let source = tree().await;
    let mut engine = ClosureEngine::new(&source, Limits::default());

    let closure = engine.descendants(ClosureQuery::new([42])).await.unwrap();
    assert_eq!(closure.containers().collect::<Vec<_>>(), vec![42]);
}

#[tokio::test]
async fn shortest_depth_wins() {
    // 1 -> 2 -> 3 -> 4 and an additional raw edge 1 -> 4.
    let source = TestSource::new();
    chain(&source, &[1, 2, 3, 4]).await;
    source.insert_parent_edge(4, 1).await;

    let mut engine = ClosureEngine::new(&source, Limits::default());
    let closure = engine.descendants(ClosureQuery::new([1])).await.unwrap();
    assert_eq!(closure.depth(&4), Some(2));
    assert_eq!(closure.len(), 4);
    assert!(!closure.has_cycles());
}

#[tokio::test]
async fn lowest_origin_wins_on_equal_depth() {
    // Container 5 has two parents, 2 and 1, both at the same distance.
    let source = TestSource::new();
    source.add_container(1, None).await.unwrap();
    source.add_container(2, None).await.unwrap();
    source.add_container(5, Some(2)).await.unwrap();
    source.insert_parent_edge(5, 1).await;

    let mut engine = ClosureEngine::new(&source, Limits::default());
    let closure = engine.descendants(ClosureQuery::new([2, 1])).await.unwrap();
    let node = closure.get(&5).unwrap();
    assert_eq!(node.depth, 2);
    assert_eq!(node.origin, 1);
}

#[tokio::test]
async fn stop_at_excludes_container_and_everything_behind_it() {
    let source = tree().await;
    let mut engine = ClosureEngine::new(&source, Limits::default());

    let closure = engine
        .descendants(ClosureQuery::new([1]).stop_at(3))
        .await
        .unwrap();
    assert_eq!(closure.containers().collect::<Vec<_>>(), vec![1, 2, 4, 5]);

    let closure = engine
        .ancestors(ClosureQuery::new([7]).stop_at(3))
        .await
        .unwrap();
    assert_eq!(closure.containers().collect::<Vec<_>>(), vec![6, 7]);

    // A base container is excluded as well.
    let closure = engine
        .descendants(ClosureQuery::new([3]).stop_at(3))
        .await
        .unwrap();
    assert!(closure.is_empty());
}

#[tokio::test]
async fn cycles_terminate_and_are_reported() {
    setup_logging();

    // 1 -> 2 -> 3 -> 1 with 4 below 2.
    let source = TestSource::new();
    chain(&source, &[1, 2, 3]).await;
    source.add_container(4, Some(2)).await.unwrap();
    source.insert_parent_edge(1, 3).await;

    let mut engine = ClosureEngine::new(&source, Limits::default());
    let closure = engine.descendants(ClosureQuery::new([1])).await.unwrap();

    assert_eq!(closure.containers().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(closure.cycles(), &[CycleEvent { from: 3, to: 1 }]);
    assert!(closure.get(&1).unwrap().tree_cycle);
    assert!(!closure.get(&3).unwrap().tree_cycle);
    // The re-entered container keeps the depth it was first reached at.
    assert_eq!(closure.depth(&1), Some(1));

    let closure = engine.ancestors(ClosureQuery::new([4])).await.unwrap();
    assert_eq!(closure.containers().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(closure.cycles(), &[CycleEvent { from: 3, to: 2 }]);
}

#[tokio::test]
async fn self_loop() {
    let source = TestSource::new();
    source.add_container(1, None).await.unwrap();
    source.insert_parent_edge(1, 1).await;

    let mut engine = ClosureEngine::new(&source, Limits::default());
    let closure = engine.ancestors(ClosureQuery::new([1])).await.unwrap();
    assert_eq!(closure.len(), 1);
    assert_eq!(closure.cycles(), &[CycleEvent { from: 1, to: 1 }]);
}

#[tokio::test]
async fn one_read_per_round() {
    let source = TestSource::new();
    chain(&source, &[1, 2, 3, 4, 5, 6]).await;
    chain(&source, &[10, 11, 12]).await;

    let mut engine = ClosureEngine::new(&source, Limits::default());
    let closures = engine
        .walk(
            Direction::Descendants,
            &[ClosureQuery::new([1]), ClosureQuery::new([10])],
        )
        .await
        .unwrap();

    assert_eq!(closures[0].max_depth(), 6);
    assert_eq!(closures[1].max_depth(), 3);
    // One read per depth level, the last one returns no further edges.
    assert_eq!(engine.budget().edge_source_calls(), 6);
}

#[tokio::test]
async fn per_base_closures_are_independent() {
    let source = tree().await;
    let mut engine = ClosureEngine::new(&source, Limits::default());

    let closures = engine.descendants_per_base([2, 1]).await.unwrap();
    assert_eq!(closures.len(), 2);

    // Container 4 is part of both closures with its own depth and origin in each.
    let from_root = &closures[&1];
    let from_two = &closures[&2];
    assert_eq!(from_root.depth(&4), Some(3));
    assert_eq!(from_root.get(&4).unwrap().origin, 1);
    assert_eq!(from_two.depth(&4), Some(2));
    assert_eq!(from_two.get(&4).unwrap().origin, 2);
    assert_eq!(from_two.len(), 3);

    // Visited containers are counted once per closure.
    assert_eq!(engine.budget().visited(), 7 + 3);

    let ancestors = engine.ancestors_per_base([4, 7]).await.unwrap();
    assert_eq!(ancestors[&4].containers().collect::<Vec<_>>(), vec![1, 2, 4]);
    assert_eq!(
        ancestors[&7].containers().collect::<Vec<_>>(),
        vec![1, 3, 6, 7]
    );
}

#[tokio::test]
async fn depth_limit() {
    let source = TestSource::new();
    chain(&source, &[1, 2, 3, 4, 5]).await;

    let limits = Limits {
        max_depth: 4,
        ..Limits::default()
    };

    let mut engine = ClosureEngine::new(&source, limits);
    let result = engine.descendants(ClosureQuery::new([1])).await;
    assert!(matches!(
        result,
        Err(ResolverError::GraphTooLarge(GraphLimit::Depth { limit: 4 }))
    ));

    // Exactly at the limit is fine.
    let mut engine = ClosureEngine::new(&source, limits);
    let closure = engine.descendants(ClosureQuery::new([2])).await.unwrap();
    assert_eq!(closure.max_depth(), 4);
}

#[tokio::test]
async fn visited_limit() {
    let source = tree().await;
    let limits = Limits {
        max_visited: 5,
        ..Limits::default()
    };

    let mut engine = ClosureEngine::new(&source, limits);
    let result = engine.descendants(ClosureQuery::new([1])).await;
    assert!(matches!(
        result,
        Err(ResolverError::GraphTooLarge(GraphLimit::Visited { limit: 5 }))
    ));
}

#[tokio::test]
async fn edge_source_failure_is_fatal() {
    let source = FailingEdgeSource::new(tree().await, 2);
    let mut engine = ClosureEngine::new(&source, Limits::default());

    let result = engine.descendants(ClosureQuery::new([1u32])).await;
    assert!(matches!(
        result,
        Err(ResolverError::EdgeSourceUnavailable(err)) if err.call == 2
    ));
}
