//! End-to-end tests for refinement: caller feedback between schedules.

use pressure_sched::refine::{NoDetails, Propagate};
use pressure_sched::{
    refine, ConflictError, Error, Material, Query, QueryDetails, QueryId, Scheduler,
    SchedulerConfig, TimeBoundary, TimeDuration,
};
use pretty_assertions::assert_eq;

fn scheduler() -> Scheduler {
    Scheduler::new(SchedulerConfig::new(0, 100))
}

fn conflicting() -> Vec<Query> {
    vec![
        Query::new(1).with_start(TimeBoundary::exact(1)).with_end(TimeBoundary::exact(3)),
        Query::new(2).with_start(TimeBoundary::exact(1)).with_end(TimeBoundary::exact(4)),
    ]
}

// ============================================================================
// 1. No feedback: the first schedule is the answer
// ============================================================================

#[test]
fn test_refine_without_details() {
    let queries = vec![Query::new(1).with_duration(TimeDuration::exact(10))];

    let materials = refine(&scheduler(), queries, NoDetails, Propagate, 5).unwrap();

    assert_eq!(materials.len(), 1);
    assert_eq!((materials[0].start, materials[0].end), (0, 10));
}

// ============================================================================
// 2. Details swap queries between passes
// ============================================================================

#[test]
fn test_details_for_unknown_query_are_ignored() {
    let queries = vec![Query::new(1).with_duration(TimeDuration::exact(10))];
    let mut calls = 0;
    let details = |_: &[Material]| {
        calls += 1;
        if calls == 1 {
            vec![QueryDetails { id: QueryId(72), queries: vec![Query::new(73)] }]
        } else {
            Vec::new()
        }
    };

    let materials = refine(&scheduler(), queries, details, Propagate, 5).unwrap();

    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].query_id, QueryId(1));
}

#[test]
fn test_details_replace_query() {
    let queries = vec![Query::new(1).with_duration(TimeDuration::exact(10))];
    let mut replaced = false;
    let details = |materials: &[Material]| {
        if replaced {
            return Vec::new();
        }
        replaced = true;
        assert_eq!(materials[0].query_id, QueryId(1));
        vec![QueryDetails {
            id: QueryId(1),
            queries: vec![Query::new(2).with_duration(TimeDuration::exact(20))],
        }]
    };

    let materials = refine(&scheduler(), queries, details, Propagate, 5).unwrap();

    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].query_id, QueryId(2));
    assert_eq!(materials[0].len(), 20);
}

// ============================================================================
// 3. Conflicts go to the resolver
// ============================================================================

#[test]
fn test_resolver_recovers_from_conflict() {
    let resolver = |conflict: &ConflictError, queries: &[Query]| {
        let kept: Vec<Query> = queries.iter().filter(|q| q.id != conflict.victim).cloned().collect();
        Some(kept)
    };

    let materials = refine(&scheduler(), conflicting(), NoDetails, resolver, 5).unwrap();

    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].query_id, QueryId(1));
}

#[test]
fn test_unresolved_conflict_propagates() {
    let err = refine(&scheduler(), conflicting(), NoDetails, Propagate, 5).unwrap_err();
    assert!(matches!(err, Error::Conflict(e) if e.victim == QueryId(2)));
}
