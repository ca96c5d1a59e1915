//! End-to-end tests for goal queries: atomic occurrences per period and
//! splittable quantities that may be cut into fragments.

use pressure_sched::scheduler::by_query;
use pressure_sched::{
    schedule, Goal, Query, QueryId, SchedulerConfig, TimeBoundary, TimeDuration,
};
use pretty_assertions::assert_eq;

const MINUTE: i64 = 60_000;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

// ============================================================================
// 1. Atomic goal: one material per occurrence
// ============================================================================

#[test]
fn test_atomic_goal_places_every_occurrence() {
    let queries = [Query::new(1)
        .with_duration(TimeDuration::exact(5 * MINUTE))
        .with_goal(Goal::atomic(2, DAY))];

    let materials = schedule(SchedulerConfig::new(0, 3 * DAY), &queries).unwrap();

    assert_eq!(materials.len(), 6);
    for (i, m) in materials.iter().enumerate() {
        assert_eq!(m.len(), 5 * MINUTE);
        assert_eq!(m.potential_id, i as u32);
        // Each occurrence stays inside its half-day window.
        let window = i as i64 * DAY / 2;
        assert!(m.start >= window && m.end <= window + DAY / 2);
    }
}

#[test]
fn test_atomic_goal_with_partial_last_period_drops_it() {
    let queries = [Query::new(1)
        .with_duration(TimeDuration::exact(HOUR))
        .with_goal(Goal::atomic(1, DAY))];

    let materials = schedule(SchedulerConfig::new(0, 2 * DAY + 6 * HOUR), &queries).unwrap();

    assert_eq!(materials.len(), 2);
}

// ============================================================================
// 2. Splittable goal wraps around a fixed query
// ============================================================================

#[test]
fn test_splittable_goal_fills_around_exact_query() {
    let queries = [
        Query::new(1)
            .with_start(TimeBoundary::exact(HOUR))
            .with_end(TimeBoundary::exact(3 * HOUR)),
        Query::new(2).with_goal(Goal::splittable(TimeDuration::exact(3 * HOUR), 5 * HOUR)),
    ];

    let materials = schedule(SchedulerConfig::new(0, 5 * HOUR), &queries).unwrap();

    let got: Vec<(u64, Option<u32>, i64, i64)> =
        materials.iter().map(|m| (m.query_id.0, m.split_id, m.start, m.end)).collect();
    assert_eq!(
        got,
        vec![
            (2, Some(0), 0, HOUR),
            (1, None, HOUR, 3 * HOUR),
            (2, Some(1), 3 * HOUR, 5 * HOUR),
        ]
    );
}

#[test]
fn test_splittable_goal_one_block_per_period_when_free() {
    let queries = [Query::new(4).with_goal(Goal::splittable(TimeDuration::exact(2), 10))];

    let materials = schedule(SchedulerConfig::new(0, 20), &queries).unwrap();

    let grouped = by_query(&materials);
    let mine = &grouped[&QueryId(4)];
    assert_eq!(mine.len(), 2);
    assert_eq!((mine[0].start, mine[0].end, mine[0].split_id), (0, 2, Some(0)));
    assert_eq!((mine[1].start, mine[1].end, mine[1].split_id), (10, 12, Some(0)));
}
