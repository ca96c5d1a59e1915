//! End-to-end tests for queries linked to another query's material.

use pressure_sched::{
    schedule, LinkOrigin, Material, Query, QueryId, QueryLink, SchedulerConfig, TimeBoundary,
    TimeDuration,
};

fn of(materials: &[Material], id: u64) -> Material {
    *materials.iter().find(|m| m.query_id == QueryId(id)).unwrap()
}

fn link_to(query_id: u64, min: i64, max: i64, origin: LinkOrigin) -> QueryLink {
    QueryLink {
        query_id: QueryId(query_id),
        potential_id: 0,
        distance: TimeBoundary::between(min, max),
        origin,
    }
}

// ============================================================================
// 1. After the end of the linked material
// ============================================================================

#[test]
fn test_linked_query_follows_target_end() {
    let queries = [
        Query::new(1).with_duration(TimeDuration::exact(10)).with_start(TimeBoundary::target(20)),
        Query::new(2)
            .with_duration(TimeDuration::exact(5))
            .with_link(link_to(1, 5, 10, LinkOrigin::End)),
    ];

    let materials = schedule(SchedulerConfig::new(0, 100), &queries).unwrap();

    assert_eq!(materials.len(), 2);
    let first = of(&materials, 1);
    let linked = of(&materials, 2);
    assert_eq!(linked.start, first.end + 5);
    assert_eq!(linked.len(), 5);
}

// ============================================================================
// 2. Before the start of the linked material
// ============================================================================

#[test]
fn test_linked_query_precedes_target_start() {
    let queries = [
        Query::new(1)
            .with_duration(TimeDuration::exact(10))
            .with_start(TimeBoundary::target(50)),
        Query::new(2)
            .with_duration(TimeDuration::exact(5))
            .with_link(link_to(1, -10, -5, LinkOrigin::Start)),
    ];

    let materials = schedule(SchedulerConfig::new(0, 100), &queries).unwrap();

    let first = of(&materials, 1);
    let linked = of(&materials, 2);
    assert!(linked.start >= first.start - 10);
    assert!(linked.end <= first.start);
}

// ============================================================================
// 3. A link to a query that never materializes leaves nothing to place
// ============================================================================

#[test]
fn test_link_to_missing_query_places_nothing_for_it() {
    let queries = [
        Query::new(1).with_duration(TimeDuration::exact(10)),
        Query::new(2)
            .with_duration(TimeDuration::exact(5))
            .with_link(link_to(99, 0, 10, LinkOrigin::End)),
    ];

    let materials = schedule(SchedulerConfig::new(0, 100), &queries).unwrap();

    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].query_id, QueryId(1));
}
