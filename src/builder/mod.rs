//! # Potentiality Builder
//!
//! Turns one query into the potentialities that compete for time this
//! round: one for an atomic query, one per subpipe for a goal.
//!
//! Every place is a disjoint window of the envelope
//! `[start-dimension low, end-dimension high]`, narrowed by the horizon,
//! the subpipe and the external masks, with existing materials cut out.
//! The start/end preference ranges are clamped into each window.
//!
//! The builder is total: a query with no room left simply yields void
//! potentialities.

use smallvec::SmallVec;
use tracing::trace;

use crate::model::range::{intersect_all, subtract};
use crate::model::{
    Material, Place, PotRange, PotRangeKind, Potentiality, Query, Range, TimeBoundary,
    TimeDuration,
};

pub use crate::model::potentiality::compute_pressure;

/// Build every potentiality of `query`.
///
/// `masks` are lists of allowed ranges (time restrictions, links, user
/// state); they are intersected together with the horizon.
pub fn build(query: &Query, horizon: Range, masks: &[Vec<Range>], materials: &[Material]) -> Vec<Potentiality> {
    let duration = query_duration(query, horizon);
    let start_ranges = dimension_ranges(query.position.start, horizon, true);
    let end_ranges = dimension_ranges(query.position.end, horizon, false);
    let envelope = Range::new(
        start_ranges.iter().map(|r| r.start).min().unwrap_or(horizon.start),
        end_ranges.iter().map(|r| r.end).max().unwrap_or(horizon.end),
    );
    let occupied: Vec<Range> = materials.iter().map(Material::range).collect();

    let pots: Vec<Potentiality> = subpipes(query, horizon)
        .into_iter()
        .enumerate()
        .map(|(i, subpipe)| {
            let fixed = [vec![envelope], vec![subpipe]];
            let allowed = intersect_all(
                horizon,
                fixed.iter().chain(masks.iter()).map(Vec::as_slice),
            );
            let places = subtract(&allowed, &occupied)
                .into_iter()
                .map(|window| clip_place(&start_ranges, &end_ranges, window))
                .collect();
            Potentiality::new(query.id, i as u32, query.is_splittable(), duration, places)
        })
        .collect();

    trace!(query = %query.id, count = pots.len(), "built potentialities");
    pots
}

/// Duration envelope of one occurrence.
///
/// Splittable goals use the goal quantity. Otherwise an explicit duration
/// wins; without one the duration is read off the boundaries, shortest
/// end minus latest start for `min`, target to target for `target`.
pub fn query_duration(query: &Query, horizon: Range) -> TimeDuration {
    if let Some(goal) = query.goal.filter(|_| query.is_splittable()) {
        return goal.quantity;
    }
    if let Some(duration) = query.position.duration {
        return duration;
    }

    let start = query.position.start.unwrap_or_default();
    let end = query.position.end.unwrap_or_default();
    let min = end.lowest().unwrap_or(horizon.end) - start.highest().unwrap_or(horizon.start);
    let target = end.target_or_lowest().unwrap_or(horizon.end)
        - start.target_or_highest().unwrap_or(horizon.start);
    let min = min.max(0);
    TimeDuration::new(min, target.max(min))
}

/// Subpipe windows: the whole horizon for an atomic query, `count` periods
/// for a goal.
pub fn subpipes(query: &Query, horizon: Range) -> Vec<Range> {
    let Some(goal) = query.goal else {
        return vec![horizon];
    };
    let period = goal.period();
    if period <= 0.0 {
        return Vec::new();
    }
    let count = (horizon.len() as f64 / period).floor() as i64;
    (0..count)
        .map(|i| {
            let at = |k: i64| horizon.start + (period * k as f64).round() as i64;
            Range::new(at(i), at(i + 1))
        })
        .collect()
}

/// Preference ranges of one dimension before any window is applied.
pub fn dimension_ranges(boundary: Option<TimeBoundary>, horizon: Range, start: bool) -> SmallVec<[PotRange; 2]> {
    let (flat, before, after) = if start {
        (PotRangeKind::Start, PotRangeKind::StartBefore, PotRangeKind::StartAfter)
    } else {
        (PotRangeKind::End, PotRangeKind::EndBefore, PotRangeKind::EndAfter)
    };
    let mut out = SmallVec::new();

    let Some(tb) = boundary else {
        out.push(PotRange::new(horizon.start, horizon.end, flat));
        return out;
    };
    let lo = tb.min.unwrap_or(horizon.start);
    let hi = tb.max.unwrap_or(horizon.end);
    match tb.target {
        Some(target) if tb.is_exact() => out.push(PotRange::new(target, target, flat)),
        Some(target) => {
            out.push(PotRange::new(lo, target, before));
            out.push(PotRange::new(target, hi, after));
        }
        None => out.push(PotRange::new(lo, hi, flat)),
    }
    out
}

fn clip_place(start_ranges: &[PotRange], end_ranges: &[PotRange], window: Range) -> Place {
    start_ranges
        .iter()
        .chain(end_ranges)
        .map(|r| r.clamp(window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Goal, QueryId};
    use pretty_assertions::assert_eq;

    fn shape(place: &[PotRange]) -> Vec<(i64, i64, PotRangeKind)> {
        place.iter().map(|r| (r.start, r.end, r.kind)).collect()
    }

    const H: Range = Range::new(0, 10);

    #[test]
    fn test_start_target_with_duration() {
        let q = Query::new(1).with_start(TimeBoundary::target(5)).with_duration(TimeDuration::exact(1));
        let pots = build(&q, H, &[], &[]);
        assert_eq!(pots.len(), 1);
        assert!(!pots[0].is_splittable);
        assert_eq!(
            shape(&pots[0].places()[0]),
            vec![
                (0, 5, PotRangeKind::StartBefore),
                (5, 10, PotRangeKind::StartAfter),
                (0, 10, PotRangeKind::End),
            ]
        );
        assert_eq!(pots[0].duration().target, 1);
    }

    #[test]
    fn test_end_target_with_bounds() {
        let q = Query::new(1)
            .with_end(TimeBoundary::new(Some(2), Some(6), Some(8)))
            .with_duration(TimeDuration::exact(1));
        let pots = build(&q, H, &[], &[]);
        assert_eq!(
            shape(&pots[0].places()[0]),
            vec![
                (0, 8, PotRangeKind::Start),
                (2, 6, PotRangeKind::EndBefore),
                (6, 8, PotRangeKind::EndAfter),
            ]
        );
    }

    #[test]
    fn test_duration_from_targets() {
        let q = Query::new(1).with_start(TimeBoundary::target(5)).with_end(TimeBoundary::target(6));
        let pots = build(&q, H, &[], &[]);
        assert_eq!(
            shape(&pots[0].places()[0]),
            vec![
                (0, 5, PotRangeKind::StartBefore),
                (5, 10, PotRangeKind::StartAfter),
                (0, 6, PotRangeKind::EndBefore),
                (6, 10, PotRangeKind::EndAfter),
            ]
        );
        assert_eq!(pots[0].duration(), TimeDuration::new(1, 1));
    }

    #[test]
    fn test_window_smaller_than_envelope() {
        let q = Query::new(1).with_start(TimeBoundary::target(3)).with_end(TimeBoundary::exact(6));
        let pots = build(&q, H, &[vec![Range::new(4, 7)]], &[]);
        let place = &pots[0].places()[0];
        assert_eq!(
            shape(place),
            vec![
                (4, 4, PotRangeKind::StartBefore),
                (4, 6, PotRangeKind::StartAfter),
                (6, 6, PotRangeKind::End),
            ]
        );
        assert_eq!(place[0].pressure_start, 1.0);
        assert_eq!(pots[0].duration(), TimeDuration::new(3, 3));
    }

    #[test]
    fn test_min_max_without_target() {
        let q = Query::new(1)
            .with_start(TimeBoundary::between(2, 6))
            .with_end(TimeBoundary::between(4, 9))
            .with_duration(TimeDuration::new(1, 2));
        let pots = build(&q, H, &[], &[]);
        assert_eq!(
            shape(&pots[0].places()[0]),
            vec![(2, 6, PotRangeKind::Start), (4, 9, PotRangeKind::End)]
        );
        assert_eq!(pots[0].duration(), TimeDuration::new(1, 2));
    }

    #[test]
    fn test_minimal_start_end() {
        let q = Query::new(1)
            .with_start(TimeBoundary::default().with_max(4))
            .with_end(TimeBoundary::default().with_min(6));
        let pots = build(&q, H, &[], &[]);
        assert_eq!(
            shape(&pots[0].places()[0]),
            vec![(0, 4, PotRangeKind::Start), (6, 10, PotRangeKind::End)]
        );
        assert_eq!(pots[0].duration(), TimeDuration::new(2, 2));
    }

    #[test]
    fn test_materials_split_windows() {
        let q = Query::new(1).with_duration(TimeDuration::exact(2));
        let taken = [Material::new(QueryId(9), 0, 3, 5)];
        let pots = build(&q, H, &[], &taken);
        assert_eq!(pots[0].windows(), vec![Range::new(0, 3), Range::new(5, 10)]);
        assert_eq!(pots[0].space(), 8);
    }

    #[test]
    fn test_empty_mask_is_void() {
        let q = Query::new(1).with_duration(TimeDuration::exact(2));
        let pots = build(&q, H, &[vec![]], &[]);
        assert!(pots[0].is_void());
    }

    #[test]
    fn test_goal_subpipes() {
        let day = 86_400_000;
        let horizon = Range::new(0, 3 * day);
        let atomic = Query::new(1)
            .with_goal(Goal::atomic(2, day))
            .with_duration(TimeDuration::exact(3_600_000));
        let pots = build(&atomic, horizon, &[], &[]);
        assert_eq!(pots.len(), 6);
        assert_eq!(pots[1].potential_id, 1);
        assert_eq!(pots[1].windows(), vec![Range::new(day / 2, day)]);
        assert_eq!(pots[1].duration(), TimeDuration::exact(3_600_000));

        let split = Query::new(2).with_goal(Goal::splittable(TimeDuration::new(2, 4), day));
        let pots = build(&split, horizon, &[], &[]);
        assert_eq!(pots.len(), 3);
        assert!(pots[0].is_splittable);
        assert_eq!(pots[2].duration(), TimeDuration::new(2, 4));
    }
}
