//! Queries: declarative requests for time.
//!
//! A query says *how long* (duration envelope), *where* (soft or exact
//! start/end boundaries), *how often* (goal), *when not* (time
//! restrictions), *relative to what* (links) and *in exchange for what*
//! (need/provide transforms). The engine never mutates a query.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Opaque query identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub u64);

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{min, target, max}` around a point in time (or a distance for links).
/// Every component is optional; absent bounds fall back to the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBoundary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl TimeBoundary {
    pub fn new(min: Option<i64>, target: Option<i64>, max: Option<i64>) -> Self {
        Self { min, target, max }
    }

    /// Soft preference for `target`, anywhere in the horizon allowed.
    pub fn target(target: i64) -> Self {
        Self { min: None, target: Some(target), max: None }
    }

    /// Hard point: `min == target == max`.
    pub fn exact(at: i64) -> Self {
        Self { min: Some(at), target: Some(at), max: Some(at) }
    }

    /// Hard interval without a preferred point.
    pub fn between(min: i64, max: i64) -> Self {
        Self { min: Some(min), target: None, max: Some(max) }
    }

    pub fn with_min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn is_exact(&self) -> bool {
        matches!((self.min, self.target, self.max), (Some(a), Some(b), Some(c)) if a == b && b == c)
    }

    /// Lowest admissible value: `min`, else `target`, else `max`.
    pub fn lowest(&self) -> Option<i64> {
        self.min.or(self.target).or(self.max)
    }

    /// Highest admissible value: `max`, else `target`, else `min`.
    pub fn highest(&self) -> Option<i64> {
        self.max.or(self.target).or(self.min)
    }

    /// `target`, else `min`, else `max`.
    pub fn target_or_lowest(&self) -> Option<i64> {
        self.target.or(self.min).or(self.max)
    }

    /// `target`, else `max`, else `min`.
    pub fn target_or_highest(&self) -> Option<i64> {
        self.target.or(self.max).or(self.min)
    }
}

/// Duration envelope: never shorter than `min`, ideally `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDuration {
    pub min: i64,
    pub target: i64,
}

impl TimeDuration {
    pub fn new(min: i64, target: i64) -> Self {
        Self { min, target }
    }

    pub fn exact(d: i64) -> Self {
        Self { min: d, target: d }
    }
}

/// Where a query may sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeBoundary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeBoundary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeDuration>,
}

/// How goal occurrences are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalKind {
    /// `quantity.target` whole occurrences per `time` period.
    Atomic,
    /// `quantity` worth of time per period, fillable across fragments.
    Splittable,
}

/// A recurring requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub kind: GoalKind,
    pub quantity: TimeDuration,
    /// Repetition period.
    pub time: i64,
}

impl Goal {
    pub fn atomic(occurrences: i64, time: i64) -> Self {
        Self { kind: GoalKind::Atomic, quantity: TimeDuration::exact(occurrences), time }
    }

    pub fn splittable(quantity: TimeDuration, time: i64) -> Self {
        Self { kind: GoalKind::Splittable, quantity, time }
    }

    /// Length of one subpipe window.
    pub fn period(&self) -> f64 {
        match self.kind {
            GoalKind::Splittable => self.time as f64,
            GoalKind::Atomic => self.time as f64 / self.quantity.target.max(1) as f64,
        }
    }
}

/// Whether restriction ranges are the allowed or the forbidden part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestrictionCondition {
    InRange,
    OutRange,
}

/// Calendar ranges in the unit of the enclosing slot: hours of the day,
/// days of the week (0 = Sunday) or months of the year (0 = January).
/// Fractional values are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRestriction {
    pub condition: RestrictionCondition,
    pub ranges: Vec<(f64, f64)>,
}

impl TimeRestriction {
    pub fn in_range(ranges: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self { condition: RestrictionCondition::InRange, ranges: ranges.into_iter().collect() }
    }

    pub fn out_range(ranges: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self { condition: RestrictionCondition::OutRange, ranges: ranges.into_iter().collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRestrictions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<TimeRestriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<TimeRestriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<TimeRestriction>,
}

/// Which end of the linked material the distance is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkOrigin {
    Start,
    End,
}

/// Place this query at `distance` from another query's material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLink {
    pub query_id: QueryId,
    pub potential_id: u32,
    pub distance: TimeBoundary,
    pub origin: LinkOrigin,
}

/// A resource this query consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Need {
    pub collection: String,
    #[serde(default = "one")]
    pub quantity: u32,
    /// The resource must already exist (a provider is placed) before this
    /// query can be placed.
    #[serde(default)]
    pub wait: bool,
}

/// A resource this query produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provide {
    pub collection: String,
    #[serde(default = "one")]
    pub quantity: u32,
    /// Hold this provider back until every consumer is placed, then place
    /// it before them.
    #[serde(default)]
    pub wait: bool,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transforms {
    #[serde(default)]
    pub needs: Vec<Need>,
    #[serde(default)]
    pub provides: Vec<Provide>,
}

/// A declarative time-allocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub id: QueryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restrictions: Option<TimeRestrictions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<QueryLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transforms: Option<Transforms>,
}

impl Query {
    pub fn new(id: u64) -> Self {
        Self {
            id: QueryId(id),
            name: format!("query-{id}"),
            position: Position::default(),
            goal: None,
            time_restrictions: None,
            links: Vec::new(),
            transforms: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_duration(mut self, duration: TimeDuration) -> Self {
        self.position.duration = Some(duration);
        self
    }

    pub fn with_start(mut self, start: TimeBoundary) -> Self {
        self.position.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: TimeBoundary) -> Self {
        self.position.end = Some(end);
        self
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_restrictions(mut self, restrictions: TimeRestrictions) -> Self {
        self.time_restrictions = Some(restrictions);
        self
    }

    pub fn with_link(mut self, link: QueryLink) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_need(mut self, need: Need) -> Self {
        self.transforms.get_or_insert_with(Transforms::default).needs.push(need);
        self
    }

    pub fn with_provide(mut self, provide: Provide) -> Self {
        self.transforms.get_or_insert_with(Transforms::default).provides.push(provide);
        self
    }

    pub fn is_splittable(&self) -> bool {
        matches!(self.goal, Some(Goal { kind: GoalKind::Splittable, .. }))
    }

    pub fn needs(&self) -> &[Need] {
        self.transforms.as_ref().map_or(&[], |t| t.needs.as_slice())
    }

    pub fn provides(&self) -> &[Provide] {
        self.transforms.as_ref().map_or(&[], |t| t.provides.as_slice())
    }

    /// Reject queries the builder cannot turn into a sensible envelope.
    pub fn validate(&self) -> Result<()> {
        let invalid = |what: &str| Err(Error::InvalidInput(format!("query {}: {what}", self.id)));

        if let Some(d) = self.position.duration {
            if d.min < 0 || d.target < 0 {
                return invalid("negative duration");
            }
            if d.min > d.target {
                return invalid("duration min exceeds target");
            }
            if d.target == 0 {
                return invalid("duration target must be positive");
            }
        } else if let (Some(start), Some(end)) = (self.position.start, self.position.end) {
            let target = end.target_or_lowest().zip(start.target_or_highest()).map(|(e, s)| e - s);
            if target.is_some_and(|t| t <= 0) {
                return invalid("start and end leave no duration");
            }
        }
        for (label, tb) in [("start", self.position.start), ("end", self.position.end)] {
            let Some(tb) = tb else { continue };
            let ordered = |a: Option<i64>, b: Option<i64>| match (a, b) {
                (Some(a), Some(b)) => a <= b,
                _ => true,
            };
            if !ordered(tb.min, tb.target) || !ordered(tb.target, tb.max) || !ordered(tb.min, tb.max) {
                return invalid(&format!("{label} boundary is not ordered min <= target <= max"));
            }
        }
        if let Some(goal) = self.goal {
            if goal.time <= 0 {
                return invalid("goal time must be positive");
            }
            if goal.quantity.target <= 0 || goal.quantity.min > goal.quantity.target {
                return invalid("goal quantity must be positive with min <= target");
            }
            if goal.period() < 1.0 {
                return invalid("goal period is shorter than one time unit");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let q = Query::new(7)
            .named("standup")
            .with_duration(TimeDuration::new(10, 15))
            .with_start(TimeBoundary::target(100))
            .with_need(Need { collection: "coffee".into(), quantity: 1, wait: true });

        assert_eq!(q.id, QueryId(7));
        assert_eq!(q.position.duration, Some(TimeDuration::new(10, 15)));
        assert_eq!(q.needs()[0].collection, "coffee");
        assert!(q.provides().is_empty());
        assert!(!q.is_splittable());
    }

    #[test]
    fn test_goal_period() {
        assert_eq!(Goal::atomic(2, 86_400_000).period(), 43_200_000.0);
        assert_eq!(Goal::splittable(TimeDuration::exact(3), 10).period(), 10.0);
    }

    #[test]
    fn test_validate_rejects_inverted_duration() {
        let q = Query::new(1).with_duration(TimeDuration::new(5, 2));
        assert!(matches!(q.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let explicit = Query::new(1).with_duration(TimeDuration::exact(0));
        assert!(matches!(explicit.validate(), Err(Error::InvalidInput(_))));

        let pinned = Query::new(2).with_start(TimeBoundary::exact(4)).with_end(TimeBoundary::exact(4));
        assert!(matches!(pinned.validate(), Err(Error::InvalidInput(_))));

        let flexible_min = Query::new(3).with_duration(TimeDuration::new(0, 4));
        assert!(flexible_min.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_sub_unit_goal_period() {
        let q = Query::new(1).with_duration(TimeDuration::exact(1)).with_goal(Goal::atomic(1000, 1000));
        assert!(matches!(q.validate(), Err(Error::InvalidInput(_))));

        let ok = Query::new(2).with_duration(TimeDuration::exact(1)).with_goal(Goal::atomic(1000, 1_000_000));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unordered_boundary() {
        let q = Query::new(1).with_start(TimeBoundary::new(Some(5), Some(3), None));
        assert!(q.validate().is_err());
        assert!(Query::new(2).with_start(TimeBoundary::exact(4)).validate().is_ok());
    }

    #[test]
    fn test_query_from_json() {
        let json = r#"{
            "id": 3,
            "name": "gym",
            "position": { "duration": { "min": 30, "target": 60 } },
            "goal": { "kind": "Atomic", "quantity": { "min": 2, "target": 2 }, "time": 1000 },
            "links": [{ "queryId": 1, "potentialId": 0, "distance": { "min": 5, "max": 10 }, "origin": "end" }]
        }"#;
        let q: Query = serde_json::from_str(json).unwrap();
        assert_eq!(q.id, QueryId(3));
        assert_eq!(q.links[0].origin, LinkOrigin::End);
        assert_eq!(q.goal.map(|g| g.kind), Some(GoalKind::Atomic));
    }
}
