//! Potentialities: candidate occurrences of a query competing for time.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{Material, QueryId, Range, TimeDuration};

/// Which dimension a [`PotRange`] bounds, and how its gradient runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PotRangeKind {
    Start,
    End,
    StartBefore,
    StartAfter,
    EndBefore,
    EndAfter,
}

impl PotRangeKind {
    pub fn is_start(self) -> bool {
        matches!(self, Self::Start | Self::StartBefore | Self::StartAfter)
    }

    pub fn is_end(self) -> bool {
        !self.is_start()
    }

    /// Gradient endpoints: `*-before` rises to the target, `*-after` falls
    /// away from it, flat kinds stay at 1.
    pub fn default_pressures(self) -> (f64, f64) {
        match self {
            Self::StartBefore | Self::EndBefore => (0.0, 1.0),
            Self::StartAfter | Self::EndAfter => (1.0, 0.0),
            Self::Start | Self::End => (1.0, 1.0),
        }
    }
}

/// A sub-interval of the start or end dimension with a linear preference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotRange {
    pub start: i64,
    pub end: i64,
    pub kind: PotRangeKind,
    pub pressure_start: f64,
    pub pressure_end: f64,
}

impl PotRange {
    pub fn new(start: i64, end: i64, kind: PotRangeKind) -> Self {
        let (pressure_start, pressure_end) = kind.default_pressures();
        Self { start, end, kind, pressure_start, pressure_end }
    }

    pub fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }

    pub fn contains(&self, x: i64) -> bool {
        x >= self.start && x <= self.end
    }

    /// Linear interpolation of the gradient at `x`, clamped to the range.
    /// A degenerate range answers its start pressure.
    pub fn pressure_at(&self, x: i64) -> f64 {
        if self.end <= self.start {
            return self.pressure_start;
        }
        let x = x.clamp(self.start, self.end);
        let ratio = (x - self.start) as f64 / (self.end - self.start) as f64;
        self.pressure_start + ratio * (self.pressure_end - self.pressure_start)
    }

    /// Clamp both bounds into `window`, re-interpolating the pressures.
    /// The result may be degenerate.
    pub fn clamp(&self, window: Range) -> PotRange {
        let start = self.start.clamp(window.start, window.end);
        let end = self.end.clamp(window.start, window.end);
        PotRange {
            start,
            end,
            kind: self.kind,
            pressure_start: self.pressure_at(start),
            pressure_end: self.pressure_at(end),
        }
    }
}

/// One feasible window, as the start/end ranges clipped to it.
pub type Place = SmallVec<[PotRange; 4]>;

/// Hard envelope of a place: lowest start to highest end of its ranges.
pub fn place_window(place: &[PotRange]) -> Range {
    let start = place.iter().map(|r| r.start).min().unwrap_or(0);
    let end = place.iter().map(|r| r.end).max().unwrap_or(0);
    Range::new(start, end)
}

/// Span covered by one family (start or end) of a place.
pub fn family_span(place: &[PotRange], start_family: bool) -> Option<Range> {
    let mut family = place.iter().filter(|r| r.kind.is_start() == start_family);
    let first = family.next()?;
    Some(family.fold(first.range(), |acc, r| {
        Range::new(acc.start.min(r.start), acc.end.max(r.end))
    }))
}

/// Best gradient a family offers at `x`; `None` when `x` is outside it.
pub fn family_preference(place: &[PotRange], start_family: bool, x: i64) -> Option<f64> {
    place
        .iter()
        .filter(|r| r.kind.is_start() == start_family && r.contains(x))
        .map(|r| r.pressure_at(x))
        .reduce(f64::max)
}

/// How hard a duration envelope pushes into `space` units of room.
///
/// `r = min / space`; an envelope that does not fit answers `r` itself,
/// otherwise `r + (1 - r) * t / (t + 1)` with `t = target / space`, so the
/// result stays under 1. No room at all is `+∞`.
pub fn compute_pressure(duration: TimeDuration, space: i64) -> f64 {
    if space <= 0 {
        return f64::INFINITY;
    }
    let space = space as f64;
    let r = duration.min as f64 / space;
    if r >= 1.0 {
        return r;
    }
    let t = duration.target as f64 / space;
    r + (1.0 - r) * t / (t + 1.0)
}

/// A candidate occurrence of a query. `pressure` is derived from `duration`
/// and `places` at construction and cannot drift from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Potentiality {
    pub query_id: QueryId,
    pub potential_id: u32,
    pub is_splittable: bool,
    duration: TimeDuration,
    pressure: f64,
    places: Vec<Place>,
}

impl Potentiality {
    pub fn new(
        query_id: QueryId,
        potential_id: u32,
        is_splittable: bool,
        duration: TimeDuration,
        places: Vec<Place>,
    ) -> Self {
        let space = places.iter().map(|p| place_window(p).len()).sum();
        Self {
            query_id,
            potential_id,
            is_splittable,
            duration,
            pressure: compute_pressure(duration, space),
            places,
        }
    }

    pub fn duration(&self) -> TimeDuration {
        self.duration
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    /// No window left: excluded from competition.
    pub fn is_void(&self) -> bool {
        self.places.is_empty()
    }

    pub fn windows(&self) -> Vec<Range> {
        self.places.iter().map(|p| place_window(p)).collect()
    }

    /// Total room across all places.
    pub fn space(&self) -> i64 {
        self.places.iter().map(|p| place_window(p).len()).sum()
    }

    pub fn longest_window(&self) -> i64 {
        self.places.iter().map(|p| place_window(p).len()).max().unwrap_or(0)
    }

    pub fn is(&self, query_id: QueryId, potential_id: u32) -> bool {
        self.query_id == query_id && self.potential_id == potential_id
    }

    pub fn is_materialized_by(&self, material: &Material) -> bool {
        self.is(material.query_id, material.potential_id)
    }

    /// Width of the preferred region: from where the start gradient peaks
    /// to where the end gradient peaks, widest over all places. Smaller
    /// means the query knows more precisely where it wants to be.
    pub fn target_span(&self) -> i64 {
        self.places
            .iter()
            .map(|place| {
                let peak_start = place
                    .iter()
                    .filter(|r| r.kind.is_start())
                    .map(|r| match r.kind {
                        PotRangeKind::StartBefore => r.end,
                        _ => r.start,
                    })
                    .min();
                let peak_end = place
                    .iter()
                    .filter(|r| r.kind.is_end())
                    .map(|r| match r.kind {
                        PotRangeKind::EndAfter => r.start,
                        _ => r.end,
                    })
                    .max();
                let window = place_window(place);
                peak_end.unwrap_or(window.end) - peak_start.unwrap_or(window.start)
            })
            .max()
            .unwrap_or(i64::MAX)
    }
}
