//! A half-open `[start, end)` slice of the timeline, plus the set
//! algebra every mask in the engine is built from.

use serde::{Deserialize, Serialize};

/// A half-open interval on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: i64,
    pub end: i64,
}

impl Range {
    /// Mask that can never hold anything. Returned for a query whose
    /// user-state lookup failed.
    pub const UNSATISFIABLE: Range = Range { start: -2, end: -2 };

    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> i64 {
        (self.end - self.start).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Strict overlap: touching ranges do not overlap.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, x: i64) -> bool {
        x >= self.start && x <= self.end
    }

    /// `other` lies entirely inside `self` (bounds inclusive).
    pub fn covers(&self, other: &Range) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn intersection(&self, other: &Range) -> Option<Range> {
        let r = Range::new(self.start.max(other.start), self.end.min(other.end));
        (!r.is_empty()).then_some(r)
    }

    pub fn shift(&self, by: i64) -> Range {
        Range::new(self.start + by, self.end + by)
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<(i64, i64)> for Range {
    fn from((start, end): (i64, i64)) -> Self {
        Range::new(start, end)
    }
}

// ============================================================================
// Set algebra over range lists
// ============================================================================

/// Sort by start and merge overlapping or touching ranges. Empty ranges are
/// dropped.
pub fn union(ranges: &[Range]) -> Vec<Range> {
    let mut sorted: Vec<Range> = ranges.iter().copied().filter(|r| !r.is_empty()).collect();
    sorted.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<Range> = Vec::with_capacity(sorted.len());
    for r in sorted {
        match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}

/// Every overlap between a range of `a` and a range of `b`, normalized.
pub fn intersect(a: &[Range], b: &[Range]) -> Vec<Range> {
    let overlaps: Vec<Range> = a
        .iter()
        .flat_map(|ra| b.iter().filter_map(move |rb| ra.intersection(rb)))
        .collect();
    union(&overlaps)
}

/// Intersect several masks together. An empty iterator yields `universe`.
pub fn intersect_all<'a, I>(universe: Range, masks: I) -> Vec<Range>
where
    I: IntoIterator<Item = &'a [Range]>,
{
    masks
        .into_iter()
        .fold(union(&[universe]), |acc, mask| intersect(&acc, mask))
}

/// The parts of `mask` not covered by `ranges`.
pub fn complement(mask: Range, ranges: &[Range]) -> Vec<Range> {
    subtract(&[mask], ranges)
}

/// Remove every `holes` range from `ranges`.
pub fn subtract(ranges: &[Range], holes: &[Range]) -> Vec<Range> {
    let holes = union(holes);
    let mut out = Vec::new();
    for range in union(ranges) {
        let mut cursor = range.start;
        for hole in holes.iter().filter(|h| h.overlaps(&range)) {
            if hole.start > cursor {
                out.push(Range::new(cursor, hole.start));
            }
            cursor = cursor.max(hole.end);
        }
        if cursor < range.end {
            out.push(Range::new(cursor, range.end));
        }
    }
    out
}
