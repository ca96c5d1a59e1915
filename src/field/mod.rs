//! # Pressure Field
//!
//! Sweeps the competing potentialities into a piecewise-linear field over
//! the horizon. Each place adds a trapezoid scaled by its potentiality's
//! pressure: rising through the start preference, flat in between, falling
//! through the end preference.
//!
//! The field is always a contiguous, gap-free cover of the horizon. It
//! never fails; no input gives a single zero chunk.

use tracing::trace;

use crate::model::{PotRangeKind, Potentiality, PressureChunk, Range};

pub use crate::model::chunk::area_between;

/// One additive contribution: 0 before `start`, linear `from → to`
/// inside, `to` after `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    pub start: i64,
    pub end: i64,
    pub from: f64,
    pub to: f64,
}

impl Ramp {
    fn is_zero(&self) -> bool {
        self.from == 0.0 && self.to == 0.0
    }

    fn value_at(&self, x: i64) -> f64 {
        if self.end <= self.start {
            return self.to;
        }
        let ratio = (x - self.start) as f64 / (self.end - self.start) as f64;
        self.from + ratio * (self.to - self.from)
    }
}

/// Ramps contributed by every place of `pot`.
pub fn ramps(pot: &Potentiality) -> Vec<Ramp> {
    let p = pot.pressure();
    if !p.is_finite() || p == 0.0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for place in pot.places() {
        let find = |kind: PotRangeKind| place.iter().find(|r| r.kind == kind);

        let falling = find(PotRangeKind::EndAfter);
        let end_family = falling
            .or_else(|| find(PotRangeKind::End))
            .or_else(|| find(PotRangeKind::EndBefore));
        let fall_end = end_family.map_or(i64::MAX, |r| r.end);

        match find(PotRangeKind::StartBefore).or_else(|| find(PotRangeKind::Start)) {
            Some(r) if r.kind == PotRangeKind::StartBefore => out.push(Ramp {
                start: r.start,
                end: r.end.min(fall_end).max(r.start),
                from: r.pressure_start * p,
                to: p,
            }),
            Some(r) => out.push(Ramp { start: r.start, end: r.start, from: p, to: p }),
            None => {
                if let Some(r) = place.iter().find(|r| r.kind.is_start()) {
                    out.push(Ramp { start: r.start, end: r.start, from: p, to: p });
                }
            }
        }

        match (falling, end_family) {
            (Some(r), _) => {
                out.push(Ramp { start: r.start, end: r.end, from: 0.0, to: -(1.0 - r.pressure_end) * p });
                out.push(Ramp { start: r.end, end: r.end, from: -r.pressure_end * p, to: -r.pressure_end * p });
            }
            (None, Some(r)) => out.push(Ramp { start: r.end, end: r.end, from: -p, to: -p }),
            (None, None) => {}
        }
    }
    out.retain(|r| !r.is_zero());
    out
}

/// Field of `pots` over `horizon`.
pub fn pressure_field(pots: &[Potentiality], horizon: Range) -> Vec<PressureChunk> {
    let mut all: Vec<Ramp> = pots.iter().flat_map(ramps).collect();
    all.sort_by_key(|r| r.start);

    let mut chunks = vec![PressureChunk::flat(horizon.start, horizon.end, 0.0)];
    for ramp in &all {
        fold_ramp(&mut chunks, ramp);
    }
    trace!(ramps = all.len(), chunks = chunks.len(), "pressure field");
    chunks
}

fn fold_ramp(chunks: &mut Vec<PressureChunk>, ramp: &Ramp) {
    split_at(chunks, ramp.start);
    split_at(chunks, ramp.end);
    for chunk in chunks.iter_mut() {
        if chunk.end <= ramp.start {
            continue;
        }
        if chunk.start >= ramp.end {
            chunk.pressure_start += ramp.to;
            chunk.pressure_end += ramp.to;
        } else if chunk.start >= ramp.start {
            chunk.pressure_start += ramp.value_at(chunk.start);
            chunk.pressure_end += ramp.value_at(chunk.end);
        }
    }
}

/// Split the chunk strictly containing `x`. Never merges.
fn split_at(chunks: &mut Vec<PressureChunk>, x: i64) {
    let Some(i) = chunks.iter().position(|c| c.start < x && x < c.end) else {
        return;
    };
    let c = chunks[i];
    let mid = c.pressure_at(x);
    chunks[i] = PressureChunk::new(c.start, x, c.pressure_start, mid);
    chunks.insert(i + 1, PressureChunk::new(x, c.end, mid, c.pressure_end));
}
