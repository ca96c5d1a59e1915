//! One linear piece of the pressure field.

use serde::{Deserialize, Serialize};

use super::Range;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PressureChunk {
    pub start: i64,
    pub end: i64,
    pub pressure_start: f64,
    pub pressure_end: f64,
}

impl PressureChunk {
    pub fn new(start: i64, end: i64, pressure_start: f64, pressure_end: f64) -> Self {
        Self { start, end, pressure_start, pressure_end }
    }

    pub fn flat(start: i64, end: i64, pressure: f64) -> Self {
        Self::new(start, end, pressure, pressure)
    }

    pub fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn pressure_at(&self, x: i64) -> f64 {
        if self.end == self.start {
            return self.pressure_start;
        }
        let ratio = (x - self.start) as f64 / (self.end - self.start) as f64;
        self.pressure_start + ratio * (self.pressure_end - self.pressure_start)
    }

    /// Signed trapezoid area under the chunk.
    pub fn area(&self) -> f64 {
        self.len() as f64 * (self.pressure_start + self.pressure_end) / 2.0
    }

    /// Part of the chunk inside `window`, pressures re-interpolated.
    pub fn clip(&self, window: Range) -> Option<PressureChunk> {
        let r = self.range().intersection(&window)?;
        Some(PressureChunk::new(r.start, r.end, self.pressure_at(r.start), self.pressure_at(r.end)))
    }
}

/// Area of the field over `[start, end)`.
pub fn area_between(chunks: &[PressureChunk], range: Range) -> f64 {
    chunks.iter().filter_map(|c| c.clip(range)).map(|c| c.area()).sum()
}
