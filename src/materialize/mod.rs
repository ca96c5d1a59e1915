//! # Materializer
//!
//! Commits one potentiality to concrete time.
//!
//! Two nested searches:
//!
//! 1. **Equilibrium** over the duration, between `min` and `target`: a
//!    longer occurrence raises the pressure of everyone else, a shorter one
//!    raises its own. A damped bisection looks for the point where the
//!    others' mean pressure meets the occurrence's own.
//! 2. **Placement** for a given duration: the cheapest atomic slot under
//!    the pressure field, or the cheapest set of fragments for a
//!    splittable occurrence.
//!
//! Failure is reported as a [`ConflictError`] naming the query that cannot
//! be satisfied.

use tracing::{debug, trace};

use crate::config::EquilibriumConfig;
use crate::field::area_between;
use crate::model::potentiality::{family_preference, family_span, place_window};
use crate::model::{
    compute_pressure, ConflictCause, ConflictError, Material, Potentiality, PressureChunk, Range,
    TimeDuration,
};

/// Ties between candidate weights closer than this go to the earliest slot.
const WEIGHT_EPSILON: f64 = 1e-9;

/// A successful materialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub materials: Vec<Material>,
    /// The other potentialities as they look with `materials` occupied.
    pub updated: Vec<Potentiality>,
}

/// One simulated duration.
#[derive(Debug, Clone)]
struct Trial {
    duration: i64,
    materials: Vec<Material>,
    updated: Vec<Potentiality>,
}

impl Trial {
    fn overcommitted(&self) -> Option<&Potentiality> {
        self.updated.iter().find(|p| p.pressure() > 1.0)
    }

    fn mean_pressure(&self) -> f64 {
        mean(self.updated.iter().map(Potentiality::pressure))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Materialize `to_place` against `field`, the pressure field of every
/// other live potentiality.
///
/// `update_pressures` re-derives those others as if the given materials
/// were also occupied.
pub fn materialize<F>(
    to_place: &Potentiality,
    field: &[PressureChunk],
    config: &EquilibriumConfig,
    mut update_pressures: F,
) -> Result<Placement, ConflictError>
where
    F: FnMut(&[Material]) -> Vec<Potentiality>,
{
    let d = to_place.duration();
    let mut trial = |duration: i64| {
        let materials = simulate_placement(to_place, field, duration, config);
        let updated = if materials.is_empty() { Vec::new() } else { update_pressures(&materials) };
        Trial { duration, materials, updated }
    };

    let at_min = trial(d.min);
    if d.min >= d.target {
        return validate(to_place, at_min);
    }
    let at_target = trial(d.target);
    if at_min.materials.is_empty() && at_target.materials.is_empty() {
        debug!(query = %to_place.query_id, potential = to_place.potential_id, "no placement at min or target");
        return Err(ConflictError::new(to_place.query_id, ConflictCause::NoPlacement));
    }

    let avg_min = at_min.mean_pressure();
    let avg_max = at_target.mean_pressure();
    if !at_target.materials.is_empty()
        && (avg_min - avg_max).abs() < config.same_pressure_threshold
        && at_target.overcommitted().is_none()
    {
        trace!(query = %to_place.query_id, avg_min, avg_max, "target duration accepted");
        return validate(to_place, at_target);
    }

    let settled = search_equilibrium(to_place, config, d, &mut trial);
    validate(to_place, settled)
}

/// Damped bisection between `min` and `target`, capped by the longest
/// duration that can fit.
fn search_equilibrium<T>(to_place: &Potentiality, config: &EquilibriumConfig, d: TimeDuration, trial: &mut T) -> Trial
where
    T: FnMut(i64) -> Trial,
{
    let span = (d.target - d.min) as f64;
    let limit = if to_place.is_splittable { to_place.space() } else { to_place.longest_window() };
    let lo = d.min as f64;
    let hi = (limit as f64).min(d.target as f64).max(lo);
    let own_space = to_place.space();

    let mut delta = span / 2.0;
    let mut test = (lo + delta).min(hi);
    let mut steps: Vec<f64> = Vec::with_capacity(config.max_search_rounds);
    let mut current = trial(test.round() as i64);
    let mut last_placed = (!current.materials.is_empty()).then(|| current.clone());

    for round in 0..config.max_search_rounds {
        let overcommitted = current.overcommitted().is_some();
        let avg = current.mean_pressure();
        let own = compute_pressure(TimeDuration::new(d.min, current.duration), own_space);

        delta /= config.step_divisor;
        let relative = delta / span;
        steps.push(relative);
        trace!(
            query = %to_place.query_id,
            round,
            duration = current.duration,
            avg,
            own,
            overcommitted,
            "equilibrium step"
        );

        if overcommitted && relative < config.stall_epsilon {
            break;
        }
        if !overcommitted && !current.materials.is_empty() && plateaued(&steps, config) {
            break;
        }

        test = if overcommitted || avg <= own { test - delta } else { test + delta };
        test = test.clamp(lo, hi);
        current = trial(test.round() as i64);
        if !current.materials.is_empty() {
            last_placed = Some(current.clone());
        }
    }

    if current.materials.is_empty() {
        last_placed.unwrap_or(current)
    } else {
        current
    }
}

/// The last `plateau_window` relative steps sit within `plateau_tolerance`
/// of their mean.
fn plateaued(steps: &[f64], config: &EquilibriumConfig) -> bool {
    if steps.len() < config.plateau_window {
        return false;
    }
    let recent = &steps[steps.len() - config.plateau_window..];
    let m = mean(recent.iter().copied());
    recent.iter().all(|s| (s - m).abs() <= config.plateau_tolerance)
}

fn validate(to_place: &Potentiality, trial: Trial) -> Result<Placement, ConflictError> {
    if trial.materials.is_empty() {
        debug!(query = %to_place.query_id, duration = trial.duration, "no placement");
        return Err(ConflictError::new(to_place.query_id, ConflictCause::NoPlacement));
    }
    if let Some(victim) = trial.overcommitted() {
        debug!(
            query = %to_place.query_id,
            victim = %victim.query_id,
            pressure = victim.pressure(),
            "placement overcommits another query"
        );
        return Err(ConflictError::new(
            victim.query_id,
            ConflictCause::Overcommitted { query_id: victim.query_id, pressure: victim.pressure() },
        ));
    }
    debug!(
        query = %to_place.query_id,
        potential = to_place.potential_id,
        duration = trial.duration,
        fragments = trial.materials.len(),
        "materialized"
    );
    Ok(Placement { materials: trial.materials, updated: trial.updated })
}

// ============================================================================
// Placement for a fixed duration
// ============================================================================

/// Place `duration` worth of `pot` under `field`. Empty when it does not fit.
pub fn simulate_placement(
    pot: &Potentiality,
    field: &[PressureChunk],
    duration: i64,
    config: &EquilibriumConfig,
) -> Vec<Material> {
    if duration <= 0 {
        return Vec::new();
    }
    if pot.is_splittable {
        place_splittable(pot, field, duration)
    } else {
        place_atomic(pot, field, duration, config).into_iter().collect()
    }
}

fn coverage(field: &[PressureChunk]) -> Option<Range> {
    Some(Range::new(field.first()?.start, field.last()?.end))
}

/// Cheapest slot of exactly `duration` over every place.
///
/// Candidates are anchored on both ends of every field chunk and every
/// preference range inside the window. The weight is the mean field
/// pressure over the slot plus `target_bias` times how far the slot's ends
/// are from the preferred start and end.
pub fn place_atomic(
    pot: &Potentiality,
    field: &[PressureChunk],
    duration: i64,
    config: &EquilibriumConfig,
) -> Option<Material> {
    let covered = coverage(field)?;
    let mut best: Option<(f64, i64)> = None;

    for place in pot.places() {
        let Some(window) = place_window(place).intersection(&covered) else { continue };
        if window.len() < duration {
            continue;
        }
        let start_span = family_span(place, true);
        let end_span = family_span(place, false);

        let mut anchors: Vec<i64> = Vec::new();
        for chunk in field.iter().filter_map(|c| c.clip(window)) {
            anchors.extend([chunk.start, chunk.end - duration]);
        }
        for r in place.iter() {
            anchors.extend([r.start, r.end, r.start - duration, r.end - duration]);
        }
        anchors.sort_unstable();
        anchors.dedup();

        for start in anchors {
            let slot = Range::new(start, start + duration);
            if !window.covers(&slot) {
                continue;
            }
            if start_span.is_some_and(|s| !s.contains(slot.start)) || end_span.is_some_and(|s| !s.contains(slot.end)) {
                continue;
            }
            let area = area_between(field, slot);
            let preference = (family_preference(place, true, slot.start).unwrap_or(1.0)
                + family_preference(place, false, slot.end).unwrap_or(1.0))
                / 2.0;
            let weight = area / duration as f64 + config.target_bias * (1.0 - preference);

            let better = match best {
                None => true,
                Some((w, s)) => weight < w - WEIGHT_EPSILON || ((weight - w).abs() <= WEIGHT_EPSILON && start < s),
            };
            if better {
                best = Some((weight, start));
            }
        }
    }

    best.map(|(_, start)| Material::new(pot.query_id, pot.potential_id, start, start + duration))
}

/// Fill `duration` from the least pressured parts of the windows.
///
/// Field chunks are clipped to the windows and consumed cheapest first
/// (ties to the earliest), taking the leading part of the last one.
/// Touching fragments are merged; fragments are numbered by start.
pub fn place_splittable(pot: &Potentiality, field: &[PressureChunk], duration: i64) -> Vec<Material> {
    let mut pieces: Vec<PressureChunk> = pot
        .windows()
        .into_iter()
        .flat_map(|w| field.iter().filter_map(move |c| c.clip(w)))
        .collect();
    if pieces.iter().map(PressureChunk::len).sum::<i64>() < duration {
        return Vec::new();
    }
    pieces.sort_by(|a, b| a.area().total_cmp(&b.area()).then(a.start.cmp(&b.start)));

    let mut taken: Vec<Range> = Vec::new();
    let mut remaining = duration;
    for piece in pieces {
        if remaining == 0 {
            break;
        }
        let take = piece.len().min(remaining);
        taken.push(Range::new(piece.start, piece.start + take));
        remaining -= take;
    }
    taken.sort_by_key(|r| r.start);

    let mut merged: Vec<Range> = Vec::with_capacity(taken.len());
    for r in taken {
        match merged.last_mut() {
            Some(last) if last.end == r.start => last.end = r.end,
            _ => merged.push(r),
        }
    }
    merged
        .into_iter()
        .enumerate()
        .map(|(i, r)| Material::new(pot.query_id, pot.potential_id, r.start, r.end).with_split(i as u32))
        .collect()
}
