//! Round-by-round driver of the convergence loop.

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{link_mask, Outcome, Scheduler, Snapshot};
use crate::builder;
use crate::config::SchedulerConfig;
use crate::field::pressure_field;
use crate::materialize::materialize;
use crate::model::material::insert_sorted;
use crate::model::{
    ConflictCause, ConflictError, Material, Potentiality, PressureChunk, Query, QueryId, Range,
};
use crate::restriction;

/// Iterator over the loop's rounds. Yields one [`Snapshot`] per round,
/// the last one being the idle or failing round.
pub struct Rounds<'a> {
    scheduler: &'a Scheduler,
    queries: &'a [Query],
    materials: Vec<Material>,
    previous: Option<(Vec<Potentiality>, Vec<Material>)>,
    ever_live: HashSet<(QueryId, u32)>,
    round: usize,
    outcome: Option<Outcome>,
}

/// What a round derived before picking anything.
struct Derived {
    potentials: Vec<Potentiality>,
    error: Option<ConflictError>,
}

impl<'a> Rounds<'a> {
    pub(super) fn new(scheduler: &'a Scheduler, queries: &'a [Query]) -> Self {
        Self {
            scheduler,
            queries,
            materials: Vec::new(),
            previous: None,
            ever_live: HashSet::new(),
            round: 0,
            outcome: None,
        }
    }

    /// Set once the loop has ended.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Drive the remaining rounds and return how the loop ended.
    pub fn into_outcome(mut self) -> Outcome {
        while self.next().is_some() {}
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => Outcome::Converged(std::mem::take(&mut self.materials)),
        }
    }

    fn horizon(&self) -> Range {
        self.scheduler.config.horizon()
    }

    /// Rebuild every potentiality not yet materialized by `materials`, void
    /// ones included, with all masks applied.
    fn derive(&self, materials: &[Material]) -> Derived {
        let horizon = self.horizon();
        let handler = self.scheduler.handler();
        let last_potentials = self.previous.as_ref().map_or(&[][..], |(p, _)| p.as_slice());

        let mut potentials = Vec::new();
        let mut error = None;
        for query in self.queries {
            let others: Vec<Material> =
                materials.iter().filter(|m| m.query_id != query.id).copied().collect();

            let user = match handler.mask(query, last_potentials, &others) {
                Ok(mask) => mask,
                Err(e) => {
                    warn!(query = %query.id, error = %e, "user state refused query");
                    if error.is_none() {
                        error = Some(
                            ConflictError::new(query.id, ConflictCause::UserState(e.to_string()))
                                .with_materials(materials.to_vec()),
                        );
                    }
                    vec![Range::UNSATISFIABLE]
                }
            };

            let mut masks = vec![restriction::apply(query.time_restrictions.as_ref(), &[horizon]), user];
            if !query.links.is_empty() {
                masks.push(link_mask(query, materials, horizon));
            }

            potentials.extend(
                builder::build(query, horizon, &masks, materials)
                    .into_iter()
                    .filter(|p| !materials.iter().any(|m| p.is_materialized_by(m))),
            );
        }
        Derived { potentials, error }
    }

    /// Candidate ever seen live that still has no material.
    fn first_unplaced(&self) -> Option<QueryId> {
        let placed: HashSet<(QueryId, u32)> =
            self.materials.iter().map(|m| (m.query_id, m.potential_id)).collect();
        self.queries
            .iter()
            .map(|q| q.id)
            .find(|id| self.ever_live.iter().any(|(q, p)| q == id && !placed.contains(&(*q, *p))))
    }

    fn finish(&mut self, outcome: Outcome) {
        match &outcome {
            Outcome::Converged(m) => debug!(rounds = self.round, materials = m.len(), "converged"),
            Outcome::Conflict(e) => warn!(rounds = self.round, victim = %e.victim, cause = %e.cause, "conflict"),
        }
        self.outcome = Some(outcome);
    }

    fn snapshot(&self, potentials: Vec<Potentiality>, pressure_chunks: Vec<PressureChunk>, error: Option<ConflictError>) -> Snapshot {
        Snapshot {
            round: self.round,
            potentials,
            materials: self.materials.clone(),
            pressure_chunks,
            error,
        }
    }

    /// Converged, unless a candidate that was once live never got placed.
    fn settle(&mut self) -> Outcome {
        match self.first_unplaced() {
            Some(victim) => Outcome::Conflict(
                ConflictError::new(victim, ConflictCause::Unplaced).with_materials(self.materials.clone()),
            ),
            None => Outcome::Converged(self.materials.clone()),
        }
    }
}

/// Configured cap, or one round per occurrence of every query plus the
/// idle round.
fn round_cap(config: &SchedulerConfig, queries: &[Query]) -> usize {
    config.max_rounds.unwrap_or_else(|| {
        let horizon = config.horizon();
        queries.iter().map(|q| builder::subpipes(q, horizon).len()).sum::<usize>() + 1
    })
}

/// Index of the potentiality to place next: highest pressure, then the
/// tightest target window, then declaration order.
fn pick(potentials: &[Potentiality]) -> Option<usize> {
    potentials
        .iter()
        .enumerate()
        .min_by(|(i, a), (j, b)| {
            b.pressure()
                .total_cmp(&a.pressure())
                .then(a.target_span().cmp(&b.target_span()))
                .then(i.cmp(j))
        })
        .map(|(i, _)| i)
}

impl Iterator for Rounds<'_> {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        if self.outcome.is_some() {
            return None;
        }
        self.round += 1;
        let horizon = self.horizon();

        let cap = round_cap(&self.scheduler.config, self.queries);
        if self.round > cap {
            warn!(max_rounds = cap, "round cap reached");
            let outcome = self.settle();
            self.finish(outcome);
            return None;
        }

        let Derived { potentials, error } = self.derive(&self.materials);
        let potentials: Vec<Potentiality> = potentials.into_iter().filter(|p| !p.is_void()).collect();
        if let Some(error) = error {
            let snap = self.snapshot(potentials, Vec::new(), Some(error.clone()));
            self.finish(Outcome::Conflict(error));
            return Some(snap);
        }
        for p in &potentials {
            self.ever_live.insert((p.query_id, p.potential_id));
        }

        let stalled = self
            .previous
            .as_ref()
            .is_some_and(|(p, m)| *p == potentials && *m == self.materials);
        let Some(top) = pick(&potentials).filter(|_| !stalled) else {
            let snap = self.snapshot(potentials, pressure_field(&[], horizon), None);
            let outcome = self.settle();
            self.finish(outcome);
            return Some(snap);
        };

        let mut others = potentials.clone();
        let to_place = others.remove(top);
        let field = pressure_field(&others, horizon);
        debug!(
            round = self.round,
            query = %to_place.query_id,
            potential = to_place.potential_id,
            pressure = to_place.pressure(),
            competitors = others.len(),
            "placing"
        );

        // Trial placements re-derive everyone with the trial committed: masks
        // may open for waiting queries, and a live one left without room
        // stays in with infinite pressure.
        let placed = materialize(&to_place, &field, &self.scheduler.config.equilibrium, |extra| {
            let mut committed = self.materials.clone();
            insert_sorted(&mut committed, extra.iter().copied());
            self.derive(&committed)
                .potentials
                .into_iter()
                .filter(|p| !p.is_void() || others.iter().any(|o| o.is(p.query_id, p.potential_id)))
                .collect()
        });

        match placed {
            Ok(placement) => {
                insert_sorted(&mut self.materials, placement.materials);
                self.previous = Some((potentials.clone(), self.materials.clone()));
                Some(self.snapshot(potentials, field, None))
            }
            Err(conflict) => {
                let conflict = conflict.with_materials(self.materials.clone());
                let snap = self.snapshot(potentials, field, Some(conflict.clone()));
                self.finish(Outcome::Conflict(conflict));
                Some(snap)
            }
        }
    }
}

/// Materials grouped by query, for callers inspecting an outcome.
pub fn by_query(materials: &[Material]) -> HashMap<QueryId, Vec<Material>> {
    let mut grouped: HashMap<QueryId, Vec<Material>> = HashMap::new();
    for m in materials {
        grouped.entry(m.query_id).or_default().push(*m);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Goal, TimeDuration};

    #[test]
    fn test_rounds_end_with_idle_snapshot() {
        let scheduler = Scheduler::new(SchedulerConfig::new(0, 100));
        let queries = [Query::new(1).with_duration(TimeDuration::exact(10))];
        let mut rounds = scheduler.rounds(&queries).unwrap();

        let first = rounds.next().unwrap();
        assert_eq!(first.round, 1);
        assert_eq!(first.potentials.len(), 1);
        assert_eq!(first.materials.len(), 1);
        assert!(first.error.is_none());

        let idle = rounds.next().unwrap();
        assert!(idle.potentials.is_empty());
        assert_eq!(idle.pressure_chunks.len(), 1);
        assert!(rounds.next().is_none());
        assert!(rounds.outcome().is_some_and(Outcome::is_converged));
    }

    #[test]
    fn test_round_cap_reports_unplaced() {
        let config = SchedulerConfig::new(0, 100).with_max_rounds(1);
        let scheduler = Scheduler::new(config);
        let queries = [
            Query::new(1).with_duration(TimeDuration::exact(10)),
            Query::new(2).with_duration(TimeDuration::exact(10)),
        ];
        match scheduler.run(&queries).unwrap() {
            Outcome::Conflict(e) => {
                assert_eq!(e.cause, ConflictCause::Unplaced);
                assert_eq!(e.materials.len(), 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_round_cap_counts_occurrences() {
        let queries = [
            Query::new(1).with_duration(TimeDuration::exact(1)).with_goal(Goal::atomic(1, 1)),
            Query::new(2).with_duration(TimeDuration::exact(10)),
        ];
        let config = SchedulerConfig::new(0, 20_000);
        assert_eq!(round_cap(&config, &queries), 20_002);
        assert_eq!(round_cap(&config.with_max_rounds(5), &queries), 5);
    }

    #[test]
    fn test_pick_prefers_pressure_then_tightness() {
        use crate::model::{PotRange, PotRangeKind};
        use smallvec::smallvec;

        let free = Potentiality::new(
            QueryId(1),
            0,
            false,
            TimeDuration::exact(4),
            vec![smallvec![PotRange::new(0, 100, PotRangeKind::Start), PotRange::new(0, 100, PotRangeKind::End)]],
        );
        let targeted = Potentiality::new(
            QueryId(2),
            0,
            false,
            TimeDuration::exact(4),
            vec![smallvec![
                PotRange::new(0, 1, PotRangeKind::StartBefore),
                PotRange::new(1, 100, PotRangeKind::StartAfter),
                PotRange::new(0, 5, PotRangeKind::EndBefore),
                PotRange::new(5, 100, PotRangeKind::EndAfter),
            ]],
        );
        assert_eq!(pick(&[free.clone(), targeted.clone()]), Some(1));
        assert_eq!(pick(&[free.clone(), free]), Some(0));
        assert_eq!(pick(&[]), None);
    }

    #[test]
    fn test_by_query_groups() {
        let grouped = by_query(&[
            Material::new(QueryId(1), 0, 0, 1),
            Material::new(QueryId(2), 0, 1, 2),
            Material::new(QueryId(1), 1, 5, 6),
        ]);
        assert_eq!(grouped[&QueryId(1)].len(), 2);
    }
}
