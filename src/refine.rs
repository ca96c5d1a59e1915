//! Refinement: schedule, let the caller react, schedule again.
//!
//! After a successful pass a [`DetailProvider`] may swap queries for more
//! detailed ones; after a conflict a [`ConflictResolver`] may offer a new
//! query set. The loop stops when the provider has nothing to add.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{ConflictError, Material, Query, QueryId};
use crate::scheduler::{Outcome, Scheduler};
use crate::{Error, Result};

/// Replace query `id` with `queries`. An empty list removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDetails {
    pub id: QueryId,
    #[serde(default)]
    pub queries: Vec<Query>,
}

/// Looks at a successful schedule and answers with query replacements.
pub trait DetailProvider {
    fn details(&mut self, materials: &[Material]) -> Vec<QueryDetails>;
}

/// Offers a new query set for a conflict, or gives up with `None`.
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &ConflictError, queries: &[Query]) -> Option<Vec<Query>>;
}

impl<F> DetailProvider for F
where
    F: FnMut(&[Material]) -> Vec<QueryDetails>,
{
    fn details(&mut self, materials: &[Material]) -> Vec<QueryDetails> {
        self(materials)
    }
}

impl<F> ConflictResolver for F
where
    F: FnMut(&ConflictError, &[Query]) -> Option<Vec<Query>>,
{
    fn resolve(&mut self, conflict: &ConflictError, queries: &[Query]) -> Option<Vec<Query>> {
        self(conflict, queries)
    }
}

/// Accepts the first successful schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetails;

impl DetailProvider for NoDetails {
    fn details(&mut self, _materials: &[Material]) -> Vec<QueryDetails> {
        Vec::new()
    }
}

/// Never resolves: conflicts propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Propagate;

impl ConflictResolver for Propagate {
    fn resolve(&mut self, _conflict: &ConflictError, _queries: &[Query]) -> Option<Vec<Query>> {
        None
    }
}

/// Run `scheduler` until the detail provider is satisfied.
///
/// Fails with the conflict when the resolver gives up, and with
/// [`Error::InvalidInput`] after `max_passes` schedules without settling.
pub fn refine(
    scheduler: &Scheduler,
    queries: Vec<Query>,
    mut details: impl DetailProvider,
    mut resolver: impl ConflictResolver,
    max_passes: usize,
) -> Result<Vec<Material>> {
    let mut current = queries;
    for pass in 1..=max_passes {
        match scheduler.run(&current)? {
            Outcome::Converged(materials) => {
                let changes = details.details(&materials);
                if changes.is_empty() {
                    debug!(pass, materials = materials.len(), "refinement settled");
                    return Ok(materials);
                }
                debug!(pass, replacements = changes.len(), "applying query details");
                current = apply_details(&current, &changes);
            }
            Outcome::Conflict(conflict) => match resolver.resolve(&conflict, &current) {
                Some(next) => {
                    debug!(pass, victim = %conflict.victim, "conflict resolved by caller");
                    current = next;
                }
                None => return Err(Error::Conflict(conflict)),
            },
        }
    }
    Err(Error::InvalidInput(format!("refinement did not settle within {max_passes} passes")))
}

/// Swap every query named by a detail for the detail's queries. Ids not in
/// `queries` are ignored; the first detail for an id wins.
pub fn apply_details(queries: &[Query], details: &[QueryDetails]) -> Vec<Query> {
    let mut by_id: HashMap<QueryId, &QueryDetails> = HashMap::with_capacity(details.len());
    for d in details {
        by_id.entry(d.id).or_insert(d);
    }
    queries
        .iter()
        .flat_map(|q| match by_id.get(&q.id) {
            Some(d) => d.queries.clone(),
            None => vec![q.clone()],
        })
        .collect()
}
