//! Resource-driven user state.
//!
//! This is the reference implementation of `UserStateHandler`. Queries
//! declare `needs` and `provides` on named collections; the mask keeps
//! consumers after their providers and holds waiting providers until their
//! consumers are placed.
//!
//! ## Limitations
//!
//! - **Names only**: a provide matches a need by collection name. Document
//!   contents and quantities are carried but not counted.
//! - **No stock over time**: one placed provider satisfies every consumer
//!   placed after it.
//! - **Self-provision counts**: a query that both needs and provides a
//!   collection satisfies its own non-waiting need.

use hashbrown::HashMap;
use tracing::trace;

use super::{UserStateError, UserStateHandler};
use crate::config::SchedulerConfig;
use crate::model::range::{intersect, union};
use crate::model::{Material, Potentiality, Query, QueryId, Range};

/// Need/provide bookkeeping for one query set.
#[derive(Debug, Clone)]
pub struct ResourceState {
    horizon: Range,
    providers: HashMap<String, Vec<QueryId>>,
    consumers: HashMap<String, Vec<QueryId>>,
}

impl ResourceState {
    pub fn new(config: &SchedulerConfig, queries: &[Query]) -> Self {
        let mut providers: HashMap<String, Vec<QueryId>> = HashMap::new();
        let mut consumers: HashMap<String, Vec<QueryId>> = HashMap::new();
        for q in queries {
            for p in q.provides() {
                providers.entry(p.collection.clone()).or_default().push(q.id);
            }
            for n in q.needs() {
                consumers.entry(n.collection.clone()).or_default().push(q.id);
            }
        }
        Self { horizon: config.horizon(), providers, consumers }
    }

    pub fn providers_of(&self, collection: &str) -> &[QueryId] {
        self.providers.get(collection).map_or(&[], Vec::as_slice)
    }

    pub fn consumers_of(&self, collection: &str) -> &[QueryId] {
        self.consumers.get(collection).map_or(&[], Vec::as_slice)
    }

    /// After the end of any placed provider.
    fn after_providers(&self, providers: &[QueryId], materials: &[Material]) -> Vec<Range> {
        let after: Vec<Range> = materials
            .iter()
            .filter(|m| providers.contains(&m.query_id))
            .map(|m| Range::new(m.end, self.horizon.end))
            .collect();
        union(&after)
    }

    /// Before the earliest start of every consumer; empty while any
    /// consumer is still unplaced.
    fn before_consumers(&self, consumers: &[QueryId], materials: &[Material]) -> Vec<Range> {
        let mut allowed = vec![self.horizon];
        for consumer in consumers {
            let first = materials.iter().filter(|m| m.query_id == *consumer).map(|m| m.start).min();
            let Some(start) = first else {
                return Vec::new();
            };
            allowed = intersect(&allowed, &[Range::new(self.horizon.start, start)]);
        }
        allowed
    }
}

impl UserStateHandler for ResourceState {
    fn mask(&self, query: &Query, _potentials: &[Potentiality], materials: &[Material]) -> Result<Vec<Range>, UserStateError> {
        let mut allowed = vec![self.horizon];

        for need in query.needs() {
            let providers = self.providers_of(&need.collection);
            if providers.is_empty() {
                return Err(UserStateError::NoProvider {
                    query: query.id,
                    collection: need.collection.clone(),
                });
            }
            if need.wait {
                allowed = intersect(&allowed, &self.after_providers(providers, materials));
            }
        }

        for provide in query.provides().iter().filter(|p| p.wait) {
            let consumers: Vec<QueryId> = self
                .consumers_of(&provide.collection)
                .iter()
                .copied()
                .filter(|id| *id != query.id)
                .collect();
            allowed = intersect(&allowed, &self.before_consumers(&consumers, materials));
        }

        trace!(query = %query.id, ranges = allowed.len(), "resource mask");
        Ok(allowed)
    }
}
