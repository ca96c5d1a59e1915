//! # Convergence Loop
//!
//! Repeats "rebuild potentialities → pick the most pressured → materialize"
//! until nothing is left to place or a conflict stops it.
//!
//! ```text
//! queries ──► builder ──► potentialities ──► field ──► materializer
//!    ▲                                                     │
//!    └──────────────── materials (append, sorted) ◄────────┘
//! ```
//!
//! Every round starts from scratch: masks and potentialities are derived
//! again from the queries and the materials committed so far.

mod rounds;

use std::sync::Arc;

use serde::Serialize;

use crate::builder;
use crate::config::SchedulerConfig;
use crate::model::range::{intersect_all, union};
use crate::model::{
    ConflictError, LinkOrigin, Material, Potentiality, PressureChunk, Query, Range,
};
use crate::userstate::{Unrestricted, UserStateHandler};
use crate::{Error, Result};

pub use rounds::{by_query, Rounds};

// ============================================================================
// Outcome & Snapshot
// ============================================================================

/// How a schedule ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    /// Nothing left to place. Materials sorted by start.
    Converged(Vec<Material>),
    /// A query cannot be satisfied; carries the partial materials.
    Conflict(ConflictError),
}

impl Outcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged(_))
    }

    /// Materials committed so far, converged or not.
    pub fn materials(&self) -> &[Material] {
        match self {
            Self::Converged(m) => m,
            Self::Conflict(e) => &e.materials,
        }
    }

    pub fn into_result(self) -> Result<Vec<Material>> {
        match self {
            Self::Converged(m) => Ok(m),
            Self::Conflict(e) => Err(Error::Conflict(e)),
        }
    }
}

/// State of the loop after one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub round: usize,
    pub potentials: Vec<Potentiality>,
    pub materials: Vec<Material>,
    pub pressure_chunks: Vec<PressureChunk>,
    pub error: Option<ConflictError>,
}

// ============================================================================
// Scheduler handle
// ============================================================================

/// Entry point: a configuration plus a user-state handler.
#[derive(Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    handler: Arc<dyn UserStateHandler>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Scheduler with no user-state constraint.
    pub fn new(config: SchedulerConfig) -> Self {
        let handler = Arc::new(Unrestricted::new(&config));
        Self { config, handler }
    }

    pub fn with_state_handler(mut self, handler: impl UserStateHandler + 'static) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn handler(&self) -> &dyn UserStateHandler {
        self.handler.as_ref()
    }

    /// Step through the loop one round at a time.
    pub fn rounds<'a>(&'a self, queries: &'a [Query]) -> Result<Rounds<'a>> {
        self.config.validate()?;
        for q in queries {
            q.validate()?;
        }
        Ok(Rounds::new(self, queries))
    }

    /// Run to the end. Conflicts are an [`Outcome`], not an error.
    pub fn run(&self, queries: &[Query]) -> Result<Outcome> {
        Ok(self.rounds(queries)?.into_outcome())
    }

    /// Run to the end; a conflict becomes [`Error::Conflict`].
    pub fn schedule(&self, queries: &[Query]) -> Result<Vec<Material>> {
        self.run(queries)?.into_result()
    }
}

/// Schedule `queries` within `config`'s horizon with no user-state
/// constraint.
pub fn schedule(config: SchedulerConfig, queries: &[Query]) -> Result<Vec<Material>> {
    Scheduler::new(config).schedule(queries)
}

// ============================================================================
// Link masks
// ============================================================================

/// Where `query` may sit given its links.
///
/// Per link: the union over the linked potentiality's materials of
/// `[point + distance.min, point + distance.max + duration.target]`, `point`
/// being the material's start or end. Links intersect. A link whose target
/// has no material yet allows nothing.
pub fn link_mask(query: &Query, materials: &[Material], horizon: Range) -> Vec<Range> {
    let duration = builder::query_duration(query, horizon).target;
    let per_link: Vec<Vec<Range>> = query
        .links
        .iter()
        .map(|link| {
            let min = link.distance.min.or(link.distance.target).unwrap_or(0);
            let max = link.distance.max.or(link.distance.target).unwrap_or(min);
            let ranges: Vec<Range> = materials
                .iter()
                .filter(|m| m.query_id == link.query_id && m.potential_id == link.potential_id)
                .map(|m| {
                    let point = match link.origin {
                        LinkOrigin::Start => m.start,
                        LinkOrigin::End => m.end,
                    };
                    Range::new(point + min, point + max + duration)
                })
                .collect();
            union(&ranges)
        })
        .collect();
    intersect_all(horizon, per_link.iter().map(Vec::as_slice))
}
