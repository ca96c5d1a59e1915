//! # pressure-sched — Pressure-Field Time Allocation
//!
//! Turns declarative time requests ("queries") into a non-overlapping set
//! of allocations ("materials") inside a bounded horizon. Candidates
//! compete for shared time through a continuous pressure metric; the loop
//! converges to a feasible assignment or names the query that cannot be
//! satisfied.
//!
//! ## Design Principles
//!
//! 1. **Pure stages**: builder, field and materializer are functions over
//!    plain data; only the loop holds state
//! 2. **Clean DTOs**: `Query`, `Potentiality`, `Material` cross all stages
//! 3. **Trait seam for the outside world**: `UserStateHandler` supplies
//!    masks the engine cannot know about
//! 4. **Conflicts are values**: a schedule ends in an `Outcome`
//!
//! ## Quick Start
//!
//! ```rust
//! use pressure_sched::{schedule, Query, SchedulerConfig, TimeDuration};
//!
//! # fn example() -> pressure_sched::Result<()> {
//! let config = SchedulerConfig::new(0, 100);
//! let queries = vec![
//!     Query::new(1).with_duration(TimeDuration::exact(10)),
//!     Query::new(2).with_duration(TimeDuration::new(5, 20)),
//! ];
//! let materials = schedule(config, &queries)?;
//! assert_eq!(materials.len(), 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Stages
//!
//! | Stage | Module | Description |
//! |-------|--------|-------------|
//! | Restrictions | `restriction` | Hour / weekday / month masks |
//! | Builder | `builder` | Query + masks → potentialities |
//! | Field | `field` | Potentialities → pressure chunks |
//! | Materializer | `materialize` | Equilibrium duration + placement |
//! | Loop | `scheduler` | Rounds until idle or conflict |
//! | Refinement | `refine` | Re-schedule after caller feedback |
//! | Stream | `stream` (feature `stream`) | Snapshots over a channel |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod restriction;
pub mod builder;
pub mod field;
pub mod materialize;
pub mod userstate;
pub mod scheduler;
pub mod refine;
#[cfg(feature = "stream")]
pub mod stream;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    ConflictCause, ConflictError, Goal, GoalKind, LinkOrigin, Material, Need, Place, Position,
    PotRange, PotRangeKind, Potentiality, PressureChunk, Provide, Query, QueryId, QueryLink, Range,
    RestrictionCondition, TimeBoundary, TimeDuration, TimeRestriction, TimeRestrictions,
    Transforms,
};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use config::{EquilibriumConfig, SchedulerConfig};
pub use builder::compute_pressure;
pub use scheduler::{link_mask, schedule, Outcome, Rounds, Scheduler, Snapshot};
pub use userstate::{ResourceState, Unrestricted, UserStateError, UserStateHandler};
pub use refine::{refine, ConflictResolver, DetailProvider, QueryDetails};

#[cfg(feature = "stream")]
pub use stream::spawn_rounds;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Conflict: {0}")]
    Conflict(ConflictError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConflictError> for Error {
    fn from(e: ConflictError) -> Self {
        Error::Conflict(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Load a query list from JSON.
pub fn queries_from_json(json: &str) -> Result<Vec<Query>> {
    let queries: Vec<Query> = serde_json::from_str(json)?;
    for q in &queries {
        q.validate()?;
    }
    Ok(queries)
}
