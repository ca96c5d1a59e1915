//! # User State Handler
//!
//! The contract between the convergence loop and whatever knows about the
//! user's world beyond time: stock, prerequisites, dependencies. The loop
//! asks for an allowed mask per query every round and trusts the answer.
//!
//! ## Implementations
//!
//! | Handler | Module | Description |
//! |---------|--------|-------------|
//! | `Unrestricted` | here | No extra constraint: the whole horizon |
//! | `ResourceState` | `resource` | Need/provide transforms with `wait` |

pub mod resource;

use crate::config::SchedulerConfig;
use crate::model::{Material, Potentiality, Query, QueryId, Range};

pub use resource::ResourceState;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserStateError {
    #[error("query {query} needs '{collection}' but nothing provides it")]
    NoProvider { query: QueryId, collection: String },

    #[error("{0}")]
    Other(String),
}

// ============================================================================
// The Trait
// ============================================================================

/// Supplies an extra allowed mask per query.
///
/// `materials` holds the other queries' materials only. An error stops the
/// schedule with a user-state conflict on `query`.
pub trait UserStateHandler: Send + Sync {
    fn mask(
        &self,
        query: &Query,
        potentials: &[Potentiality],
        materials: &[Material],
    ) -> Result<Vec<Range>, UserStateError>;
}

/// Allows the whole horizon.
#[derive(Debug, Clone, Copy)]
pub struct Unrestricted {
    horizon: Range,
}

impl Unrestricted {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self { horizon: config.horizon() }
    }
}

impl UserStateHandler for Unrestricted {
    fn mask(&self, _query: &Query, _potentials: &[Potentiality], _materials: &[Material]) -> Result<Vec<Range>, UserStateError> {
        Ok(vec![self.horizon])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_is_horizon() {
        let handler = Unrestricted::new(&SchedulerConfig::new(0, 100));
        assert_eq!(handler.mask(&Query::new(1), &[], &[]), Ok(vec![Range::new(0, 100)]));
    }
}
