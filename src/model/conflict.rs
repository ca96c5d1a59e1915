//! Why a query could not be placed.

use serde::Serialize;

use super::{Material, QueryId};

/// What made placement fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConflictCause {
    /// No window can hold even the minimum duration.
    NoPlacement,
    /// Placing the victim would push another query past pressure 1.
    Overcommitted { query_id: QueryId, pressure: f64 },
    /// The user-state handler refused the query.
    UserState(String),
    /// A candidate was never materialized before the loop went idle.
    Unplaced,
}

impl std::fmt::Display for ConflictCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPlacement => write!(f, "no placement"),
            Self::Overcommitted { query_id, pressure } => {
                write!(f, "query {query_id} overcommitted (pressure {pressure:.3})")
            }
            Self::UserState(msg) => write!(f, "user state: {msg}"),
            Self::Unplaced => write!(f, "never placed"),
        }
    }
}

/// A query that cannot be satisfied, with the materials committed so far.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("conflict on query {victim}: {cause}")]
pub struct ConflictError {
    pub victim: QueryId,
    pub materials: Vec<Material>,
    pub cause: ConflictCause,
}

impl ConflictError {
    pub fn new(victim: QueryId, cause: ConflictCause) -> Self {
        Self { victim, materials: Vec::new(), cause }
    }

    pub fn with_materials(mut self, materials: Vec<Material>) -> Self {
        self.materials = materials;
        self
    }
}
