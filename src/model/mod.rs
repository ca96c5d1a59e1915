//! # Scheduling Model
//!
//! Plain DTOs shared by every stage: queries in, potentialities and
//! pressure chunks in the middle, materials out.
//!
//! Design rule: no engine state here. This module is pure data.

pub mod range;
pub mod query;
pub mod potentiality;
pub mod material;
pub mod chunk;
pub mod conflict;

pub use range::Range;
pub use query::{
    Goal, GoalKind, LinkOrigin, Need, Position, Provide, Query, QueryId, QueryLink,
    RestrictionCondition, TimeBoundary, TimeDuration, TimeRestriction, TimeRestrictions,
    Transforms,
};
pub use potentiality::{compute_pressure, Place, PotRange, PotRangeKind, Potentiality};
pub use material::Material;
pub use chunk::PressureChunk;
pub use conflict::{ConflictCause, ConflictError};
