//! Scheduler configuration: the horizon plus the tuning constants of the
//! equilibrium search.

use serde::{Deserialize, Serialize};

use crate::model::Range;
use crate::{Error, Result};

/// Constants of the damped duration search and of atomic placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EquilibriumConfig {
    /// The bisection step shrinks by this factor every round.
    pub step_divisor: f64,
    /// Number of recent relative steps that must agree before stopping.
    pub plateau_window: usize,
    /// Allowed distance of each recent step from their mean.
    pub plateau_tolerance: f64,
    /// Below this gap between min and target averages the target wins.
    pub same_pressure_threshold: f64,
    /// Relative step under which an overcommitted search gives up.
    pub stall_epsilon: f64,
    pub max_search_rounds: usize,
    /// Weight of the start/end preference against field pressure when
    /// choosing an atomic slot.
    pub target_bias: f64,
}

impl Default for EquilibriumConfig {
    fn default() -> Self {
        Self {
            step_divisor: 1.8,
            plateau_window: 3,
            plateau_tolerance: 0.05,
            same_pressure_threshold: 0.1,
            stall_epsilon: 1e-3,
            max_search_rounds: 64,
            target_bias: 0.5,
        }
    }
}

/// Horizon and limits for one `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub start_date: i64,
    pub end_date: i64,
    #[serde(default)]
    pub equilibrium: EquilibriumConfig,
    /// Hard cap on convergence rounds. Unset, the cap is one round per
    /// occurrence of every query plus the idle round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
}

impl SchedulerConfig {
    pub fn new(start_date: i64, end_date: i64) -> Self {
        Self {
            start_date,
            end_date,
            equilibrium: EquilibriumConfig::default(),
            max_rounds: None,
        }
    }

    pub fn with_equilibrium(mut self, equilibrium: EquilibriumConfig) -> Self {
        self.equilibrium = equilibrium;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn horizon(&self) -> Range {
        Range::new(self.start_date, self.end_date)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_date <= self.start_date {
            return Err(Error::InvalidInput(format!(
                "inverted horizon: start {} >= end {}",
                self.start_date, self.end_date
            )));
        }
        let eq = &self.equilibrium;
        if eq.step_divisor <= 1.0 {
            return Err(Error::InvalidInput("step_divisor must be greater than 1".into()));
        }
        if eq.plateau_window == 0 || eq.max_search_rounds == 0 || self.max_rounds == Some(0) {
            return Err(Error::InvalidInput("round and window limits must be positive".into()));
        }
        if eq.plateau_tolerance < 0.0 || eq.same_pressure_threshold < 0.0 || eq.stall_epsilon < 0.0 {
            return Err(Error::InvalidInput("tolerances must be non-negative".into()));
        }
        if eq.target_bias < 0.0 {
            return Err(Error::InvalidInput("target_bias must be non-negative".into()));
        }
        Ok(())
    }
}
