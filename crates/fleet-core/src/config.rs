//! Coordination engine configuration.

use crate::{CoreError, CoreResult};

/// Top-level engine configuration.
///
/// Typically built in code or deserialized (feature `serde`) by the
/// application crate and handed to `FleetSimBuilder`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FleetConfig {
    /// Lane weight covered per tick.  A lane of weight `w` is reserved for
    /// `ceil(w / weight_per_tick)` ticks (minimum one).  Default: 1.0.
    pub weight_per_tick: f32,

    /// Upper bound on live robots.  `None` means unlimited.
    pub max_robots: Option<usize>,

    /// When `true`, robots may only be created on spawn-point nodes.
    pub spawn_points_only: bool,

    /// How many times a task may be handed out before a planning or
    /// deadlock failure marks it permanently `Failed`.  Default: 3.
    pub max_task_attempts: u32,

    /// Deadlock re-plans penalize the offending lane by this extra cost
    /// instead of excluding it outright.  `None` excludes.
    pub detour_penalty: Option<f32>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            weight_per_tick:   1.0,
            max_robots:        None,
            spawn_points_only: false,
            max_task_attempts: 3,
            detour_penalty:    None,
        }
    }
}

impl FleetConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.weight_per_tick.is_finite() && self.weight_per_tick > 0.0) {
            return Err(CoreError::Config(format!(
                "weight_per_tick must be positive, got {}",
                self.weight_per_tick
            )));
        }
        if self.max_task_attempts == 0 {
            return Err(CoreError::Config("max_task_attempts must be at least 1".into()));
        }
        if let Some(p) = self.detour_penalty {
            if !(p.is_finite() && p > 0.0) {
                return Err(CoreError::Config(format!("detour_penalty must be positive, got {p}")));
            }
        }
        Ok(())
    }

    /// Number of ticks a lane of `weight` stays reserved.  Rounds up, so a
    /// robot never leaves a lane early.
    #[inline]
    pub fn traversal_ticks(&self, weight: f32) -> u64 {
        ((weight / self.weight_per_tick).ceil() as u64).max(1)
    }
}
