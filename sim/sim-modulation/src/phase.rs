//! Contact phases of the modulation law.
//!
//! The proximity Γ splits motion into three regimes. The transition regime is
//! further split by the normal velocity `v_n` relative to the desired impact
//! velocity `v_i` (negative, into the surface):
//!
//! ```text
//! Γ ≥ threshold                       FreeMotion
//! 0 < Γ < threshold,  v_n < v_i       Overshoot
//! 0 < Γ < threshold,  v_i ≤ v_n < 0   InEnvelope
//! 0 < Γ < threshold,  v_n ≥ 0         Departing
//! Γ ≤ 0                               Contact
//! ```
//!
//! Classification is a pure function of the current inputs. There is no
//! hysteresis and no latching between ticks.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ModulatorConfig;

/// Which branch of the modulation law is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContactPhase {
    /// Far from the surface. All directions ramp smoothly toward no modulation.
    FreeMotion,
    /// Approaching faster than the desired impact velocity.
    Overshoot,
    /// Approaching within the acceptable velocity envelope.
    InEnvelope,
    /// Moving away from, or parallel to, the surface.
    Departing,
    /// Touching or penetrating the surface.
    Contact,
}

impl ContactPhase {
    /// Classify the inputs of one tick.
    ///
    /// `normal_velocity` only matters in the transition regime.
    #[must_use]
    pub fn classify(proximity: f64, normal_velocity: f64, config: &ModulatorConfig) -> Self {
        if proximity >= config.free_motion_threshold {
            Self::FreeMotion
        } else if proximity > 0.0 {
            if normal_velocity < config.impact_velocity {
                Self::Overshoot
            } else if normal_velocity < 0.0 {
                Self::InEnvelope
            } else {
                // Also taken for a NaN velocity; the resulting scale is non-finite.
                Self::Departing
            }
        } else {
            Self::Contact
        }
    }

    /// Whether this is one of the transition sub-phases.
    #[must_use]
    pub fn is_transition(self) -> bool {
        matches!(self, Self::Overshoot | Self::InEnvelope | Self::Departing)
    }

    /// Whether the tangential directions are left unmodulated.
    #[must_use]
    pub fn keeps_tangents(self) -> bool {
        !matches!(self, Self::FreeMotion)
    }

    /// Short lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::FreeMotion => "free_motion",
            Self::Overshoot => "overshoot",
            Self::InEnvelope => "in_envelope",
            Self::Departing => "departing",
            Self::Contact => "contact",
        }
    }
}

impl fmt::Display for ContactPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
