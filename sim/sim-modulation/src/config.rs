//! Modulator configuration.
//!
//! The configuration is fixed when a [`Modulator`](crate::Modulator) is built.
//! It sets the proximity threshold that ends free motion, the normal velocity
//! the robot should have when it touches the surface and the contact force it
//! should settle to.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ModulationError, Result};

/// Number of Cartesian components (x, y, z) the modulation law operates on.
pub const CARTESIAN_DIM: usize = 3;

/// Where the proximity signal and the surface frame come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SurfaceSource {
    /// A closed-form surface evaluated by the modulator
    /// (see [`Modulator::track_surface`](crate::Modulator::track_surface)).
    Builtin,
    /// Frames are pushed by an external perception or planning module.
    #[default]
    External,
}

/// Configuration for a [`Modulator`](crate::Modulator).
///
/// # Example
///
/// ```
/// use sim_modulation::ModulatorConfig;
///
/// let config = ModulatorConfig::default()
///     .with_impact_velocity(-0.05)
///     .with_desired_contact_force(5.0)
///     .with_free_motion_threshold(0.3);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModulatorConfig {
    /// Dimension of the state. Only 3 (x, y, z) is supported.
    pub state_dimension: usize,

    /// Desired normal velocity at the impact point (m/s).
    ///
    /// Must be strictly negative: negative normal velocity is motion into the surface.
    pub impact_velocity: f64,

    /// Desired steady-state contact force magnitude (N). Must be non-negative.
    pub desired_contact_force: f64,

    /// Proximity value at and above which the robot is in free motion.
    pub free_motion_threshold: f64,

    /// Source of the proximity signal and surface frame.
    pub surface_source: SurfaceSource,
}

impl Default for ModulatorConfig {
    fn default() -> Self {
        Self {
            state_dimension: CARTESIAN_DIM,
            impact_velocity: -0.05,     // 5 cm/s into the surface
            desired_contact_force: 5.0, // 5 N
            free_motion_threshold: 1.0, // Γ = 1 ends free motion
            surface_source: SurfaceSource::External,
        }
    }
}

impl ModulatorConfig {
    /// Create a configuration from the individual parameters.
    #[must_use]
    pub fn new(
        state_dimension: usize,
        impact_velocity: f64,
        desired_contact_force: f64,
        free_motion_threshold: f64,
        surface_source: SurfaceSource,
    ) -> Self {
        Self {
            state_dimension,
            impact_velocity,
            desired_contact_force,
            free_motion_threshold,
            surface_source,
        }
    }

    /// Set the desired impact velocity.
    #[must_use]
    pub fn with_impact_velocity(mut self, velocity: f64) -> Self {
        self.impact_velocity = velocity;
        self
    }

    /// Set the desired contact force.
    #[must_use]
    pub fn with_desired_contact_force(mut self, force: f64) -> Self {
        self.desired_contact_force = force;
        self
    }

    /// Set the free-motion proximity threshold.
    #[must_use]
    pub fn with_free_motion_threshold(mut self, threshold: f64) -> Self {
        self.free_motion_threshold = threshold;
        self
    }

    /// Set the surface source.
    #[must_use]
    pub fn with_surface_source(mut self, source: SurfaceSource) -> Self {
        self.surface_source = source;
        self
    }

    /// Use the built-in closed-form surface.
    #[must_use]
    pub fn builtin_surface(self) -> Self {
        self.with_surface_source(SurfaceSource::Builtin)
    }

    /// Whether the built-in surface supplies the frame.
    #[must_use]
    pub fn uses_builtin_surface(&self) -> bool {
        self.surface_source == SurfaceSource::Builtin
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.state_dimension != CARTESIAN_DIM {
            return Err(ModulationError::invalid_config(format!(
                "state dimension must be {CARTESIAN_DIM} (x, y, z), got {}",
                self.state_dimension
            )));
        }

        if !self.impact_velocity.is_finite() || self.impact_velocity >= 0.0 {
            return Err(ModulationError::invalid_config(format!(
                "impact velocity must be negative, got {}",
                self.impact_velocity
            )));
        }

        if !self.desired_contact_force.is_finite() || self.desired_contact_force < 0.0 {
            return Err(ModulationError::invalid_config(format!(
                "desired contact force must be non-negative, got {}",
                self.desired_contact_force
            )));
        }

        if !self.free_motion_threshold.is_finite() {
            return Err(ModulationError::invalid_config(format!(
                "free motion threshold must be finite, got {}",
                self.free_motion_threshold
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ModulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.state_dimension, CARTESIAN_DIM);
        assert!(!config.uses_builtin_surface());
    }

    #[test]
    fn test_rejects_wrong_dimension() {
        for dim in [0, 2, 4, 6] {
            let config = ModulatorConfig::new(dim, -0.1, 1.0, 1.0, SurfaceSource::External);
            let err = config.validate().unwrap_err();
            assert!(err.is_config_error());
        }
    }

    #[test]
    fn test_rejects_non_negative_impact_velocity() {
        let config = ModulatorConfig::default().with_impact_velocity(0.0);
        assert!(config.validate().unwrap_err().is_config_error());

        let config = ModulatorConfig::default().with_impact_velocity(0.2);
        assert!(config.validate().is_err());

        let config = ModulatorConfig::default().with_impact_velocity(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_contact_force_bounds() {
        let config = ModulatorConfig::default().with_desired_contact_force(-1.0);
        assert!(config.validate().unwrap_err().is_config_error());

        // Zero force is allowed: the robot touches without pressing.
        let config = ModulatorConfig::default().with_desired_contact_force(0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ModulatorConfig::default()
            .with_impact_velocity(-0.2)
            .with_desired_contact_force(10.0)
            .with_free_motion_threshold(0.5)
            .builtin_surface();

        assert_eq!(config.impact_velocity, -0.2);
        assert_eq!(config.desired_contact_force, 10.0);
        assert_eq!(config.free_motion_threshold, 0.5);
        assert!(config.uses_builtin_surface());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_config() {
        let config = ModulatorConfig::default().builtin_surface();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ModulatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
