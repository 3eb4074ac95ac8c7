//! Contact-transition modulation for Cartesian robot controllers.
//!
//! This crate computes a state-dependent 3×3 modulation matrix that blends a
//! nominal motion controller into a contact-force controller as the
//! end-effector approaches, touches and penetrates a surface. Instead of
//! switching controllers at impact, the commanded dynamics are rescaled
//! continuously along the surface normal:
//!
//! - **No switching**: the same law covers free motion, approach and contact
//! - **Velocity shaping**: the approach is corrected toward a desired impact velocity
//! - **Force matching**: in contact the normal component settles to a desired force
//!
//! # Phases
//!
//! The proximity signal Γ selects the regime:
//!
//! ```text
//! Γ ≥ threshold       free motion    all directions ramp toward 1
//! 0 < Γ < threshold   transition     normal scale from velocity / force terms
//! Γ ≤ 0               contact        normal scale matches the desired force
//! ```
//!
//! See [`ContactPhase`] for the transition sub-phases and [`Modulator`] for
//! the law itself.
//!
//! # Example
//!
//! ```
//! use sim_modulation::{ContactPhase, Modulator, ModulatorConfig, RobotState, SurfaceFrame};
//! use nalgebra::Vector3;
//!
//! let mut modulator = Modulator::new(
//!     ModulatorConfig::default()
//!         .with_impact_velocity(-0.05)
//!         .with_desired_contact_force(5.0)
//!         .with_free_motion_threshold(0.3),
//! )
//! .unwrap();
//!
//! // One control tick, far from the surface.
//! modulator.update_frame(&SurfaceFrame::axis_aligned(0.5)).unwrap();
//! modulator
//!     .update_state(&RobotState::new(
//!         Vector3::zeros(),
//!         Vector3::new(-0.1, 0.0, 0.0),
//!         Vector3::new(1.0, 0.0, 0.0),
//!     ))
//!     .unwrap();
//!
//! let modulation = modulator.compute().unwrap();
//! assert_eq!(modulation.phase, ContactPhase::FreeMotion);
//!
//! // The driver applies the matrix to its nominal dynamics.
//! let commanded = modulation.apply(&Vector3::new(1.0, 0.0, 0.0));
//! assert!(commanded.x > 0.0 && commanded.x < 1.0);
//! ```
//!
//! # Errors
//!
//! Every violation (bad configuration, wrong input shape, non-orthogonal
//! frame, computing before inputs arrive) is returned as a
//! [`ModulationError`] and latches the modulator until
//! [`Modulator::reset`]. No partial or stale matrix is ever returned after a
//! violation.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Hardware control loops
//! - Headless simulation
//! - Analysis tools

#![doc(html_root_url = "https://docs.rs/sim-modulation/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,   // Error docs added where non-obvious
)]

mod config;
mod error;
mod frame;
mod modulator;
mod phase;
mod state;
mod surface;

pub use config::{ModulatorConfig, SurfaceSource, CARTESIAN_DIM};
pub use error::ModulationError;
pub use frame::{FrameBasis, SurfaceFrame, ORTHOGONALITY_TOLERANCE};
pub use modulator::{Modulation, Modulator, DEPARTURE_GAIN, PROXIMITY_EPSILON};
pub use phase::ContactPhase;
pub use state::RobotState;
pub use surface::{PlanarSurface, Surface};

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Vector3};

/// Result type for modulation operations.
pub type Result<T> = std::result::Result<T, ModulationError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tick_through_phases() {
        let mut modulator = Modulator::new(
            ModulatorConfig::default()
                .with_impact_velocity(-0.05)
                .with_desired_contact_force(5.0)
                .with_free_motion_threshold(0.3),
        )
        .unwrap();
        let state = RobotState::new(
            Vector3::zeros(),
            Vector3::new(-0.02, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        );
        modulator.update_state(&state).unwrap();

        let phases: Vec<_> = [1.0, 0.1, -0.01]
            .into_iter()
            .map(|proximity| {
                modulator
                    .update_frame(&SurfaceFrame::axis_aligned(proximity))
                    .unwrap();
                modulator.compute().unwrap().phase
            })
            .collect();

        assert_eq!(
            phases,
            vec![
                ContactPhase::FreeMotion,
                ContactPhase::InEnvelope,
                ContactPhase::Contact
            ]
        );
    }

    #[test]
    fn test_contact_matrix_in_tilted_frame() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let normal = Vector3::new(s, 0.0, s);
        let mut modulator = Modulator::new(ModulatorConfig::default()).unwrap();
        modulator
            .update_frame(&SurfaceFrame::new(
                -0.1,
                normal,
                Vector3::new(-s, 0.0, s),
                Vector3::y(),
            ))
            .unwrap();
        modulator
            .update_state(&RobotState::new(Vector3::zeros(), Vector3::zeros(), normal))
            .unwrap();

        let m = modulator.compute_modulation().unwrap();

        // The normal is scaled by −F_d, tangents pass through.
        assert_relative_eq!(m * normal, normal * -5.0, epsilon = 1e-12);
        assert_relative_eq!(m * Vector3::y(), Vector3::y(), epsilon = 1e-12);
    }
}
