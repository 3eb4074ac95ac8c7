//! Surface frames and the basis transforms built from them.
//!
//! A surface frame pairs the proximity signal Γ with three directions: the
//! surface normal and two tangents. Stacking them as columns gives the frame
//! basis `Q = [n, t1, t2]`, which maps surface coordinates to world
//! coordinates. The modulation law scales along the columns of `Q` and maps
//! the result back with `Q⁻¹`.

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ModulationError, Result};

/// Largest accepted magnitude of `n·t1 + n·t2 + t1·t2`.
pub const ORTHOGONALITY_TOLERANCE: f64 = 1e-4;

/// Proximity signal and local surface directions at the robot.
///
/// # Example
///
/// ```
/// use sim_modulation::SurfaceFrame;
/// use nalgebra::Vector3;
///
/// let frame = SurfaceFrame::new(0.5, Vector3::z(), Vector3::x(), Vector3::y());
/// assert!(frame.orthogonality_residual().abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurfaceFrame {
    /// Proximity Γ: free motion at or above the threshold, contact at or below zero.
    pub proximity: f64,
    /// Surface normal. Motion into the surface has negative velocity along it.
    pub normal: Vector3<f64>,
    /// First tangential direction.
    pub tangent1: Vector3<f64>,
    /// Second tangential direction.
    pub tangent2: Vector3<f64>,
}

impl Default for SurfaceFrame {
    /// Zero proximity and zero directions: the frame before any input.
    fn default() -> Self {
        Self::new(0.0, Vector3::zeros(), Vector3::zeros(), Vector3::zeros())
    }
}

impl SurfaceFrame {
    /// Create a surface frame.
    #[must_use]
    pub fn new(
        proximity: f64,
        normal: Vector3<f64>,
        tangent1: Vector3<f64>,
        tangent2: Vector3<f64>,
    ) -> Self {
        Self {
            proximity,
            normal,
            tangent1,
            tangent2,
        }
    }

    /// Frame aligned with the world axes (normal = x, tangents = y, z).
    #[must_use]
    pub fn axis_aligned(proximity: f64) -> Self {
        Self::new(proximity, Vector3::x(), Vector3::y(), Vector3::z())
    }

    /// Sum of the pairwise dot products of the frame directions.
    ///
    /// Zero for an orthogonal frame.
    #[must_use]
    pub fn orthogonality_residual(&self) -> f64 {
        self.normal.dot(&self.tangent1)
            + self.normal.dot(&self.tangent2)
            + self.tangent1.dot(&self.tangent2)
    }

    /// Check the near-orthogonality invariant.
    pub fn check_orthogonality(&self) -> Result<()> {
        let residual = self.orthogonality_residual();
        // Written so that a NaN residual is rejected.
        if residual.abs() <= ORTHOGONALITY_TOLERANCE {
            Ok(())
        } else {
            Err(ModulationError::NonOrthogonalFrame {
                residual,
                tolerance: ORTHOGONALITY_TOLERANCE,
            })
        }
    }

    /// Frame basis matrix with columns `[normal, tangent1, tangent2]`.
    #[must_use]
    pub fn basis_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.normal, self.tangent1, self.tangent2])
    }
}

/// A frame basis together with its cached inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameBasis {
    basis: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Default for FrameBasis {
    /// The all-zero basis a modulator holds before its first frame.
    fn default() -> Self {
        Self {
            basis: Matrix3::zeros(),
            inverse: Matrix3::zeros(),
        }
    }
}

impl FrameBasis {
    /// Build the basis of a frame and invert it.
    ///
    /// Fails with [`ModulationError::SingularMatrix`] when the directions are
    /// linearly dependent.
    pub fn from_frame(frame: &SurfaceFrame) -> Result<Self> {
        let basis = frame.basis_matrix();
        let inverse = basis.try_inverse().ok_or(ModulationError::SingularMatrix {
            input: "surface frame basis",
        })?;
        Ok(Self { basis, inverse })
    }

    /// The basis matrix `Q`.
    #[must_use]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.basis
    }

    /// The cached inverse `Q⁻¹`.
    #[must_use]
    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// Express a world vector in frame coordinates by projecting it on the
    /// frame directions (`Qᵀ v`).
    #[must_use]
    pub fn project(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.basis.transpose() * v
    }

    /// Map a diagonal scaling in frame coordinates back to world coordinates
    /// (`Q · diag(scales) · Q⁻¹`).
    #[must_use]
    pub fn conjugate_diagonal(&self, scales: &Vector3<f64>) -> Matrix3<f64> {
        self.basis * Matrix3::from_diagonal(scales) * self.inverse
    }

    /// Express a world-frame operator in frame coordinates (`Q⁻¹ · m · Q`).
    #[must_use]
    pub fn to_frame_operator(&self, m: &Matrix3<f64>) -> Matrix3<f64> {
        self.inverse * m * self.basis
    }
}
