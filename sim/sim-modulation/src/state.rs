//! Robot state consumed by the modulation law.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::CARTESIAN_DIM;
use crate::{ModulationError, Result};

/// Cartesian end-effector state for one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RobotState {
    /// End-effector position (m).
    pub position: Vector3<f64>,
    /// End-effector velocity as measured or estimated (m/s).
    pub velocity: Vector3<f64>,
    /// Force of the unmodulated nominal dynamics (N).
    ///
    /// Normalizes the contact-force terms; this is not the measured contact force.
    pub nominal_force: Vector3<f64>,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            nominal_force: Vector3::zeros(),
        }
    }
}

impl RobotState {
    /// Create a robot state.
    #[must_use]
    pub fn new(
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        nominal_force: Vector3<f64>,
    ) -> Self {
        Self {
            position,
            velocity,
            nominal_force,
        }
    }
}

/// Convert a dynamically sized vector into a Cartesian vector.
pub(crate) fn cartesian_vector(input: &'static str, v: &DVector<f64>) -> Result<Vector3<f64>> {
    if v.len() != CARTESIAN_DIM {
        return Err(ModulationError::dimension(input, CARTESIAN_DIM, v.len()));
    }
    Ok(Vector3::new(v[0], v[1], v[2]))
}

/// Convert a dynamically sized matrix into a Cartesian 3×3 matrix.
pub(crate) fn cartesian_matrix(input: &'static str, m: &DMatrix<f64>) -> Result<Matrix3<f64>> {
    if m.nrows() != CARTESIAN_DIM {
        return Err(ModulationError::dimension(input, CARTESIAN_DIM, m.nrows()));
    }
    if m.ncols() != CARTESIAN_DIM {
        return Err(ModulationError::dimension(input, CARTESIAN_DIM, m.ncols()));
    }
    Ok(m.fixed_view::<3, 3>(0, 0).into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_vector() {
        let v = cartesian_vector("velocity", &DVector::from_vec(vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(v, Vector3::new(1.0, 2.0, 3.0));

        let err = cartesian_vector("velocity", &DVector::from_vec(vec![1.0, 2.0])).unwrap_err();
        assert_eq!(err, ModulationError::dimension("velocity", 3, 2));
    }

    #[test]
    fn test_cartesian_matrix() {
        let m = cartesian_matrix("mass matrix", &DMatrix::identity(3, 3)).unwrap();
        assert_eq!(m, Matrix3::identity());

        let err = cartesian_matrix("mass matrix", &DMatrix::identity(3, 4)).unwrap_err();
        assert_eq!(err, ModulationError::dimension("mass matrix", 3, 4));

        let err = cartesian_matrix("mass matrix", &DMatrix::identity(6, 6)).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_cartesian_matrix_keeps_layout() {
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let fixed = cartesian_matrix("mass matrix", &m).unwrap();
        assert_eq!(fixed[(0, 1)], 2.0);
        assert_eq!(fixed[(2, 0)], 7.0);
    }
}
