//! Error types for modulation operations.

use thiserror::Error;

/// Errors that can occur while configuring or driving a [`Modulator`](crate::Modulator).
///
/// None of these are transient. Each one reflects a configuration defect or a
/// malformed upstream signal, and the modulator latches the first one it sees
/// (see [`ModulationError::Faulted`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModulationError {
    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A vector or matrix input has the wrong number of components.
    #[error("{input} has {actual} components, expected {expected}")]
    DimensionMismatch {
        /// Name of the offending input.
        input: &'static str,
        /// Expected component count.
        expected: usize,
        /// Actual component count.
        actual: usize,
    },

    /// The surface frame vectors are not near-orthogonal.
    #[error("surface frame is not orthogonal: residual {residual:e} exceeds {tolerance:e}")]
    NonOrthogonalFrame {
        /// `n·t1 + n·t2 + t1·t2` for the rejected frame.
        residual: f64,
        /// Allowed magnitude of the residual.
        tolerance: f64,
    },

    /// The proximity signal is `NaN`.
    #[error("invalid proximity: {value}")]
    InvalidProximity {
        /// The rejected proximity value.
        value: f64,
    },

    /// A matrix that must be inverted is singular.
    #[error("{input} is singular")]
    SingularMatrix {
        /// Name of the offending input.
        input: &'static str,
    },

    /// The built-in surface was used while the configuration selects an external one.
    #[error("built-in surface tracking requested but the surface source is external")]
    SurfaceSourceMismatch,

    /// Modulation was requested before both the frame and the state were supplied.
    #[error("modulation requested before inputs were set (frame: {frame_set}, state: {state_set})")]
    NotReady {
        /// Whether a surface frame has been accepted.
        frame_set: bool,
        /// Whether a robot state has been accepted.
        state_set: bool,
    },

    /// The modulation law produced `NaN` or `Inf`.
    #[error("non-finite modulation: {reason}")]
    NonFinite {
        /// Description of what went wrong.
        reason: String,
    },

    /// The modulator is latched in a fault state by an earlier error.
    #[error("modulator is faulted: {0}")]
    Faulted(Box<ModulationError>),
}

impl ModulationError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub const fn dimension(input: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            input,
            expected,
            actual,
        }
    }

    /// Create a non-finite modulation error.
    #[must_use]
    pub fn non_finite(reason: impl Into<String>) -> Self {
        Self::NonFinite {
            reason: reason.into(),
        }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error was caused by a malformed input.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::NonOrthogonalFrame { .. }
                | Self::InvalidProximity { .. }
                | Self::SingularMatrix { .. }
                | Self::SurfaceSourceMismatch
        )
    }

    /// Check if this is a missing-input precondition error.
    #[must_use]
    pub fn is_precondition_error(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// The error that originally faulted the modulator.
    ///
    /// Returns `self` for errors that are not [`ModulationError::Faulted`].
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Faulted(cause) => cause.root_cause(),
            other => other,
        }
    }
}
