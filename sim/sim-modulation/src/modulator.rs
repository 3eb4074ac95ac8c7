//! The modulator: per-tick inputs and the phase-dependent modulation law.
//!
//! Each control tick the driver hands the modulator a surface frame and a
//! robot state, then asks for the modulation matrix `M`. The driver applies
//! `M` to its nominal dynamics itself.
//!
//! # Modulation Law
//!
//! With `Q = [n, t1, t2]` the frame basis, the modulator builds a diagonal
//! scaling `Λ` in surface coordinates and returns
//!
//! ```text
//! M = Q · Λ · Q⁻¹
//! ```
//!
//! Only the normal entry `λ = Λ₀₀` changes in the transition and contact
//! phases. Writing `v_n = nᵀ ẋ`, `f_n = nᵀ f_nominal`,
//! `w = nᵀ M_eff⁻¹ n` and `g = exp(−Γ/ε)`:
//!
//! ```text
//! FreeMotion   Λ   = (1 − exp(−(Γ − Γ_free))) · I
//! Overshoot    λ   = (v_i − v_n + g) / (Γ · f_n)
//! InEnvelope   λ   = −(F_d · w / f_n) · g
//! Departing    λ   = −100 · (F_d · w / f_n) · (v_n + g)
//! Contact      λ   = −F_d · w / f_n
//! ```
//!
//! `ε` is tiny, so `g` is a guard against an exact zero and vanishes for any
//! meaningful Γ. `f_n` is not guarded against zero; a non-finite result is
//! reported as [`ModulationError::NonFinite`].
//!
//! # Faults
//!
//! The first error any operation returns latches the modulator. From then on
//! every operation fails with [`ModulationError::Faulted`] until
//! [`Modulator::reset`] is called, so a stale or partial matrix can never
//! reach the caller after a violation.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use tracing::{debug, trace, warn};

use crate::frame::FrameBasis;
use crate::state::{cartesian_matrix, cartesian_vector};
use crate::surface::Surface;
use crate::{
    ContactPhase, ModulationError, ModulatorConfig, Result, RobotState, SurfaceFrame,
    SurfaceSource,
};

/// Keeps `exp(−Γ/ε)` from being exactly zero. Not a tuning parameter.
pub const PROXIMITY_EPSILON: f64 = 1e-19;

/// Gain on the normal correction while the robot moves away from the surface.
pub const DEPARTURE_GAIN: f64 = 100.0;

/// Result of one modulation computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulation {
    /// Modulation matrix in world coordinates.
    pub matrix: Matrix3<f64>,
    /// Diagonal of `Λ` in surface coordinates: normal, tangent1, tangent2.
    pub scales: Vector3<f64>,
    /// Branch of the law that produced the scales.
    pub phase: ContactPhase,
}

impl Modulation {
    /// Apply the modulation to a nominal dynamics vector.
    #[must_use]
    pub fn apply(&self, nominal: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * nominal
    }

    /// Scale along the surface normal.
    #[must_use]
    pub fn normal_scale(&self) -> f64 {
        self.scales.x
    }
}

/// Blends nominal motion into contact-force control near a surface.
///
/// # Example
///
/// ```
/// use sim_modulation::{ContactPhase, Modulator, ModulatorConfig, RobotState, SurfaceFrame};
/// use nalgebra::Vector3;
///
/// let config = ModulatorConfig::default()
///     .with_impact_velocity(-0.05)
///     .with_desired_contact_force(5.0)
///     .with_free_motion_threshold(0.3);
/// let mut modulator = Modulator::new(config).unwrap();
///
/// // Pressing into the surface with twice the nominal force along the normal.
/// modulator.update_frame(&SurfaceFrame::axis_aligned(-0.01)).unwrap();
/// modulator
///     .update_state(&RobotState::new(
///         Vector3::zeros(),
///         Vector3::zeros(),
///         Vector3::new(2.0, 0.0, 0.0),
///     ))
///     .unwrap();
///
/// let modulation = modulator.compute().unwrap();
/// assert_eq!(modulation.phase, ContactPhase::Contact);
/// assert!((modulation.normal_scale() + 2.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct Modulator {
    config: ModulatorConfig,

    frame: SurfaceFrame,
    basis: FrameBasis,
    state: RobotState,
    inverse_mass: Matrix3<f64>,

    modulation: Matrix3<f64>,
    velocity_in_frame: Vector3<f64>,

    frame_set: bool,
    state_set: bool,
    fault: Option<ModulationError>,
}

impl Modulator {
    /// Create a modulator from a validated configuration.
    pub fn new(config: ModulatorConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            warn!(%err, "rejected modulator configuration");
            return Err(err);
        }

        debug!(
            impact_velocity = config.impact_velocity,
            desired_contact_force = config.desired_contact_force,
            free_motion_threshold = config.free_motion_threshold,
            "modulator initialized"
        );

        Ok(Self {
            config,
            frame: SurfaceFrame::default(),
            basis: FrameBasis::default(),
            state: RobotState::default(),
            inverse_mass: Matrix3::identity(),
            modulation: Matrix3::zeros(),
            velocity_in_frame: Vector3::zeros(),
            frame_set: false,
            state_set: false,
            fault: None,
        })
    }

    /// Create a modulator from individual parameters.
    pub fn initialize(
        state_dimension: usize,
        impact_velocity: f64,
        desired_contact_force: f64,
        free_motion_threshold: f64,
        uses_builtin_surface: bool,
    ) -> Result<Self> {
        let source = if uses_builtin_surface {
            SurfaceSource::Builtin
        } else {
            SurfaceSource::External
        };
        Self::new(ModulatorConfig::new(
            state_dimension,
            impact_velocity,
            desired_contact_force,
            free_motion_threshold,
            source,
        ))
    }

    /// The configuration this modulator was built with.
    #[must_use]
    pub fn config(&self) -> &ModulatorConfig {
        &self.config
    }

    // --- Inputs ---

    /// Set the proximity and surface frame from dynamically sized vectors.
    ///
    /// Each vector must have exactly three components.
    pub fn set_frame(
        &mut self,
        proximity: f64,
        normal: &DVector<f64>,
        tangent1: &DVector<f64>,
        tangent2: &DVector<f64>,
    ) -> Result<()> {
        self.guard()?;
        let result = Self::frame_from_dynamic(proximity, normal, tangent1, tangent2)
            .and_then(|frame| self.accept_frame(frame));
        self.latch(result)
    }

    /// Set the proximity and surface frame.
    ///
    /// The frame must be near-orthogonal and invertible. The basis and its
    /// inverse are rebuilt here so that [`Modulator::compute`] does not invert.
    pub fn update_frame(&mut self, frame: &SurfaceFrame) -> Result<()> {
        self.guard()?;
        let result = self.accept_frame(*frame);
        self.latch(result)
    }

    /// Set the robot state from dynamically sized vectors.
    pub fn set_state(
        &mut self,
        position: &DVector<f64>,
        velocity: &DVector<f64>,
        nominal_force: &DVector<f64>,
    ) -> Result<()> {
        self.guard()?;
        let result = Self::state_from_dynamic(position, velocity, nominal_force)
            .map(|state| self.accept_state(state));
        self.latch(result)
    }

    /// Set the robot state.
    pub fn update_state(&mut self, state: &RobotState) -> Result<()> {
        self.guard()?;
        self.accept_state(*state);
        Ok(())
    }

    /// Set the Cartesian mass matrix from a dynamically sized matrix.
    ///
    /// The matrix must be 3×3 and invertible. Its inverse is stored.
    pub fn set_mass(&mut self, mass: &DMatrix<f64>) -> Result<()> {
        self.guard()?;
        let result = cartesian_matrix("mass matrix", mass)
            .and_then(|mass| self.accept_mass(&mass));
        self.latch(result)
    }

    /// Set the Cartesian mass matrix.
    pub fn update_mass(&mut self, mass: &Matrix3<f64>) -> Result<()> {
        self.guard()?;
        let result = self.accept_mass(mass);
        self.latch(result)
    }

    /// Set an already inverted Cartesian mass matrix.
    ///
    /// Every entry must be finite.
    pub fn set_inverse_mass(&mut self, inverse_mass: &Matrix3<f64>) -> Result<()> {
        self.guard()?;
        let result = if inverse_mass.iter().all(|v| v.is_finite()) {
            self.inverse_mass = *inverse_mass;
            Ok(())
        } else {
            Err(ModulationError::non_finite("inverse mass is not finite"))
        };
        self.latch(result)
    }

    /// Evaluate a built-in surface at the last received position and use it as the frame.
    ///
    /// Requires a [`SurfaceSource::Builtin`] configuration and a state.
    pub fn track_surface<S: Surface + ?Sized>(&mut self, surface: &S) -> Result<()> {
        self.guard()?;
        let result = if self.config.surface_source != SurfaceSource::Builtin {
            Err(ModulationError::SurfaceSourceMismatch)
        } else if !self.state_set {
            Err(self.not_ready())
        } else {
            let frame = surface.frame_at(&self.state.position);
            self.accept_frame(frame)
        };
        self.latch(result)
    }

    // --- Outputs ---

    /// Compute the modulation matrix from the latest inputs.
    pub fn compute_modulation(&mut self) -> Result<Matrix3<f64>> {
        self.compute().map(|modulation| modulation.matrix)
    }

    /// Compute the modulation together with the phase and surface-frame scales.
    pub fn compute(&mut self) -> Result<Modulation> {
        self.guard()?;
        let result = self.evaluate();
        self.latch(result)
    }

    /// Robot velocity in surface coordinates (`Qᵀ ẋ`).
    ///
    /// Computed fresh from the current frame and state. Zero before the first frame.
    #[must_use]
    pub fn normal_frame_velocity(&self) -> Vector3<f64> {
        self.basis.project(&self.state.velocity)
    }

    /// Surface-frame velocity stored by the last transition-phase computation.
    #[must_use]
    pub fn cached_frame_velocity(&self) -> Vector3<f64> {
        self.velocity_in_frame
    }

    /// The last modulation matrix produced, zero before the first computation.
    #[must_use]
    pub fn last_modulation(&self) -> &Matrix3<f64> {
        &self.modulation
    }

    /// The current frame basis and its inverse.
    #[must_use]
    pub fn basis(&self) -> &FrameBasis {
        &self.basis
    }

    /// The current effective inverse mass.
    #[must_use]
    pub fn inverse_mass(&self) -> &Matrix3<f64> {
        &self.inverse_mass
    }

    // --- Readiness and faults ---

    /// Whether both a frame and a state have been supplied.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.frame_set && self.state_set
    }

    /// Whether the modulator is latched in a fault state.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// The error that faulted the modulator, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&ModulationError> {
        self.fault.as_ref()
    }

    /// Return to the freshly initialized state, keeping the configuration.
    pub fn reset(&mut self) {
        if let Some(err) = self.fault.take() {
            debug!(%err, "clearing modulator fault");
        }
        self.frame = SurfaceFrame::default();
        self.basis = FrameBasis::default();
        self.state = RobotState::default();
        self.inverse_mass = Matrix3::identity();
        self.modulation = Matrix3::zeros();
        self.velocity_in_frame = Vector3::zeros();
        self.frame_set = false;
        self.state_set = false;
    }

    // --- Internals ---

    fn guard(&self) -> Result<()> {
        match &self.fault {
            Some(cause) => Err(ModulationError::Faulted(Box::new(cause.clone()))),
            None => Ok(()),
        }
    }

    fn latch<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(%err, "modulator faulted");
            self.fault = Some(err.clone());
        }
        result
    }

    fn not_ready(&self) -> ModulationError {
        ModulationError::NotReady {
            frame_set: self.frame_set,
            state_set: self.state_set,
        }
    }

    fn frame_from_dynamic(
        proximity: f64,
        normal: &DVector<f64>,
        tangent1: &DVector<f64>,
        tangent2: &DVector<f64>,
    ) -> Result<SurfaceFrame> {
        Ok(SurfaceFrame::new(
            proximity,
            cartesian_vector("normal", normal)?,
            cartesian_vector("tangent1", tangent1)?,
            cartesian_vector("tangent2", tangent2)?,
        ))
    }

    fn state_from_dynamic(
        position: &DVector<f64>,
        velocity: &DVector<f64>,
        nominal_force: &DVector<f64>,
    ) -> Result<RobotState> {
        Ok(RobotState::new(
            cartesian_vector("position", position)?,
            cartesian_vector("velocity", velocity)?,
            cartesian_vector("nominal force", nominal_force)?,
        ))
    }

    /// Validate and commit a frame. Nothing is stored unless every check passes.
    fn accept_frame(&mut self, frame: SurfaceFrame) -> Result<()> {
        if frame.proximity.is_nan() {
            return Err(ModulationError::InvalidProximity {
                value: frame.proximity,
            });
        }
        frame.check_orthogonality()?;
        let basis = FrameBasis::from_frame(&frame)?;

        trace!(proximity = frame.proximity, "surface frame accepted");
        self.frame = frame;
        self.basis = basis;
        self.frame_set = true;
        Ok(())
    }

    fn accept_state(&mut self, state: RobotState) {
        self.state = state;
        self.state_set = true;
    }

    fn accept_mass(&mut self, mass: &Matrix3<f64>) -> Result<()> {
        self.inverse_mass = mass.try_inverse().ok_or(ModulationError::SingularMatrix {
            input: "mass matrix",
        })?;
        Ok(())
    }

    fn evaluate(&mut self) -> Result<Modulation> {
        if !self.is_ready() {
            return Err(self.not_ready());
        }

        let velocity_in_frame = self.basis.project(&self.state.velocity);
        let normal_velocity = velocity_in_frame.x;
        let phase = ContactPhase::classify(self.frame.proximity, normal_velocity, &self.config);
        if phase.is_transition() {
            self.velocity_in_frame = velocity_in_frame;
        }

        let scales = if phase.keeps_tangents() {
            Vector3::new(self.normal_scale(phase, normal_velocity), 1.0, 1.0)
        } else {
            Vector3::repeat(self.free_motion_scale())
        };
        let matrix = self.basis.conjugate_diagonal(&scales);

        if !scales.iter().chain(matrix.iter()).all(|v| v.is_finite()) {
            return Err(ModulationError::non_finite(format!(
                "{phase} phase produced normal scale {} at proximity {}",
                scales.x, self.frame.proximity
            )));
        }

        debug!(
            %phase,
            proximity = self.frame.proximity,
            normal_scale = scales.x,
            "modulation computed"
        );

        self.modulation = matrix;
        Ok(Modulation {
            matrix,
            scales,
            phase,
        })
    }

    fn free_motion_scale(&self) -> f64 {
        1.0 - (-(self.frame.proximity - self.config.free_motion_threshold)).exp()
    }

    /// `λ` for the transition and contact phases.
    fn normal_scale(&self, phase: ContactPhase, normal_velocity: f64) -> f64 {
        let proximity = self.frame.proximity;
        let normal = &self.frame.normal;
        let normal_force = normal.dot(&self.state.nominal_force);
        let gate = (-proximity / PROXIMITY_EPSILON).exp();

        trace!(normal_velocity, normal_force, gate, "normal scale terms");

        match phase {
            ContactPhase::Overshoot => {
                (self.config.impact_velocity - normal_velocity + gate) / (proximity * normal_force)
            }
            ContactPhase::InEnvelope => -self.force_term(normal_force) * gate,
            ContactPhase::Departing => {
                -DEPARTURE_GAIN * self.force_term(normal_force) * (normal_velocity + gate)
            }
            ContactPhase::Contact => -self.force_term(normal_force),
            ContactPhase::FreeMotion => 1.0,
        }
    }

    /// `F_d · (nᵀ M⁻¹ n) / f_n`.
    fn force_term(&self, normal_force: f64) -> f64 {
        let normal = &self.frame.normal;
        let weight = normal.dot(&(self.inverse_mass * normal));
        self.config.desired_contact_force * weight / normal_force
    }
}
