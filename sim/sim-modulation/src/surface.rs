//! Closed-form surfaces that supply the proximity signal and frame.
//!
//! A modulator configured with [`SurfaceSource::Builtin`](crate::SurfaceSource)
//! evaluates one of these at the robot position each tick instead of
//! receiving frames from an external module.

use nalgebra::{Point3, Unit, Vector3};

use crate::{ModulationError, Result, SurfaceFrame};

/// A surface that can report Γ and the local frame at a position.
pub trait Surface {
    /// Proximity and frame at `position`.
    fn frame_at(&self, position: &Vector3<f64>) -> SurfaceFrame;
}

/// An infinite plane with a linear proximity ramp.
///
/// Γ is the signed height above the plane divided by the transition distance:
/// Γ = 1 one transition distance away, Γ = 0 on the plane and negative when
/// penetrating. The frame normal is the plane's outward normal, so motion
/// toward the plane has negative normal velocity.
///
/// # Example
///
/// ```
/// use sim_modulation::{PlanarSurface, Surface};
/// use nalgebra::{Point3, Vector3};
///
/// let table = PlanarSurface::new(Point3::origin(), Vector3::z(), Vector3::x(), 0.2).unwrap();
/// let frame = table.frame_at(&Vector3::new(0.3, -0.1, 0.1));
///
/// assert!((frame.proximity - 0.5).abs() < 1e-12);
/// assert_eq!(frame.normal, Vector3::z());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarSurface {
    origin: Point3<f64>,
    normal: Unit<Vector3<f64>>,
    tangent1: Unit<Vector3<f64>>,
    tangent2: Unit<Vector3<f64>>,
    transition_distance: f64,
}

impl PlanarSurface {
    /// Create a plane through `origin`.
    ///
    /// `tangent_hint` is projected onto the plane to orient the tangents; it
    /// must not be parallel to `normal`. `transition_distance` is the height at
    /// which Γ reaches 1 and must be positive.
    pub fn new(
        origin: Point3<f64>,
        normal: Vector3<f64>,
        tangent_hint: Vector3<f64>,
        transition_distance: f64,
    ) -> Result<Self> {
        if !transition_distance.is_finite() || transition_distance <= 0.0 {
            return Err(ModulationError::invalid_config(format!(
                "transition distance must be positive, got {transition_distance}"
            )));
        }

        let normal = Unit::try_new(normal, 1e-12)
            .ok_or_else(|| ModulationError::invalid_config("plane normal is zero"))?;
        let in_plane = tangent_hint - normal.into_inner() * normal.dot(&tangent_hint);
        let tangent1 = Unit::try_new(in_plane, 1e-12).ok_or_else(|| {
            ModulationError::invalid_config("tangent hint is parallel to the plane normal")
        })?;
        let tangent2 = Unit::new_normalize(normal.cross(tangent1.as_ref()));

        Ok(Self {
            origin,
            normal,
            tangent1,
            tangent2,
            transition_distance,
        })
    }

    /// Horizontal plane `z = height` with Γ = 1 at `transition_distance` above it.
    pub fn horizontal(height: f64, transition_distance: f64) -> Result<Self> {
        Self::new(
            Point3::new(0.0, 0.0, height),
            Vector3::z(),
            Vector3::x(),
            transition_distance,
        )
    }

    /// Signed distance of `position` above the plane (m).
    #[must_use]
    pub fn signed_distance(&self, position: &Vector3<f64>) -> f64 {
        self.normal.dot(&(position - self.origin.coords))
    }

    /// Outward unit normal.
    #[must_use]
    pub fn normal(&self) -> &Unit<Vector3<f64>> {
        &self.normal
    }

    /// Height at which Γ reaches 1.
    #[must_use]
    pub fn transition_distance(&self) -> f64 {
        self.transition_distance
    }
}

impl Surface for PlanarSurface {
    fn frame_at(&self, position: &Vector3<f64>) -> SurfaceFrame {
        SurfaceFrame::new(
            self.signed_distance(position) / self.transition_distance,
            self.normal.into_inner(),
            self.tangent1.into_inner(),
            self.tangent2.into_inner(),
        )
    }
}
