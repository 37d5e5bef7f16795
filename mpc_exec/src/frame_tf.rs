//! # Frame transforms
//!
//! Conversion of points between the World frame (the simulator's map frame) and the vehicle Body
//! frame. The Body frame has its origin at the vehicle reference point with +X along the vehicle
//! heading.
//!
//! Transforms are always computed from the absolute world coordinates and the current pose, never
//! accumulated from a previous cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Point2, Rotation2, Vector2};
use serde::Serialize;

use comms_if::sim::Telemetry;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pose and speed of the vehicle in the World frame at the time of a telemetry message.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct VehiclePose {
    /// Position in the World frame
    pub position: Point2<f64>,

    /// Heading, the angle between World +X and Body +X.
    ///
    /// Units: radians
    pub psi_rad: f64,

    /// Forward speed
    pub speed: f64
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehiclePose {
    pub fn new(x: f64, y: f64, psi_rad: f64, speed: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            psi_rad,
            speed
        }
    }

    /// Transform a World frame point into the Body frame.
    ///
    /// ```text
    /// dx = wx - x, dy = wy - y
    /// bx =  dx cos(psi) + dy sin(psi)
    /// by = -dx sin(psi) + dy cos(psi)
    /// ```
    pub fn world_to_body(&self, point_w: &Point2<f64>) -> Point2<f64> {
        let dx = point_w.x - self.position.x;
        let dy = point_w.y - self.position.y;
        let (sin_psi, cos_psi) = self.psi_rad.sin_cos();

        Point2::new(
            dx * cos_psi + dy * sin_psi,
            -dx * sin_psi + dy * cos_psi
        )
    }

    /// Transform a Body frame point back into the World frame.
    pub fn body_to_world(&self, point_b: &Point2<f64>) -> Point2<f64> {
        self.position + Rotation2::new(self.psi_rad) * Vector2::new(point_b.x, point_b.y)
    }

    /// Transform parallel World frame coordinate arrays into Body frame points, preserving order.
    ///
    /// If the arrays differ in length the extra coordinates of the longer one are ignored.
    pub fn waypoints_to_body(&self, xs_w: &[f64], ys_w: &[f64]) -> Vec<Point2<f64>> {
        xs_w.iter()
            .zip(ys_w.iter())
            .map(|(x, y)| self.world_to_body(&Point2::new(*x, *y)))
            .collect()
    }
}

impl From<&Telemetry> for VehiclePose {
    fn from(t: &Telemetry) -> Self {
        Self::new(t.x, t.y, t.psi, t.speed)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
