//! # Kinematic bicycle model
//!
//! Discrete kinematic bicycle model shared by latency compensation and the optimizer's rollout, so
//! both predict the vehicle the same way.
//!
//! Sign convention: a positive steering demand gives a negative yaw rate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of elements in the controller state.
pub const NUM_STATES: usize = 6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State of the vehicle as seen by the optimizer, in the Body frame of the latest telemetry.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct ControllerState {
    /// Position along Body +X
    pub x: f64,

    /// Position along Body +Y
    pub y: f64,

    /// Heading relative to Body +X, radians
    pub psi: f64,

    /// Speed
    pub v: f64,

    /// Cross-track error
    pub cte: f64,

    /// Heading error, radians
    pub epsi: f64
}

/// Kinematic bicycle model parameterised by the front axle to CoG distance.
#[derive(Debug, Copy, Clone)]
pub struct KinematicBicycle {
    /// Distance between the front axle and the centre of gravity, meters
    pub lf_m: f64
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControllerState {
    /// State of a vehicle at the Body frame origin with the given speed and errors.
    pub fn at_origin(v: f64, cte: f64, epsi: f64) -> Self {
        Self { x: 0.0, y: 0.0, psi: 0.0, v, cte, epsi }
    }

    /// The state as the 6-element vector `[x, y, psi, v, cte, epsi]`.
    pub fn to_array(&self) -> [f64; NUM_STATES] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }

    pub fn from_array(a: &[f64; NUM_STATES]) -> Self {
        Self { x: a[0], y: a[1], psi: a[2], v: a[3], cte: a[4], epsi: a[5] }
    }
}

impl KinematicBicycle {
    pub fn new(lf_m: f64) -> Self {
        Self { lf_m }
    }

    /// Propagate the state by `dt_s` with the given steering and throttle held constant.
    ///
    /// ```text
    /// x'    = x + v cos(psi) dt
    /// y'    = y + v sin(psi) dt
    /// psi'  = psi - (v / Lf) steer dt
    /// v'    = v + throttle dt
    /// cte'  = cte + v sin(epsi) dt
    /// epsi' = epsi - v steer / Lf dt
    /// ```
    pub fn step(
        &self,
        state: &ControllerState,
        steer: f64,
        throttle: f64,
        dt_s: f64
    ) -> ControllerState {
        let v = state.v;

        ControllerState {
            x: state.x + v * state.psi.cos() * dt_s,
            y: state.y + v * state.psi.sin() * dt_s,
            psi: state.psi - v / self.lf_m * steer * dt_s,
            v: v + throttle * dt_s,
            cte: state.cte + v * state.epsi.sin() * dt_s,
            epsi: state.epsi - v * steer / self.lf_m * dt_s
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_array_layout() {
        let s = ControllerState { x: 1.0, y: 2.0, psi: 3.0, v: 4.0, cte: 5.0, epsi: 6.0 };

        assert_eq!(s.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(ControllerState::from_array(&s.to_array()), s);
    }

    #[test]
    fn test_positive_steer_turns_negative() {
        let model = KinematicBicycle::new(2.67);
        let s0 = ControllerState::at_origin(10.0, 0.0, 0.0);

        let s1 = model.step(&s0, 0.2, 0.0, 0.1);

        assert!(s1.psi < 0.0);
        assert!(s1.epsi < 0.0);
        assert_abs_diff_eq!(s1.psi, -10.0 / 2.67 * 0.2 * 0.1, epsilon = 1e-15);
        assert_abs_diff_eq!(s1.x, 1.0, epsilon = 1e-15);
        assert_eq!(s1.y, 0.0);
    }

    #[test]
    fn test_heading_moves_position() {
        let model = KinematicBicycle::new(2.67);
        let s0 = ControllerState {
            psi: std::f64::consts::FRAC_PI_2,
            ..ControllerState::at_origin(5.0, 0.0, 0.0)
        };

        let s1 = model.step(&s0, 0.0, 1.0, 0.5);

        assert_abs_diff_eq!(s1.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s1.y, 2.5, epsilon = 1e-12);
        assert_eq!(s1.v, 5.5);
    }
}
