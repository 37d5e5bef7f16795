//! # Model predictive controller
//!
//! A trajectory optimizer implementing [`Optimizer`]. Over a horizon of `n` states spaced `dt_s`
//! apart it chooses `n - 1` steering and throttle demands minimising
//!
//! ```text
//! sum_t  w_cte  (f(x_t) - y_t)^2 + w_epsi (psi_t - atan f'(x_t))^2 + w_v (v_t - v_ref)^2
//!      + w_d d_t^2 + w_a a_t^2 + w_dd (d_t - d_t-1)^2 + w_da (a_t - a_t-1)^2
//! ```
//!
//! where the states are rolled out with the same [`KinematicBicycle`] used for latency
//! compensation. The problem is solved by projected gradient descent with central difference
//! gradients and a backtracking line search, cold started from zero actuation every cycle. The
//! descent is bounded by both an iteration count and a wall clock budget. When only the iteration
//! count binds the result is deterministic.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Instant;
use log::{debug, trace};
use nalgebra::DVector;

pub use params::*;
use crate::{
    bicycle::{ControllerState, KinematicBicycle, NUM_STATES},
    ctrl_gateway::{Optimizer, SolveError},
    params::VehicleParams,
    ref_fit::NUM_REF_CURVE_COEFFS,
};
use util::maths::{clamp, poly_deriv_val, poly_val};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Sufficient decrease constant of the line search.
const ARMIJO_C: f64 = 1e-4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The MPC optimizer.
pub struct Mpc {
    params: MpcParams,

    model: KinematicBicycle,

    steer_limit_rad: f64,

    last_stats: Option<SolveStats>
}

/// Statistics on the most recent solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveStats {
    /// Number of descent iterations performed
    pub iters: usize,

    /// Final value of the cost function
    pub cost: f64,

    /// Units: seconds
    pub solve_time_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MpcParamsError {
    #[error("The horizon must contain at least 2 states, found {0}")]
    HorizonTooShort(usize),

    #[error("{0} must be strictly positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Throttle bounds are inverted (min {0}, max {1})")]
    InvertedThrottleBounds(f64, f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MpcParams {
    /// Check the parameters describe a solvable problem.
    pub fn validate(&self) -> Result<(), MpcParamsError> {
        if self.n < 2 {
            return Err(MpcParamsError::HorizonTooShort(self.n));
        }

        for &(name, val) in &[
            ("dt_s", self.dt_s),
            ("fd_step", self.fd_step),
            ("initial_step", self.initial_step),
            ("max_iters", self.max_iters as f64)
        ] {
            if !(val > 0.0) {
                return Err(MpcParamsError::NotPositive(name, val));
            }
        }

        if self.throttle_min > self.throttle_max {
            return Err(MpcParamsError::InvertedThrottleBounds(
                self.throttle_min, self.throttle_max
            ));
        }

        Ok(())
    }
}

impl Mpc {
    pub fn new(params: MpcParams, vehicle: &VehicleParams) -> Result<Self, MpcParamsError> {
        params.validate()?;

        Ok(Self {
            params,
            model: KinematicBicycle::new(vehicle.lf_m),
            steer_limit_rad: vehicle.steer_limit_rad,
            last_stats: None
        })
    }

    pub fn params(&self) -> &MpcParams {
        &self.params
    }

    /// Statistics of the last successful solve.
    pub fn last_stats(&self) -> Option<SolveStats> {
        self.last_stats
    }

    /// Number of actuation steps in the horizon.
    fn num_steps(&self) -> usize {
        self.params.n - 1
    }

    /// Evaluate the cost of an actuation sequence.
    ///
    /// `u` holds the steering demands followed by the throttle demands.
    fn cost(
        &self,
        s0: &ControllerState,
        coeffs: &[f64; NUM_REF_CURVE_COEFFS],
        u: &DVector<f64>
    ) -> f64 {
        let p = &self.params;
        let m = self.num_steps();

        let mut s = *s0;
        let mut cost = 0.0;

        for t in 0..m {
            let steer = u[t];
            let throttle = u[m + t];

            cost += p.steer_weight * steer.powi(2) + p.throttle_weight * throttle.powi(2);

            if t > 0 {
                cost += p.steer_rate_weight * (steer - u[t - 1]).powi(2)
                    + p.throttle_rate_weight * (throttle - u[m + t - 1]).powi(2);
            }

            s = self.model.step(&s, steer, throttle, p.dt_s);

            let cte = poly_val(s.x, coeffs) - s.y;
            let epsi = s.psi - poly_deriv_val(s.x, coeffs).atan();

            cost += p.cte_weight * cte.powi(2)
                + p.epsi_weight * epsi.powi(2)
                + p.v_weight * (s.v - p.ref_v).powi(2);
        }

        cost
    }

    /// Central difference gradient of the cost.
    fn gradient(
        &self,
        s0: &ControllerState,
        coeffs: &[f64; NUM_REF_CURVE_COEFFS],
        u: &DVector<f64>
    ) -> DVector<f64> {
        let h = self.params.fd_step;
        let mut grad = DVector::zeros(u.len());
        let mut probe = u.clone();

        for i in 0..u.len() {
            probe[i] = u[i] + h;
            let up = self.cost(s0, coeffs, &probe);
            probe[i] = u[i] - h;
            let down = self.cost(s0, coeffs, &probe);
            probe[i] = u[i];

            grad[i] = (up - down) / (2.0 * h);
        }

        grad
    }

    /// Project an actuation sequence onto the actuator bounds.
    fn project(&self, u: &mut DVector<f64>) {
        let m = self.num_steps();

        for t in 0..m {
            u[t] = clamp(u[t], -self.steer_limit_rad, self.steer_limit_rad);
            u[m + t] = clamp(u[m + t], self.params.throttle_min, self.params.throttle_max);
        }
    }

    /// Build the output sequence `[d0, a0, x1, y1, ...]` for an actuation sequence.
    fn output(&self, s0: &ControllerState, u: &DVector<f64>) -> Vec<f64> {
        let m = self.num_steps();
        let mut out = Vec::with_capacity(2 + 2 * m);

        out.push(u[0]);
        out.push(u[m]);

        let mut s = *s0;
        for t in 0..m {
            s = self.model.step(&s, u[t], u[m + t], self.params.dt_s);
            out.push(s.x);
            out.push(s.y);
        }

        out
    }
}

impl Optimizer for Mpc {
    fn solve(
        &mut self,
        state: &[f64; NUM_STATES],
        coeffs: &[f64; NUM_REF_CURVE_COEFFS]
    ) -> Result<Vec<f64>, SolveError> {
        let start = Instant::now();

        if state.iter().chain(coeffs.iter()).any(|v| !v.is_finite()) {
            return Err(SolveError::NotConverged(String::from("non-finite problem data")));
        }

        let s0 = ControllerState::from_array(state);
        let mut u = DVector::zeros(2 * self.num_steps());
        let mut cost = self.cost(&s0, coeffs, &u);
        let mut step = self.params.initial_step;
        let mut iters = 0;

        while iters < self.params.max_iters {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed >= self.params.max_solve_time_s {
                if iters == 0 {
                    return Err(SolveError::Timeout(elapsed));
                }
                debug!("MPC solve time budget used after {} iterations", iters);
                break;
            }

            iters += 1;

            let grad = self.gradient(&s0, coeffs, &u);

            // Backtracking line search along the projected gradient
            let mut accepted = None;
            while step >= self.params.min_step {
                let mut cand = &u - &grad * step;
                self.project(&mut cand);

                let cand_cost = self.cost(&s0, coeffs, &cand);
                let decrease = grad.dot(&(&u - &cand));

                if cand_cost <= cost - ARMIJO_C * decrease {
                    accepted = Some((cand, cand_cost));
                    break;
                }

                step *= 0.5;
            }

            let (cand, cand_cost) = match accepted {
                Some(a) => a,
                None => break
            };

            let change = (&cand - &u).amax();
            u = cand;
            cost = cand_cost;
            step *= 2.0;

            if change < self.params.tolerance {
                break;
            }
        }

        if !cost.is_finite() {
            return Err(SolveError::NotConverged(format!(
                "cost is {} after {} iterations", cost, iters
            )));
        }

        let stats = SolveStats {
            iters,
            cost,
            solve_time_s: start.elapsed().as_secs_f64()
        };
        trace!("MPC solve: {:?}", stats);
        self.last_stats = Some(stats);

        Ok(self.output(&s0, &u))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// An MPC bound only by iterations.
    fn mpc() -> Mpc {
        let params = MpcParams {
            max_solve_time_s: 1e3,
            ..MpcParams::default()
        };
        Mpc::new(params, &VehicleParams::default()).unwrap()
    }

    fn state(v: f64) -> [f64; NUM_STATES] {
        ControllerState { x: v * 0.1, ..ControllerState::at_origin(v, 0.0, 0.0) }.to_array()
    }

    #[test]
    fn test_output_layout() {
        let mut mpc = mpc();
        let n = mpc.params().n;

        let out = mpc.solve(&state(20.0), &[0.0, 0.0, 0.005, 0.0]).unwrap();

        assert_eq!(out.len(), 2 + 2 * (n - 1));

        // Trajectory moves forward from the initial state
        let xs: Vec<f64> = out[2..].iter().step_by(2).cloned().collect();
        assert!(xs[0] > 2.0);
        assert!(xs.windows(2).all(|w| w[1] > w[0]));

        assert!(mpc.last_stats().unwrap().iters > 0);
    }

    #[test]
    fn test_straight_road_no_steering() {
        let out = mpc().solve(&state(20.0), &[0.0; 4]).unwrap();

        assert_abs_diff_eq!(out[0], 0.0, epsilon = 1e-9);
        for y in out[2..].iter().skip(1).step_by(2) {
            assert_abs_diff_eq!(*y, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_steers_towards_road() {
        let limit = VehicleParams::default().steer_limit_rad;

        // Road curving to the left, and road offset to the left, both need a left turn, which is
        // a negative steering demand
        for coeffs in &[[0.0, 0.0, 0.01, 0.0], [1.0, 0.0, 0.0, 0.0]] {
            let out = mpc().solve(&state(20.0), coeffs).unwrap();

            assert!(out[0] < 0.0, "steer {} for {:?}", out[0], coeffs);
            assert!(out[0] >= -limit);
            assert!(*out.last().unwrap() > 0.0);
        }

        // Mirrored road, mirrored demand
        let left = mpc().solve(&state(20.0), &[1.0, 0.0, 0.0, 0.0]).unwrap();
        let right = mpc().solve(&state(20.0), &[-1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_abs_diff_eq!(left[0], -right[0], epsilon = 1e-6);
    }

    #[test]
    fn test_respects_actuator_bounds() {
        let limit = VehicleParams::default().steer_limit_rad;

        let out = mpc().solve(&state(20.0), &[50.0, 0.0, 0.0, 0.0]).unwrap();

        assert!(out[0] >= -limit && out[0] <= limit);
        assert!(out[1] >= -1.0 && out[1] <= 1.0);
    }

    #[test]
    fn test_accelerates_towards_ref_speed() {
        let out = mpc().solve(&state(0.0), &[0.0; 4]).unwrap();
        assert!(out[1] > 0.0);

        let out = mpc().solve(&state(80.0), &[0.0; 4]).unwrap();
        assert!(out[1] < 0.0);
    }

    #[test]
    fn test_deterministic() {
        let coeffs = [0.3, -0.02, 0.004, -0.0001];

        let a = mpc().solve(&state(15.0), &coeffs).unwrap();
        let b = mpc().solve(&state(15.0), &coeffs).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_failures() {
        let mut mpc = Mpc::new(
            MpcParams { max_solve_time_s: 0.0, ..MpcParams::default() },
            &VehicleParams::default()
        ).unwrap();
        assert!(matches!(
            mpc.solve(&state(20.0), &[0.0; 4]),
            Err(SolveError::Timeout(_))
        ));

        let mut bad_state = state(20.0);
        bad_state[4] = std::f64::NAN;
        assert!(matches!(
            self::mpc().solve(&bad_state, &[0.0; 4]),
            Err(SolveError::NotConverged(_))
        ));
    }

    #[test]
    fn test_invalid_params() {
        let vp = VehicleParams::default();

        assert!(matches!(
            Mpc::new(MpcParams { n: 1, ..MpcParams::default() }, &vp),
            Err(MpcParamsError::HorizonTooShort(1))
        ));
        assert!(matches!(
            Mpc::new(MpcParams { dt_s: 0.0, ..MpcParams::default() }, &vp),
            Err(MpcParamsError::NotPositive("dt_s", _))
        ));
        assert!(matches!(
            Mpc::new(MpcParams { throttle_min: 1.0, throttle_max: 0.0, ..MpcParams::default() }, &vp),
            Err(MpcParamsError::InvertedThrottleBounds(_, _))
        ));
    }
}
