//! # Controller gateway
//!
//! The gateway owns the contract with the trajectory optimizer. The optimizer is a black box
//! behind the [`Optimizer`] trait: it takes the 6-element controller state and the 4 reference
//! curve coefficients and returns a flat sequence
//!
//! ```text
//! [steer_raw, throttle, x1, y1, x2, y2, ...]
//! ```
//!
//! where the pairs are the predicted trajectory in the Body frame. The gateway builds the inputs,
//! invokes the optimizer synchronously and checks the output before interpreting it. Output which
//! doesn't meet the contract is a [`GatewayError`], never passed on.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Instant;
use log::debug;
use nalgebra::Point2;

use crate::{
    bicycle::{ControllerState, NUM_STATES},
    ref_fit::{RefCurve, NUM_REF_CURVE_COEFFS},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of leading actuation values in the optimizer output.
pub const NUM_ACTUATIONS: usize = 2;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A trajectory optimizer.
pub trait Optimizer {
    /// Solve for the actuation and predicted trajectory.
    ///
    /// Must return within the control cycle.
    fn solve(
        &mut self,
        state: &[f64; NUM_STATES],
        coeffs: &[f64; NUM_REF_CURVE_COEFFS]
    ) -> Result<Vec<f64>, SolveError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Interpreted output of the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    /// Steering demand in actuator radians
    pub steer_raw_rad: f64,

    /// Throttle demand
    pub throttle: f64,

    /// Predicted trajectory in the Body frame
    pub trajectory: Vec<Point2<f64>>
}

/// Gateway to an optimizer.
pub struct CtrlGateway<O: Optimizer> {
    optimizer: O
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Failures reported by an optimizer.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("The optimizer did not converge: {0}")]
    NotConverged(String),

    #[error("The optimizer ran out of time ({0:.06} s) before finding a solution")]
    Timeout(f64)
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Solve failed: {0}")]
    SolveFailed(SolveError),

    #[error("Expected at least {} output values from the optimizer, found {0}", NUM_ACTUATIONS)]
    MissingActuation(usize),

    #[error("The optimizer trajectory has an odd number of values ({0})")]
    OddTrajectory(usize),

    #[error("The optimizer output contains a non-finite value at index {0}")]
    NonFinite(usize)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<O: Optimizer> CtrlGateway<O> {
    pub fn new(optimizer: O) -> Self {
        Self { optimizer }
    }

    /// Access the wrapped optimizer.
    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Run the optimizer for the given state and reference curve.
    pub fn solve(
        &mut self,
        state: &ControllerState,
        curve: &RefCurve
    ) -> Result<SolverResult, GatewayError> {
        let start = Instant::now();

        let output = self.optimizer.solve(&state.to_array(), &curve.coeffs)
            .map_err(GatewayError::SolveFailed)?;

        debug!(
            "Optimizer returned {} values in {:.06} s",
            output.len(),
            start.elapsed().as_secs_f64()
        );

        SolverResult::from_output(&output)
    }
}

impl SolverResult {
    /// Interpret a raw optimizer output sequence.
    pub fn from_output(output: &[f64]) -> Result<Self, GatewayError> {
        if output.len() < NUM_ACTUATIONS {
            return Err(GatewayError::MissingActuation(output.len()));
        }

        let traj = &output[NUM_ACTUATIONS..];
        if traj.len() % 2 != 0 {
            return Err(GatewayError::OddTrajectory(traj.len()));
        }

        if let Some(i) = output.iter().position(|v| !v.is_finite()) {
            return Err(GatewayError::NonFinite(i));
        }

        Ok(Self {
            steer_raw_rad: output[0],
            throttle: output[1],
            trajectory: traj.chunks(2)
                .map(|p| Point2::new(p[0], p[1]))
                .collect()
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
