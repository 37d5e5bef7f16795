//! # Actuation encoder
//!
//! Converts the interpreted optimizer output into the steering command sent to the simulator.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use nalgebra::Point2;

use crate::ctrl_gateway::SolverResult;
use comms_if::sim::SteerCmd;
use util::maths::clamp;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Encodes solver results into simulator commands.
#[derive(Debug, Copy, Clone)]
pub struct ActuationEncoder {
    /// Half range of the steering actuator, radians
    steer_limit_rad: f64
}

/// Result of encoding a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub cmd: SteerCmd,

    /// True if the normalised steering fell outside [-1, 1] and was clamped
    pub steering_limited: bool
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActuationEncoder {
    pub fn new(steer_limit_rad: f64) -> Self {
        Self { steer_limit_rad }
    }

    /// Build the steer command.
    ///
    /// - Steering is normalised by the actuator limit.
    /// - Throttle is passed through unchanged.
    /// - The predicted trajectory becomes the `mpc_x`/`mpc_y` line.
    /// - The Body frame waypoints, excluding the last one, become the `next_x`/`next_y` line.
    pub fn encode(&self, result: &SolverResult, waypoints_b: &[Point2<f64>]) -> Encoded {
        let steering = result.steer_raw_rad / self.steer_limit_rad;
        let steering_angle = clamp(steering, -1.0, 1.0);
        let steering_limited = steering_angle != steering;

        if steering_limited {
            warn!(
                "Normalised steering {:.04} outside [-1, 1], limited to {}",
                steering, steering_angle
            );
        }

        let (mpc_x, mpc_y) = unzip_points(&result.trajectory);
        let (next_x, next_y) =
            unzip_points(&waypoints_b[..waypoints_b.len().saturating_sub(1)]);

        Encoded {
            cmd: SteerCmd {
                steering_angle,
                throttle: result.throttle,
                mpc_x,
                mpc_y,
                next_x,
                next_y
            },
            steering_limited
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn unzip_points(points: &[Point2<f64>]) -> (Vec<f64>, Vec<f64>) {
    points.iter().map(|p| (p.x, p.y)).unzip()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
