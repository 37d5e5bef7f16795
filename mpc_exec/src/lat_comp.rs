//! # Latency compensation
//!
//! A command computed now only takes effect one actuation latency later. The state handed to the
//! optimizer is therefore the current state projected forward by that latency, with the actuation
//! the vehicle reported in the same telemetry message still applied.
//!
//! The projection starts from the Body frame origin (`x = y = psi = 0`) since the telemetry pose
//! defines the Body frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use serde::Serialize;

use crate::{
    bicycle::{ControllerState, KinematicBicycle},
    params::VehicleParams,
};
use comms_if::sim::Telemetry;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The actuation in effect on the vehicle, as reported by its telemetry.
///
/// This is the command the vehicle actually applied, which can differ from the last command the
/// optimizer produced.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct ActuationFeedback {
    pub steering: f64,

    pub throttle: f64
}

/// Forward projects the controller state over the actuation latency.
#[derive(Debug, Copy, Clone)]
pub struct LatencyCompensator {
    model: KinematicBicycle,

    latency_s: f64
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl From<&Telemetry> for ActuationFeedback {
    fn from(t: &Telemetry) -> Self {
        Self {
            steering: t.steering_angle,
            throttle: t.throttle
        }
    }
}

impl LatencyCompensator {
    pub fn new(params: &VehicleParams) -> Self {
        Self {
            model: KinematicBicycle::new(params.lf_m),
            latency_s: params.latency_s
        }
    }

    /// Project a vehicle at the Body frame origin, with speed `v` and the given errors, forward by
    /// one latency interval.
    pub fn project(
        &self,
        v: f64,
        cte: f64,
        epsi: f64,
        feedback: &ActuationFeedback
    ) -> ControllerState {
        let projected = self.model.step(
            &ControllerState::at_origin(v, cte, epsi),
            feedback.steering,
            feedback.throttle,
            self.latency_s
        );

        trace!("Latency projected state: {:?}", projected);

        projected
    }
}
