//! # MPC Executable Parameters
//!
//! This module provide parameters for the MPC executable and the vehicle it controls.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the executable itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecParams {

    /// Network endpoint the simulator connects to
    pub endpoint: String,

    /// Delay inserted between computing a command and sending it, emulating actuator lag when
    /// running against the simulator. Zero disables the delay.
    ///
    /// Units: seconds
    pub actuation_delay_s: f64,

    /// If true every control cycle is archived to the session directory
    pub archive_cycles: bool
}

/// Physical constants of the controlled vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleParams {

    /// Time between a command being computed and it taking effect on the vehicle.
    ///
    /// Units: seconds
    pub latency_s: f64,

    /// Distance between the front axle and the centre of gravity.
    ///
    /// Units: meters
    pub lf_m: f64,

    /// Half range of the steering actuator. Steering commands are normalised by this value.
    ///
    /// Units: radians
    pub steer_limit_rad: f64
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            endpoint: String::from("0.0.0.0:4567"),
            actuation_delay_s: 0.1,
            archive_cycles: false
        }
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            latency_s: 0.1,
            lf_m: 2.67,
            steer_limit_rad: util::maths::deg2rad(25.0)
        }
    }
}
