//! # MPC library.
//!
//! The telemetry to actuation pipeline of the MPC simulator bridge, usable by the executable and
//! by benchmarks.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuation encoder - converts solver output into the simulator's steering command
pub mod act_enc;

/// Kinematic bicycle model shared by latency compensation and the optimizer
pub mod bicycle;

/// Controller gateway - the contract with the trajectory optimizer
pub mod ctrl_gateway;

/// Frame transforms between the World and Body frames
pub mod frame_tf;

/// Latency compensation - projects the vehicle state over the actuation latency
pub mod lat_comp;

/// Model predictive controller, the trajectory optimizer
pub mod mpc;

/// MPC control module - runs one control cycle per telemetry message
pub mod mpc_ctrl;

/// Executable and vehicle parameters
pub mod params;

/// Reference curve fitting
pub mod ref_fit;

/// Simulator session - serves one simulator connection
pub mod sim_session;
