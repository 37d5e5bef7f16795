//! MPC control module
//!
//! Runs one control cycle per telemetry message:
//!
//! - Transform the waypoints into the Body frame
//! - Fit the reference curve and derive the cross-track and heading errors
//! - Project the state forward over the actuation latency
//! - Solve for the actuation
//! - Encode the steering command
//!
//! A failed solve does not fail the cycle, the safe stop command is produced
//! instead and flagged in the status report.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use state::*;
use crate::ref_fit::{RefFitError, MIN_NUM_FIT_POINTS};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MpcCtrl processing.
#[derive(Debug, thiserror::Error)]
pub enum MpcCtrlError {
    #[error(
        "At least {} waypoints are required to control the vehicle, found {0}",
        MIN_NUM_FIT_POINTS
    )]
    InsufficientWaypoints(usize),

    #[error("Could not fit the reference curve: {0}")]
    RefFitFailed(RefFitError),
}

/// Possible errors that can occur during MpcCtrl initialisation.
#[derive(Debug, thiserror::Error)]
pub enum MpcCtrlInitError {
    #[error("Could not create the cycle archive: {0}")]
    ArchiveInitFailed(String),
}
