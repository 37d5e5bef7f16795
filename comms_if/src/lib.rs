//! # Communications interface crate.
//!
//! Provides the communications interfaces between the controller and the
//! driving simulator.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Simulator message definitions and framing
pub mod sim;

/// Network module
pub mod net;
