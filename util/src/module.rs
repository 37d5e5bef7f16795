//! Cyclic module interface
//!
//! A module is set up once against the session, then called once per cycle
//! with that cycle's input. A cycle produces either an output and a status
//! report, or an error. Errors reject the cycle's input, degraded but usable
//! results are flagged in the status report instead.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::session::Session;

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// The module's internal state.
pub trait State {
    type InitData;
    type InitError;

    type InputData;
    type OutputData;
    /// Flags describing how the cycle went
    type StatusReport;
    type ProcError;

    /// Set the module up, e.g. open its archives in the session.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Run one cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
