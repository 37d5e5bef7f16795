//! Implementations for the MpcCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::{MpcCtrlError, MpcCtrlInitError};
use crate::{
    act_enc::ActuationEncoder,
    bicycle::ControllerState,
    ctrl_gateway::{CtrlGateway, Optimizer},
    frame_tf::VehiclePose,
    lat_comp::{ActuationFeedback, LatencyCompensator},
    params::VehicleParams,
    ref_fit::{RefCurve, MIN_NUM_FIT_POINTS},
};
use comms_if::sim::{SteerCmd, Telemetry};
use util::{
    module::State,
    archive::{Archived, Archiver},
    session::{self, Session}};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// MPC control module state.
pub struct MpcCtrl<O: Optimizer> {
    compensator: LatencyCompensator,
    gateway: CtrlGateway<O>,
    encoder: ActuationEncoder,

    pub(crate) report: StatusReport,

    pub(crate) last_cycle: Option<CycleRecord>,
    arch_cycles: Option<Archiver>
}

/// Data required to initialise MpcCtrl.
#[derive(Debug, Clone, Default)]
pub struct InitData {
    /// Path of the cycle archive relative to the session archive root, or
    /// `None` to disable archiving.
    pub arch_path: Option<String>
}

/// Status report for MpcCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct StatusReport {
    /// The solve failed and the safe stop command was produced
    pub solver_fallback: bool,

    /// The normalised steering demand was outside [-1, 1] and was limited
    pub steering_limited: bool
}

/// A single control cycle, flattened for archiving.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct CycleRecord {
    pub time_s: f64,

    // ---- LATENCY PROJECTED STATE ----
    pub x: f64,
    pub y: f64,
    pub psi: f64,
    pub v: f64,
    pub cte: f64,
    pub epsi: f64,

    // ---- REFERENCE CURVE ----
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,

    // ---- COMMAND ----
    pub steering_angle: f64,
    pub throttle: f64,

    pub solver_fallback: bool,
    pub steering_limited: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<O: Optimizer> MpcCtrl<O> {
    /// Create a new controller for a vehicle, solving with the given
    /// optimizer.
    pub fn new(vehicle: &VehicleParams, optimizer: O) -> Self {
        Self {
            compensator: LatencyCompensator::new(vehicle),
            gateway: CtrlGateway::new(optimizer),
            encoder: ActuationEncoder::new(vehicle.steer_limit_rad),
            report: StatusReport::default(),
            last_cycle: None,
            arch_cycles: None
        }
    }

    pub fn optimizer(&self) -> &O {
        self.gateway.optimizer()
    }

    /// The most recently completed cycle.
    pub fn last_cycle(&self) -> Option<&CycleRecord> {
        self.last_cycle.as_ref()
    }
}

impl<O: Optimizer> State for MpcCtrl<O> {
    type InitData = InitData;
    type InitError = MpcCtrlInitError;

    type InputData = Telemetry;
    type OutputData = SteerCmd;
    type StatusReport = StatusReport;
    type ProcError = MpcCtrlError;

    /// Initialise the MpcCtrl module.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        if let Some(path) = init_data.arch_path {
            self.arch_cycles = Some(
                Archiver::from_path(session, &path)
                    .map_err(|e| MpcCtrlInitError::ArchiveInitFailed(e.to_string()))?
            );
        }

        Ok(())
    }

    /// Run one control cycle on a telemetry message.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        let num_waypoints = input_data.ptsx.len().min(input_data.ptsy.len());
        if num_waypoints < MIN_NUM_FIT_POINTS {
            return Err(MpcCtrlError::InsufficientWaypoints(num_waypoints));
        }

        // ---- FRAME TRANSFORM ----

        let pose = VehiclePose::from(input_data);
        let waypoints_b = pose.waypoints_to_body(&input_data.ptsx, &input_data.ptsy);

        // ---- REFERENCE FIT ----

        let curve = RefCurve::fit(&waypoints_b)
            .map_err(MpcCtrlError::RefFitFailed)?;

        // ---- LATENCY COMPENSATION ----

        let state = self.compensator.project(
            pose.speed,
            curve.cte(),
            curve.epsi(),
            &ActuationFeedback::from(input_data)
        );

        // ---- SOLVE AND ENCODE ----

        let cmd = match self.gateway.solve(&state, &curve) {
            Ok(result) => {
                let encoded = self.encoder.encode(&result, &waypoints_b);
                self.report.steering_limited = encoded.steering_limited;
                encoded.cmd
            },
            Err(e) => {
                warn!("Solve failed, commanding safe stop: {}", e);
                self.report.solver_fallback = true;
                SteerCmd::safe_stop()
            }
        };

        trace!(
            "MpcCtrl output: steering {:.04}, throttle {:.04}",
            cmd.steering_angle, cmd.throttle
        );

        self.last_cycle = Some(CycleRecord::new(&state, &curve, &cmd, &self.report));

        Ok((cmd, self.report))
    }
}

impl<O: Optimizer> Archived for MpcCtrl<O> {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let (Some(arch), Some(record)) = (self.arch_cycles.as_mut(), self.last_cycle) {
            arch.serialise(record)?;
        }

        Ok(())
    }
}

impl CycleRecord {
    fn new(
        state: &ControllerState,
        curve: &RefCurve,
        cmd: &SteerCmd,
        report: &StatusReport
    ) -> Self {
        Self {
            time_s: session::get_elapsed_seconds(),
            x: state.x,
            y: state.y,
            psi: state.psi,
            v: state.v,
            cte: state.cte,
            epsi: state.epsi,
            c0: curve.coeffs[0],
            c1: curve.coeffs[1],
            c2: curve.coeffs[2],
            c3: curve.coeffs[3],
            steering_angle: cmd.steering_angle,
            throttle: cmd.throttle,
            solver_fallback: report.solver_fallback,
            steering_limited: report.steering_limited
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
