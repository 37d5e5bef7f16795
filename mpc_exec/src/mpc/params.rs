//! Parameters structure for the MPC optimizer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the MPC optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpcParams {

    // ---- HORIZON ----

    /// Number of states in the prediction horizon, including the initial
    /// state. The optimizer chooses `n - 1` actuations.
    pub n: usize,

    /// Time between two states of the horizon.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Speed the optimizer tries to hold.
    pub ref_v: f64,

    // ---- COST WEIGHTS ----

    /// Weight on the squared cross-track error of each predicted state
    pub cte_weight: f64,

    /// Weight on the squared heading error of each predicted state
    pub epsi_weight: f64,

    /// Weight on the squared speed error of each predicted state
    pub v_weight: f64,

    /// Weight on the squared steering demand
    pub steer_weight: f64,

    /// Weight on the squared throttle demand
    pub throttle_weight: f64,

    /// Weight on the squared change in steering between steps
    pub steer_rate_weight: f64,

    /// Weight on the squared change in throttle between steps
    pub throttle_rate_weight: f64,

    // ---- ACTUATOR BOUNDS ----

    /// Lowest throttle demand (full braking)
    pub throttle_min: f64,

    /// Highest throttle demand
    pub throttle_max: f64,

    // ---- SOLVER ----

    /// Maximum number of descent iterations per solve
    pub max_iters: usize,

    /// Wall clock budget for a single solve.
    ///
    /// Units: seconds
    pub max_solve_time_s: f64,

    /// Step used for the finite difference gradient
    pub fd_step: f64,

    /// Line search step tried on the first iteration
    pub initial_step: f64,

    /// The descent stops when the line search step falls below this
    pub min_step: f64,

    /// The descent stops when no actuation changes by more than this
    pub tolerance: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MpcParams {
    fn default() -> Self {
        Self {
            n: 10,
            dt_s: 0.1,
            ref_v: 40.0,
            cte_weight: 2000.0,
            epsi_weight: 2000.0,
            v_weight: 1.0,
            steer_weight: 5.0,
            throttle_weight: 5.0,
            steer_rate_weight: 200.0,
            throttle_rate_weight: 10.0,
            throttle_min: -1.0,
            throttle_max: 1.0,
            max_iters: 200,
            max_solve_time_s: 0.05,
            fd_step: 1e-6,
            initial_step: 1e-4,
            min_step: 1e-12,
            tolerance: 1e-7
        }
    }
}
