//! Main MPC executable entry point.
//!
//! # Architecture
//!
//! The executable binds a WebSocket server and waits for the driving simulator to connect. Every
//! connection is served on its own thread, with its own controller and optimizer:
//!
//!     - Initialise session, logging and parameters
//!     - Accept loop:
//!         - Accept a connection and perform the handshake
//!         - Spawn a session thread:
//!             - Receive a frame
//!             - Run the control cycle on telemetry
//!             - Delay by the actuation delay
//!             - Send the reply

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::{debug, error, info, warn};
use std::thread;
use structopt::StructOpt;

// Internal
use comms_if::net::{SimConnection, SimServer};
use mpc_lib::{
    mpc::{Mpc, MpcParams},
    mpc_ctrl::{InitData, MpcCtrl},
    params::{ExecParams, VehicleParams},
    sim_session::SimSession,
};
use util::{
    logger::{logger_init, LevelFilter},
    maths::rad2deg,
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "mpc_exec", about = "MPC controller for the driving simulator")]
struct Opt {
    /// Minimum log level, one of info, debug or trace
    #[structopt(long, default_value = "trace")]
    log_level: LevelFilter,

    /// Endpoint to listen on, overriding the parameter file
    #[structopt(long)]
    endpoint: Option<String>,

    /// Send commands as soon as they are computed
    #[structopt(long)]
    no_actuation_delay: bool,
}

/// Everything a session thread needs to build its own controller.
#[derive(Clone)]
struct SessionConfig {
    exec: ExecParams,
    vehicle: VehicleParams,
    mpc: MpcParams,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "mpc_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("MPC Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let mut exec: ExecParams = util::params::load("mpc_exec.toml")
        .wrap_err("Could not load exec params")?;
    let vehicle: VehicleParams = util::params::load("vehicle.toml")
        .wrap_err("Could not load vehicle params")?;
    let mpc: MpcParams = util::params::load("mpc.toml")
        .wrap_err("Could not load MPC params")?;

    if let Some(endpoint) = opt.endpoint {
        exec.endpoint = endpoint;
    }
    if opt.no_actuation_delay {
        exec.actuation_delay_s = 0.0;
    }

    // Validate before accepting any connection
    mpc.validate().wrap_err("Invalid MPC params")?;

    info!("Parameters loaded");
    debug!("Exec: {:?}", exec);
    debug!("Vehicle: {:?}", vehicle);
    info!("Steering limit: {:.1} deg", rad2deg(vehicle.steer_limit_rad));
    debug!("MPC: {:?}", mpc);

    if exec.actuation_delay_s > 0.0 {
        info!("Commands are delayed by {} s to emulate actuator lag", exec.actuation_delay_s);
    }
    else {
        info!("Actuation delay disabled");
    }

    // ---- INITIALISE NETWORK ----

    let server = SimServer::bind(&exec.endpoint)
        .wrap_err("Failed to initialise the SimServer")?;

    info!("Listening on {}\n", exec.endpoint);

    let config = SessionConfig { exec, vehicle, mpc };

    // ---- ACCEPT LOOP ----

    let mut num_conns: u64 = 0;

    loop {
        let conn = match server.accept() {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not accept a simulator connection: {}", e);
                continue;
            }
        };

        num_conns += 1;
        let peer = format!("sim{}@{}", num_conns, conn.peer_addr());
        info!("Simulator connected: {}", peer);

        let config = config.clone();
        let session = session.clone();
        let arch_path = format!("mpc_ctrl/cycles_{:04}.csv", num_conns);

        let spawned = thread::Builder::new()
            .name(peer.clone())
            .spawn(move || {
                if let Err(e) = run_session(conn, &peer, &config, &session, arch_path) {
                    error!("{}: session ended with an error: {:?}", peer, e);
                }
            });

        if let Err(e) = spawned {
            error!("Could not spawn a session thread: {}", e);
        }
    }
}

/// Serve a single simulator connection to completion.
fn run_session(
    mut conn: SimConnection,
    peer: &str,
    config: &SessionConfig,
    session: &Session,
    arch_path: String,
) -> Result<(), Report> {
    let mpc = Mpc::new(config.mpc.clone(), &config.vehicle)
        .wrap_err("Failed to initialise the MPC")?;

    let mut ctrl = MpcCtrl::new(&config.vehicle, mpc);
    ctrl.init(
        InitData {
            arch_path: if config.exec.archive_cycles { Some(arch_path) } else { None }
        },
        session
    ).wrap_err("Failed to initialise MpcCtrl")?;

    let mut sim_session = SimSession::new(ctrl, config.exec.actuation_delay_s, peer);

    let result = sim_session.run(&mut conn)
        .wrap_err("Session failed");

    conn.close();

    info!("Simulator disconnected: {}", peer);

    result
}
