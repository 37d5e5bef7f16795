//! Session management
//!
//! A session is one run of an executable. It owns a timestamped directory
//!
//! ```text
//! <sessions_dir>/<exec_name>_<YYYYmmdd_HHMMSS>/
//!     <exec_name>.log
//!     arch/
//! ```
//!
//! and fixes the process wide epoch that log lines and archives are timed
//! against. Only one session can be started per process.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::{host, time};

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// chrono format of the timestamp in session directory names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the archive directory inside a session.
const ARCH_DIR_NAME: &str = "arch";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paths belonging to the running session.
#[derive(Clone, Debug)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable ({}) is not set", host::SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session under `$MPC_SW_ROOT/<sessions_dir>`.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let root = host::get_mpc_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        Self::start_in(root.join(sessions_dir), exec_name)
    }

    /// Start a new session under an explicit sessions directory.
    pub fn start_in<P: AsRef<Path>>(
        sessions_dir: P,
        exec_name: &str
    ) -> Result<Self, SessionError> {
        let epoch = Utc::now();
        SESSION_EPOCH.try_init_once(|| epoch)
            .map_err(SessionError::CannotInitEpoch)?;

        let session_root = sessions_dir.as_ref().join(format!(
            "{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT)
        ));
        let arch_root = session_root.join(ARCH_DIR_NAME);

        // Creates the session root too
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
            arch_root,
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds elapsed since the session started, or NaN before it has.
pub fn get_elapsed_seconds() -> f64 {
    SESSION_EPOCH.get()
        .and_then(|e| time::duration_to_seconds(Utc::now() - *e))
        .unwrap_or(std::f64::NAN)
}

/// Return a reference to the session's epoch.
///
/// # Panics
/// - If no session has been started.
pub fn get_epoch() -> &'static DateTime<Utc> {
    match SESSION_EPOCH.get() {
        Some(e) => e,
        None => panic!("Cannot get the session epoch, no session has been started"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        assert!(get_elapsed_seconds().is_nan());

        let dir = std::env::temp_dir()
            .join(format!("util_session_test_{}", std::process::id()));

        let session = Session::start_in(&dir, "test_exec").unwrap();

        assert!(session.session_root.starts_with(&dir));
        assert!(session.arch_root.is_dir());
        assert_eq!(session.log_file_path.file_name().unwrap(), "test_exec.log");

        let elapsed = get_elapsed_seconds();
        assert!(elapsed >= 0.0 && elapsed < 60.0);

        // Only one session per process
        assert!(matches!(
            Session::start_in(&dir, "test_exec"),
            Err(SessionError::CannotInitEpoch(_))
        ));

        fs::remove_dir_all(&dir).ok();
    }
}
