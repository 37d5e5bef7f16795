//! Parameter file loading
//!
//! Parameters are TOML files deserialised straight into the owning module's
//! parameter struct. Named files are looked up in `$MPC_SW_ROOT/params`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::host;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable ({}) is not set", host::SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot read the parameter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot parse the parameters: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Path of the parameters directory, `$MPC_SW_ROOT/params`.
pub fn params_dir() -> Result<PathBuf, LoadError> {
    host::get_mpc_sw_root()
        .map(|root| root.join("params"))
        .map_err(|_| LoadError::SwRootNotSet)
}

/// Load a parameter file by name from the parameters directory.
pub fn load<P>(param_file_name: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    load_from(params_dir()?.join(param_file_name))
}

/// Load a parameter file from any path.
pub fn load_from<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    let params_str = std::fs::read_to_string(path.as_ref())
        .map_err(|e| LoadError::FileLoadError(path.as_ref().to_path_buf(), e))?;

    from_toml_str(&params_str)
}

/// Parse a parameter struct from a TOML string.
pub fn from_toml_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}
