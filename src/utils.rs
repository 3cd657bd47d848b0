use crate::error::VapourcastError;
use crate::model::artifact::ARTIFACT_FILE_NAME;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the model artifact.
pub const MODEL_PATH_ENV: &str = "VAPOURCAST_MODEL";

const DATA_DIR_NAME: &str = "vapourcast";

pub fn get_data_dir() -> Result<PathBuf, VapourcastError> {
    dirs::data_dir()
        .ok_or(VapourcastError::DataDirResolution)
        .map(|p| p.join(DATA_DIR_NAME))
}

/// Where to load the model artifact from: the explicit path, else
/// `$VAPOURCAST_MODEL`, else `<data dir>/vapourcast/physics_informed_gbm.bin`.
pub fn resolve_model_path(explicit: Option<&Path>) -> Result<PathBuf, VapourcastError> {
    resolve_model_path_with(explicit, std::env::var_os(MODEL_PATH_ENV))
}

fn resolve_model_path_with(
    explicit: Option<&Path>,
    from_env: Option<OsString>,
) -> Result<PathBuf, VapourcastError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = from_env.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(get_data_dir()?.join(ARTIFACT_FILE_NAME))
}
