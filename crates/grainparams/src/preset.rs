use std::fs;
use std::path::Path;

use crate::{GrainParams, ParamsError};

/// Reads a TOML preset. Missing keys fall back to the defaults; unknown keys
/// are rejected so typos do not silently vanish.
pub fn load_preset(path: impl AsRef<Path>) -> Result<GrainParams, ParamsError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ParamsError::PresetRead {
        path: path.to_path_buf(),
        source,
    })?;
    let params: GrainParams = toml::from_str(&raw).map_err(|source| ParamsError::PresetParse {
        path: path.to_path_buf(),
        source,
    })?;
    params.validate()?;
    Ok(params)
}
