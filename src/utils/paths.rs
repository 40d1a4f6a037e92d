use crate::error::{EngineError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "UNIPKG_CONFIG_DIR";

pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let proj = ProjectDirs::from("com", "unipkg", "unipkg").ok_or_else(|| {
        EngineError::ConfigError("Could not determine config directory".to_string())
    })?;
    Ok(proj.config_dir().to_path_buf())
}

pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("settings.json"))
}
