use std::env;
use std::path::{Path, PathBuf};

use dirs::home_dir;

use super::consts::{DEFAULT_CACHE_SUBFOLDER, MUTKB_CACHE_ENV};

/// Get default cache folder from environment variable, if not available then use the home folder
///
/// # Returns
/// - path to cache folder
pub fn get_default_cache_folder() -> PathBuf {
    if let Ok(val) = env::var(MUTKB_CACHE_ENV) {
        PathBuf::from(val)
    } else {
        let home = env::var("HOME")
            .or_else(|_| {
                home_dir()
                    .map(|p| p.to_string_lossy().into_owned())
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| "/tmp".to_string());

        let mut path = PathBuf::from(home);
        path.push(DEFAULT_CACHE_SUBFOLDER);
        path
    }
}

/// Expand `~` and environment variables in a path. Unexpandable paths are
/// returned unchanged.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy().into_owned();
    let expanded = shellexpand::full(&raw)
        .unwrap_or_else(|_| raw.clone().into())
        .into_owned();
    PathBuf::from(expanded)
}
