use std::path::{Path, PathBuf};

/// XDG app name used for config and state directories.
pub const APP_NAME: &str = "sitewatch";

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const TARGETS_FILE_NAME: &str = "targets.json";
pub const SCREENSHOTS_DIR_NAME: &str = "screenshots";
pub const LOGS_DIR_NAME: &str = "logs";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// `~/.config/sitewatch`, or `None` when no home directory can be determined.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// State directory holding the target store, screenshots and logs.
///
/// `state_dir()` is Linux-only; other platforms use `data_local_dir()`.
/// Containers without HOME fall back to a directory under the temp dir.
pub fn state_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| {
            dirs.state_dir()
                .unwrap_or_else(|| dirs.data_local_dir())
                .to_path_buf()
        })
        .unwrap_or_else(state_dir_fallback)
}

pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_under(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
