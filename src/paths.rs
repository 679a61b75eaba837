use std::path::PathBuf;

const APP_DIR: &str = "reels-guard";

pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("REELS_GUARD_HOME") {
        return PathBuf::from(dir);
    }

    match std::env::var_os("HOME") {
        Some(home) if cfg!(target_os = "macos") => PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join(APP_DIR),
        Some(home) => std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(home).join(".config"))
            .join(APP_DIR),
        None => PathBuf::from("."),
    }
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join("reels-guard.toml")
}
