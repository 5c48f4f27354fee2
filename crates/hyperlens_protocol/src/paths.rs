use std::path::{Path, PathBuf};
use std::sync::Once;

static CREATE_DIR_WARNED: Once = Once::new();

/// Resolve the Hyperlens home directory.
///
/// Priority:
/// 1) HYPERLENS_HOME
/// 2) the user's home directory
/// 3) ./.hyperlens
pub fn hyperlens_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("HYPERLENS_HOME") {
        return PathBuf::from(override_path);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".hyperlens");
    }
    PathBuf::from(".").join(".hyperlens")
}

fn ensure_home_dir(home: &Path) {
    if let Err(err) = std::fs::create_dir_all(home) {
        CREATE_DIR_WARNED.call_once(|| {
            eprintln!(
                "Warning: failed to create Hyperlens home directory {}: {}. Set HYPERLENS_HOME.",
                home.display(),
                err
            );
        });
    }
}

/// Default config file: ~/.hyperlens/config.toml
pub fn default_config_path() -> PathBuf {
    hyperlens_home().join("config.toml")
}

/// Default logs directory: ~/.hyperlens/logs
pub fn default_logs_dir() -> PathBuf {
    let home = hyperlens_home();
    ensure_home_dir(&home);
    home.join("logs")
}

/// Default staging directory for uploads: ~/.hyperlens/uploads
pub fn default_staging_dir() -> PathBuf {
    let home = hyperlens_home();
    ensure_home_dir(&home);
    home.join("uploads")
}
