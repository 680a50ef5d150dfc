//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.conduit), falling back to a relative `.conduit`
/// when no home directory can be located
fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".conduit"))
        .unwrap_or_else(|| PathBuf::from(".conduit"))
}

/// Default config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
