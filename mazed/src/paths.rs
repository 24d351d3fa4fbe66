//! Cross-platform application paths

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// `None` when the platform has no notion of a per-user config directory.
    pub fn new() -> Option<Self> {
        let base = dirs::config_dir()?;
        Some(Self {
            config_dir: base.join("mazewalk"),
        })
    }

    /// Simulation config picked up when `--config` is not given.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}
