use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::tools::ExternalTools;

pub const DEFAULT_CONFIG_FILE: &str = "hkx-export.toml";

fn default_hkxcmd() -> PathBuf {
    PathBuf::from("hkxcmd.exe")
}

fn default_convert_kf() -> PathBuf {
    PathBuf::from("convertKF.exe")
}

fn default_workdir() -> PathBuf {
    PathBuf::from("tmp")
}

const fn default_tool_timeout_secs() -> u64 {
    30
}

/// Tool locations and working directory, shared by every export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_hkxcmd")]
    pub hkxcmd: PathBuf,
    #[serde(default = "default_convert_kf")]
    pub convert_kf: PathBuf,
    /// Directory for intermediate XML and dump files
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            hkxcmd: default_hkxcmd(),
            convert_kf: default_convert_kf(),
            workdir: default_workdir(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl ExportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Loads `path` if given, otherwise the default config file if present, otherwise the
    /// built-in defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if !path.is_file() => bail!("Config file {:?} not found", path),
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(Path::new(DEFAULT_CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    pub const fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn tools(&self) -> ExternalTools {
        ExternalTools::new(self.hkxcmd.clone(), self.convert_kf.clone(), self.tool_timeout())
    }
}
