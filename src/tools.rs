use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::error::{ExportError, Result};

pub const HKXCMD: &str = "hkxcmd";
pub const CONVERT_KF: &str = "convertKF";

/// Target of a packfile conversion: 32-bit for Skyrim LE, 64-bit for SSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Win32,
    Amd64,
}

impl Platform {
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Win32 => "-v:WIN32",
            Self::Amd64 => "-v:AMD64",
        }
    }
}

/// Spawns `command` and waits for it to exit, killing it once `timeout` elapses.
pub async fn run_tool(tool: &'static str, mut command: Command, timeout: Duration) -> Result<()> {
    log::debug!("Running {:?}", command.as_std());
    let mut child = command.kill_on_drop(true).spawn()?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status?;
            if status.success() {
                Ok(())
            } else {
                Err(ExportError::ToolFailed { tool, status })
            }
        }
        Err(_) => {
            child.kill().await?;
            Err(ExportError::ToolTimedOut { tool, timeout })
        }
    }
}

fn check_tool(tool: &'static str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ExportError::InvalidExternalToolPath {
            tool,
            path: path.to_path_buf(),
        })
    }
}

/// The two external converters the export chain hands its intermediate files to.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    hkxcmd: PathBuf,
    convert_kf: PathBuf,
    timeout: Duration,
}

impl ExternalTools {
    pub const fn new(hkxcmd: PathBuf, convert_kf: PathBuf, timeout: Duration) -> Self {
        Self {
            hkxcmd,
            convert_kf,
            timeout,
        }
    }

    pub fn check_hkxcmd(&self) -> Result<()> {
        check_tool(HKXCMD, &self.hkxcmd)
    }

    pub fn check_convert_kf(&self) -> Result<()> {
        check_tool(CONVERT_KF, &self.convert_kf)
    }

    /// `hkxcmd convert -v:<platform> <input> <output>`
    pub async fn convert_packfile(&self, input: &Path, output: &Path, platform: Platform) -> Result<()> {
        log::info!("Converting {:?} -> {:?} ({})", input, output, platform.flag());
        let mut command = Command::new(&self.hkxcmd);
        command.arg("convert").arg(platform.flag()).arg(input).arg(output);
        run_tool(HKXCMD, command, self.timeout).await
    }

    /// `convertKF <skeleton> <dump> <output>`
    pub async fn convert_keyframes(&self, skeleton: &Path, dump: &Path, output: &Path) -> Result<()> {
        log::info!("Converting {:?} -> {:?} with skeleton {:?}", dump, output, skeleton);
        let mut command = Command::new(&self.convert_kf);
        command.arg(skeleton).arg(dump).arg(output);
        run_tool(CONVERT_KF, command, self.timeout).await
    }
}
