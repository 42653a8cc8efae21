use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::axis::Axis;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No armature found in scene")]
    NoArmature,

    #[error("More than one armature in scene and none of them is active: {}", candidates.join(", "))]
    AmbiguousArmature { candidates: Vec<String> },

    /// A channel group is keyed on some but not all of its components
    #[error("Incomplete key set in bone {bone} for action {action}: {channel} has {found} of {expected} channels. Ensure that if a bone is keyframed for a property, all channels are keyframed.")]
    IncompleteChannelSet {
        bone: String,
        action: String,
        channel: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Channels of {channel} in bone {bone} for action {action} have differing key counts")]
    MismatchedChannelKeys {
        bone: String,
        action: String,
        channel: &'static str,
    },

    #[error("Key {index} of {channel} in bone {bone} for action {action} is at frame {found}, expected frame {expected}; all channels of a bone must be keyed on the same frames")]
    MisalignedKeyframes {
        bone: String,
        action: String,
        channel: &'static str,
        index: usize,
        expected: f32,
        found: f32,
    },

    #[error("Working directory {0:?} doesn't exist or is not a directory")]
    MissingWorkingPath(PathBuf),

    #[error("{tool} path {path:?} is invalid")]
    InvalidExternalToolPath { tool: &'static str, path: PathBuf },

    #[error("Output path {0:?} must end with the .hkx extension")]
    InvalidOutputPath(PathBuf),

    #[error("Skeleton path {0:?} must point to a .hkx file")]
    InvalidSkeletonPath(PathBuf),

    #[error("Armature {0} has no action with keyframes")]
    NoActiveAction(String),

    #[error("Non-folder file {0:?} present in export folder")]
    BlockedProjectDirectory(PathBuf),

    #[error("Invalid bone orientation: forward axis {forward} and up axis {up} must be perpendicular")]
    InvalidAxisSettings { forward: Axis, up: Axis },

    #[error("{tool} exited with {status}")]
    ToolFailed { tool: &'static str, status: ExitStatus },

    #[error("{tool} did not finish within {timeout:?} and was killed")]
    ToolTimedOut { tool: &'static str, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid scene description: {0}")]
    Scene(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
