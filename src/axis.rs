use std::fmt;

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::Deserialize;

use crate::error::{ExportError, Result};

pub type Vec3 = Vector3<f32>;
pub type Rot3 = Rotation3<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    #[serde(rename = "-X")]
    NegX,
    #[serde(rename = "-Y")]
    NegY,
    #[serde(rename = "-Z")]
    NegZ,
}

impl Axis {
    pub fn vector(self) -> Vec3 {
        match self {
            Self::X => Vec3::x(),
            Self::Y => Vec3::y(),
            Self::Z => Vec3::z(),
            Self::NegX => -Vec3::x(),
            Self::NegY => -Vec3::y(),
            Self::NegZ => -Vec3::z(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
            Self::NegX => "-X",
            Self::NegY => "-Y",
            Self::NegZ => "-Z",
        })
    }
}

/// Remaps the armature's declared bone axes onto the target convention
/// (forward = +Y, up = +Z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCorrection {
    rotation: Rot3,
    inverse: Rot3,
}

impl AxisCorrection {
    pub fn new(forward: Axis, up: Axis) -> Result<Self> {
        let forward_vector = forward.vector();
        let up_vector = up.vector();
        if forward_vector.dot(&up_vector) != 0.0 {
            return Err(ExportError::InvalidAxisSettings { forward, up });
        }

        // both bases are right-handed, so source^T followed by target is a proper rotation
        let source = Matrix3::from_columns(&[forward_vector, up_vector, forward_vector.cross(&up_vector)]);
        let target = Matrix3::from_columns(&[Vec3::y(), Vec3::z(), Vec3::x()]);
        let rotation = Rot3::from_matrix_unchecked(target * source.transpose());

        Ok(Self {
            rotation,
            inverse: rotation.inverse(),
        })
    }

    pub const fn rotation(&self) -> &Rot3 {
        &self.rotation
    }

    pub const fn inverse(&self) -> &Rot3 {
        &self.inverse
    }
}
