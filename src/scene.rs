use std::path::Path;

use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::axis::Axis;
use crate::error::{ExportError, Result};

pub type Mat4 = Matrix4<f32>;

const fn default_frame_rate() -> f32 {
    30.0
}

const fn default_axis_forward() -> Axis {
    Axis::X
}

const fn default_axis_up() -> Axis {
    Axis::Y
}

const fn identity_rotation() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

const fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    #[serde(default)]
    pub active_armature: Option<String>,
    #[serde(default)]
    pub armatures: Vec<Armature>,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// The armature to export: the only one, or the active one if there are several.
    pub fn armature(&self) -> Result<&Armature> {
        match self.armatures.as_slice() {
            [] => Err(ExportError::NoArmature),
            [armature] => Ok(armature),
            armatures => {
                let active = self
                    .active_armature
                    .as_deref()
                    .and_then(|name| armatures.iter().find(|armature| armature.name == name));
                match active {
                    Some(armature) => {
                        log::info!("More than one armature in scene, using the active armature {}", armature.name);
                        Ok(armature)
                    }
                    None => Err(ExportError::AmbiguousArmature {
                        candidates: armatures.iter().map(|armature| armature.name.clone()).collect(),
                    }),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Armature {
    pub name: String,
    #[serde(default = "default_axis_forward")]
    pub axis_forward: Axis,
    #[serde(default = "default_axis_up")]
    pub axis_up: Axis,
    #[serde(default)]
    pub bones: Vec<Bone>,
    #[serde(default)]
    pub action: Option<Action>,
}

impl Armature {
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|bone| bone.name == name)
    }

    /// The assigned action, if it has any keyed channels at all.
    pub fn active_action(&self) -> Option<&Action> {
        self.action.as_ref().filter(|action| !action.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub rest: RestTransform,
}

impl Bone {
    pub fn new(name: &str, parent: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            rest: RestTransform::default(),
        }
    }

    pub fn with_rest(mut self, rest: RestTransform) -> Self {
        self.rest = rest;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestTransform {
    #[serde(default)]
    pub translation: [f32; 3],
    /// `[w, x, y, z]`
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

impl RestTransform {
    pub fn matrix(&self) -> Mat4 {
        let [w, x, y, z] = self.rotation;
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
        Mat4::new_translation(&Vector3::from(self.translation))
            * rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&Vector3::from(self.scale))
    }
}

impl Default for RestTransform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: identity_rotation(),
            scale: unit_scale(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub name: String,
    pub frame_range: [f32; 2],
    #[serde(default)]
    pub groups: Vec<ChannelGroup>,
}

impl Action {
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|group| group.channels.is_empty())
    }

    pub fn group(&self, bone_name: &str) -> Option<&ChannelGroup> {
        self.groups.iter().find(|group| group.bone == bone_name)
    }

    pub fn duration(&self, fps: f32) -> f32 {
        (self.frame_range[1] - self.frame_range[0]) / fps
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelGroup {
    pub bone: String,
    #[serde(default)]
    pub channels: Vec<FCurve>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FCurve {
    pub data_path: String,
    #[serde(default)]
    pub index: usize,
    /// `[frame, value]` pairs in increasing frame order
    #[serde(default)]
    pub keyframes: Vec<[f32; 2]>,
}

impl FCurve {
    pub fn new(data_path: &str, index: usize, keyframes: Vec<[f32; 2]>) -> Self {
        Self {
            data_path: data_path.to_string(),
            index,
            keyframes,
        }
    }
}
