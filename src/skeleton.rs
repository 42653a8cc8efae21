use std::collections::{HashMap, HashSet};

use nalgebra::{Matrix3, Rotation3, UnitQuaternion};

use crate::axis::{AxisCorrection, Vec3};
use crate::error::Result;
use crate::scene::{Armature, Bone, Mat4};

pub type Quat = UnitQuaternion<f32>;

/// Bones whose names start with this prefix are IK helpers.
pub const IK_BONE_PREFIX: &str = "IK_";

/// Skip predicate excluding IK helper bones when `skip_ik` is set.
pub fn skip_ik_bones(skip_ik: bool) -> impl Fn(&Bone) -> bool {
    move |bone| skip_ik && bone.name.starts_with(IK_BONE_PREFIX)
}

#[derive(Debug, Clone, Copy)]
pub struct FlatBone<'a> {
    pub bone: &'a Bone,
    /// Index of the parent in the flattened sequence, -1 for roots
    pub parent_index: i32,
}

/// Bones in parent-before-child order with integer parent references.
#[derive(Debug, Clone, Default)]
pub struct FlatSkeleton<'a> {
    bones: Vec<FlatBone<'a>>,
}

impl<'a> FlatSkeleton<'a> {
    /// Walks `bones` in declaration order, dropping every bone matched by `skip` along with
    /// all of its descendants.
    pub fn flatten(bones: &'a [Bone], skip: impl Fn(&Bone) -> bool) -> Self {
        let mut flattened: Vec<FlatBone<'a>> = Vec::with_capacity(bones.len());
        let mut indices: HashMap<&str, usize> = HashMap::with_capacity(bones.len());
        let mut excluded: HashSet<&str> = HashSet::new();

        for bone in bones {
            if skip(bone) {
                log::debug!("Skipping bone {}", bone.name);
                excluded.insert(&bone.name);
                continue;
            }

            let parent_index = match bone.parent.as_deref() {
                None => -1,
                Some(parent) => match indices.get(parent) {
                    Some(&index) => index as i32,
                    None if excluded.contains(parent) => {
                        log::debug!("Skipping bone {}: its parent {} was excluded", bone.name, parent);
                        excluded.insert(&bone.name);
                        continue;
                    }
                    None => {
                        log::warn!("Skipping bone {}: its parent {} is not declared before it", bone.name, parent);
                        excluded.insert(&bone.name);
                        continue;
                    }
                },
            };

            indices.insert(&bone.name, flattened.len());
            flattened.push(FlatBone { bone, parent_index });
        }

        Self { bones: flattened }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlatBone<'a>> {
        self.bones.iter()
    }

    pub fn parent_indices(&self) -> impl Iterator<Item = i32> + use<'_, 'a> {
        self.bones.iter().map(|flat| flat.parent_index)
    }
}

/// A bone's rest transform relative to its parent, in the target axis convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl BindTransform {
    /// Splits an affine matrix into scale, rotation and translation.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let translation = Vec3::new(matrix.m14, matrix.m24, matrix.m34);
        let linear: Matrix3<f32> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let scale = Vec3::new(linear.column(0).norm(), linear.column(1).norm(), linear.column(2).norm());

        let mut unscaled = linear;
        for (mut column, &length) in unscaled.column_iter_mut().zip(scale.iter()) {
            if length > 0.0 {
                column /= length;
            }
        }
        let rotation = Quat::from_rotation_matrix(&Rotation3::from_matrix(&unscaled));

        Self {
            translation,
            rotation,
            scale,
        }
    }
}

/// Computes bind transforms for the bones of one armature.
#[derive(Debug)]
pub struct BindPose<'a> {
    armature: &'a Armature,
    correction: AxisCorrection,
}

impl<'a> BindPose<'a> {
    pub fn new(armature: &'a Armature) -> Result<Self> {
        let correction = AxisCorrection::new(armature.axis_forward, armature.axis_up)?;
        Ok(Self { armature, correction })
    }

    pub const fn correction(&self) -> &AxisCorrection {
        &self.correction
    }

    fn bind_frame(&self, bone: &Bone) -> Mat4 {
        bone.rest.matrix() * self.correction.rotation().to_homogeneous()
    }

    pub fn bind_matrix(&self, bone: &Bone) -> Mat4 {
        let frame = self.bind_frame(bone);
        match bone.parent.as_deref().and_then(|parent| self.armature.bone(parent)) {
            Some(parent) => {
                let parent_inverse = self.bind_frame(parent).try_inverse().unwrap_or_default();
                parent_inverse * frame
            }
            None => frame,
        }
    }

    pub fn bind_transform(&self, bone: &Bone) -> BindTransform {
        BindTransform::from_matrix(&self.bind_matrix(bone))
    }
}
