use nalgebra::{Quaternion, Rotation3};

use crate::axis::Vec3;
use crate::error::{ExportError, Result};
use crate::scene::{Action, Armature, Bone, FCurve};
use crate::skeleton::{BindPose, BindTransform, Quat};

type Rot3 = Rotation3<f32>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    pub frame: f32,
    pub value: T,
}

pub type Curve<T> = Vec<Keyframe<T>>;

fn constant_curve<T: Copy>(timeline: &[f32], value: T) -> Curve<T> {
    timeline.iter().map(|&frame| Keyframe { frame, value }).collect()
}

/// Keyed rotation of a bone; a bone is keyed either with quaternions or with Euler angles.
#[derive(Debug, Clone, PartialEq)]
pub enum RotationCurve {
    Quaternion(Curve<Quat>),
    /// XYZ Euler angles in radians
    Euler(Curve<Vec3>),
}

impl RotationCurve {
    pub fn len(&self) -> usize {
        match self {
            Self::Quaternion(curve) => curve.len(),
            Self::Euler(curve) => curve.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frames(&self) -> Vec<f32> {
        match self {
            Self::Quaternion(curve) => curve.iter().map(|key| key.frame).collect(),
            Self::Euler(curve) => curve.iter().map(|key| key.frame).collect(),
        }
    }

    pub fn quaternions(&self) -> Curve<Quat> {
        match self {
            Self::Quaternion(curve) => curve.clone(),
            Self::Euler(curve) => curve
                .iter()
                .map(|key| Keyframe {
                    frame: key.frame,
                    value: Quat::from_euler_angles(key.value.x, key.value.y, key.value.z),
                })
                .collect(),
        }
    }
}

/// One key of a bone animation with all channels sampled on the same frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationKey {
    pub frame: f32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneAnimation {
    pub bone: String,
    pub rotation: RotationCurve,
    pub translation: Curve<Vec3>,
    pub scale: Curve<f32>,
}

impl BoneAnimation {
    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }

    /// Pairs the channels up by position.
    pub fn keys(&self) -> impl Iterator<Item = AnimationKey> + use<'_> {
        self.rotation
            .quaternions()
            .into_iter()
            .zip(&self.translation)
            .zip(&self.scale)
            .map(|((rotation, translation), scale)| AnimationKey {
                frame: rotation.frame,
                translation: translation.value,
                rotation: rotation.value,
                scale: scale.value,
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationDocument {
    pub fps: f32,
    /// Length of the action's frame range in seconds
    pub duration: f32,
    pub bones: Vec<BoneAnimation>,
}

impl AnimationDocument {
    /// Builds animations for every keyed bone of the armature, in bone declaration order.
    /// Returns `None` if the armature has no non-empty action.
    pub fn build(armature: &Armature, fps: f32) -> Result<Option<Self>> {
        let Some(action) = armature.active_action() else {
            return Ok(None);
        };

        let bind_pose = BindPose::new(armature)?;
        let mut bones = Vec::new();
        for bone in &armature.bones {
            if let Some(animation) = build_bone_animation(&bind_pose, bone, Some(action))? {
                bones.push(animation);
            }
        }

        Ok(Some(Self {
            fps,
            duration: action.duration(fps),
            bones,
        }))
    }
}

/// Channel groups of one bone, split by data path.
#[derive(Debug, Default)]
struct BoneChannels<'a> {
    quaternion: Vec<&'a FCurve>,
    euler: Vec<&'a FCurve>,
    location: Vec<&'a FCurve>,
    scale: Vec<&'a FCurve>,
}

impl<'a> BoneChannels<'a> {
    fn collect(channels: &'a [FCurve]) -> Self {
        let mut grouped = Self::default();
        for channel in channels {
            let path = channel.data_path.as_str();
            let group = if path.ends_with("quaternion") {
                &mut grouped.quaternion
            } else if path.ends_with("euler") {
                &mut grouped.euler
            } else if path.ends_with("location") {
                &mut grouped.location
            } else if path.ends_with("scale") {
                &mut grouped.scale
            } else {
                log::debug!("Ignoring channel {}", channel.data_path);
                continue;
            };
            group.push(channel);
        }

        for group in [&mut grouped.quaternion, &mut grouped.euler, &mut grouped.location, &mut grouped.scale] {
            group.sort_by_key(|channel| channel.index);
        }

        grouped
    }
}

/// Reads a channel group as a sequence of `(frame, [component; N])` keys, taking the frame
/// from the first channel.
fn group_keys<const N: usize>(
    channels: &[&FCurve],
    bone: &Bone,
    action: &Action,
    channel: &'static str,
) -> Result<Vec<(f32, [f32; N])>> {
    if channels.is_empty() {
        return Ok(Vec::new());
    }
    if channels.len() != N {
        return Err(ExportError::IncompleteChannelSet {
            bone: bone.name.clone(),
            action: action.name.clone(),
            channel,
            found: channels.len(),
            expected: N,
        });
    }

    let num_keys = channels[0].keyframes.len();
    if channels.iter().any(|curve| curve.keyframes.len() != num_keys) {
        return Err(ExportError::MismatchedChannelKeys {
            bone: bone.name.clone(),
            action: action.name.clone(),
            channel,
        });
    }

    Ok((0..num_keys)
        .map(|i| {
            let frame = channels[0].keyframes[i][0];
            (frame, std::array::from_fn(|component| channels[component].keyframes[i][1]))
        })
        .collect())
}

/// Maps a keyed local rotation into the bind-relative target space.
fn export_rotation(bind: &BindTransform, bind_pose: &BindPose, key: &Rot3) -> Quat {
    let correction = bind_pose.correction();
    let corrected = correction.inverse() * key * correction.rotation();
    bind.rotation * Quat::from_rotation_matrix(&corrected)
}

fn export_translation(bind: &BindTransform, bind_pose: &BindPose, key: &Vec3) -> Vec3 {
    bind.rotation * (bind_pose.correction().inverse() * key) + bind.translation
}

fn check_alignment(timeline: &[f32], frames: &[f32], bone: &Bone, action: &Action, channel: &'static str) -> Result<()> {
    let misaligned = |index: usize, expected: f32, found: f32| ExportError::MisalignedKeyframes {
        bone: bone.name.clone(),
        action: action.name.clone(),
        channel,
        index,
        expected,
        found,
    };

    for (index, (&expected, &found)) in timeline.iter().zip(frames).enumerate() {
        if expected != found {
            return Err(misaligned(index, expected, found));
        }
    }

    if frames.len() != timeline.len() {
        let index = timeline.len().min(frames.len());
        let expected = timeline.get(index).copied().unwrap_or(f32::NAN);
        let found = frames.get(index).copied().unwrap_or(f32::NAN);
        return Err(misaligned(index, expected, found));
    }

    Ok(())
}

/// Gathers the keyed channels of `bone` from `action` and transforms them into the bone's
/// bind-relative space.
///
/// Returns `None` if there is no action or the bone is not keyed in it. A missing scale
/// channel (or one with a different key count than the rotation) is replaced by a constant
/// 1.0 curve. Only the first scale component is used.
pub fn build_bone_animation(bind_pose: &BindPose, bone: &Bone, action: Option<&Action>) -> Result<Option<BoneAnimation>> {
    let Some(action) = action.filter(|action| !action.is_empty()) else {
        return Ok(None);
    };
    let Some(group) = action.group(&bone.name) else {
        // bone isn't keyframed in this action
        return Ok(None);
    };

    let channels = BoneChannels::collect(&group.channels);
    let quaternion_keys = group_keys::<4>(&channels.quaternion, bone, action, "rotation_quaternion")?;
    let euler_keys = group_keys::<3>(&channels.euler, bone, action, "rotation_euler")?;
    let location_keys = group_keys::<3>(&channels.location, bone, action, "location")?;
    let scale_keys = group_keys::<3>(&channels.scale, bone, action, "scale")?;

    let bind = bind_pose.bind_transform(bone);

    let rotation = if !quaternion_keys.is_empty() {
        if !euler_keys.is_empty() {
            log::warn!("Bone {} is keyed with both quaternion and Euler rotations; using the quaternions", bone.name);
        }
        Some(RotationCurve::Quaternion(
            quaternion_keys
                .iter()
                .map(|&(frame, [w, x, y, z])| {
                    let key = Quat::from_quaternion(Quaternion::new(w, x, y, z));
                    Keyframe {
                        frame,
                        value: export_rotation(&bind, bind_pose, &key.to_rotation_matrix()),
                    }
                })
                .collect(),
        ))
    } else if !euler_keys.is_empty() {
        Some(RotationCurve::Euler(
            euler_keys
                .iter()
                .map(|&(frame, [x, y, z])| {
                    let key = Rot3::from_euler_angles(x, y, z);
                    let (x, y, z) = export_rotation(&bind, bind_pose, &key).euler_angles();
                    Keyframe {
                        frame,
                        value: Vec3::new(x, y, z),
                    }
                })
                .collect(),
        ))
    } else {
        None
    };

    let translation = (!location_keys.is_empty()).then(|| {
        location_keys
            .iter()
            .map(|&(frame, value)| Keyframe {
                frame,
                value: export_translation(&bind, bind_pose, &Vec3::from(value)),
            })
            .collect::<Curve<Vec3>>()
    });

    let timeline = match (&rotation, &translation) {
        (Some(rotation), _) => rotation.frames(),
        (None, Some(translation)) => translation.iter().map(|key| key.frame).collect(),
        (None, None) => {
            log::warn!("Bone {} has neither rotation nor location keys in action {}, skipping", bone.name, action.name);
            return Ok(None);
        }
    };

    let rotation = rotation.unwrap_or_else(|| {
        log::warn!("Bone {} has no rotation keys, using its bind rotation for all keyframes", bone.name);
        RotationCurve::Quaternion(constant_curve(&timeline, bind.rotation))
    });
    let translation = translation.unwrap_or_else(|| {
        log::warn!("Bone {} has no location keys, using its bind translation for all keyframes", bone.name);
        constant_curve(&timeline, bind.translation)
    });

    // just use the first scale curve and assume even scale over all curves
    let scale: Curve<f32> = if scale_keys.len() == timeline.len() {
        scale_keys
            .iter()
            .map(|&(frame, [x, _, _])| Keyframe { frame, value: x })
            .collect()
    } else {
        if scale_keys.is_empty() {
            log::warn!("Scale curve empty, assuming scale 1.0 for all keyframes for bone {}", bone.name);
        } else {
            log::warn!(
                "Scale curve of bone {} has {} keys but rotation has {}; discarding animated scale and assuming 1.0 for all keyframes",
                bone.name,
                scale_keys.len(),
                timeline.len(),
            );
        }
        constant_curve(&timeline, 1.0)
    };

    check_alignment(&timeline, &rotation.frames(), bone, action, "rotation")?;
    check_alignment(&timeline, &translation.iter().map(|key| key.frame).collect::<Vec<_>>(), bone, action, "location")?;
    check_alignment(&timeline, &scale.iter().map(|key| key.frame).collect::<Vec<_>>(), bone, action, "scale")?;

    Ok(Some(BoneAnimation {
        bone: bone.name.clone(),
        rotation,
        translation,
        scale,
    }))
}
