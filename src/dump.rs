//! Keyframe text dump read by convertKF.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::animation::{AnimationDocument, BoneAnimation};

pub const DUMP_HEADER: &str =
    "[Begin] {Data Format = (Time, Location Keys [X Y Z], Rotation Keys 'Quaternions' [W X Y Z], Scale)}";
pub const DUMP_END: &str = "[End]";

/// Appends the record of one bone: name line, key count, then one line per key.
pub fn dump_bone_animation<W: Write>(f: &mut W, bone_name: &str, animation: &BoneAnimation, fps: f32) -> io::Result<()> {
    writeln!(f, "Bone_Name=['{bone_name}']")?;
    writeln!(f, "{}", animation.len())?;
    for key in animation.keys() {
        let t = key.translation;
        let r = key.rotation;
        writeln!(
            f,
            "{:10.6}    {:10.6} {:10.6} {:10.6}    {:10.6} {:10.6} {:10.6} {:10.6}    {:10.6}",
            key.frame / fps,
            t.x,
            t.y,
            t.z,
            r.w,
            r.i,
            r.j,
            r.k,
            key.scale,
        )?;
    }

    Ok(())
}

pub fn dump_animation_document<W: Write>(f: &mut W, document: &AnimationDocument) -> io::Result<()> {
    writeln!(f, "{DUMP_HEADER}")?;
    writeln!(f, "{:10.6}", document.duration)?;
    for animation in &document.bones {
        dump_bone_animation(f, &animation.bone, animation, document.fps)?;
    }
    write!(f, "{DUMP_END}")
}

pub fn write_dump_file(path: &Path, document: &AnimationDocument) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    dump_animation_document(&mut writer, document)?;
    writer.flush()
}
