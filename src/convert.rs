//! Export workflows: validate, write the intermediate files, then hand them to the external
//! converters.

use std::fs;
use std::path::{Path, PathBuf};

use crate::animation::AnimationDocument;
use crate::dump::write_dump_file;
use crate::error::{ExportError, Result};
use crate::packfile::{render_character, render_project, render_skeleton};
use crate::scene::{Armature, Scene};
use crate::skeleton::{skip_ik_bones, BindPose, FlatSkeleton};
use crate::tools::{ExternalTools, Platform};

pub const SKELETON_XML: &str = "skeleton.xml";
pub const CHARACTER_XML: &str = "character.xml";
pub const PROJECT_XML: &str = "project.xml";
pub const DUMP_FILE: &str = "dump.txt";

pub const PROJECT_DIRECTORIES: [&str; 4] = ["Animations", "Behaviors", "CharacterAssets", "Characters"];

fn has_hkx_extension(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension.eq_ignore_ascii_case("hkx"))
}

/// `skeleton.hkx` -> `skeleton_LE.hkx`
pub fn le_variant(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{stem}_LE.hkx"))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ExportError::InvalidOutputPath(path.to_path_buf()))
}

/// `skeleton.hkx` -> `skeleton.partial.hkx`
fn partial_variant(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{stem}.partial.hkx"))
}

#[derive(Debug, Default)]
struct StagedOutputs {
    // (partial, final)
    outputs: Vec<(PathBuf, PathBuf)>,
}

impl StagedOutputs {
    fn stage(&mut self, path: &Path) -> PathBuf {
        let partial = partial_variant(path);
        self.outputs.push((partial.clone(), path.to_path_buf()));
        partial
    }

    fn commit(mut self) -> Result<()> {
        while let Some((partial, path)) = self.outputs.first() {
            log::debug!("Moving {:?} -> {:?}", partial, path);
            fs::rename(partial, path)?;
            self.outputs.remove(0);
        }

        Ok(())
    }
}

impl Drop for StagedOutputs {
    fn drop(&mut self) {
        for (partial, _) in self.outputs.iter().filter(|(partial, _)| partial.exists()) {
            log::warn!("Export failed, removing {:?}", partial);
            if let Err(err) = fs::remove_file(partial) {
                log::warn!("Could not remove {:?}: {}", partial, err);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkeletonExport {
    pub output: PathBuf,
    pub platform: Platform,
    pub skip_ik: bool,
}

#[derive(Debug, Clone)]
pub struct AnimationExport {
    /// Skeleton `.hkx` the animation is bound to
    pub skeleton: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProjectExport {
    pub project: PathBuf,
    pub character_name: String,
    pub skeleton_name: String,
    /// Referenced by the character; not created
    pub behavior_name: String,
    pub platform: Platform,
    /// With SSE, also convert a 32-bit skeleton for use in animation export
    pub also_le_skeleton: bool,
    pub skip_ik: bool,
}

#[derive(Debug)]
pub struct Exporter {
    tools: ExternalTools,
    workdir: PathBuf,
    xml_only: bool,
}

impl Exporter {
    pub const fn new(tools: ExternalTools, workdir: PathBuf, xml_only: bool) -> Self {
        Self {
            tools,
            workdir,
            xml_only,
        }
    }

    fn check_workdir(&self) -> Result<()> {
        if self.workdir.is_dir() {
            Ok(())
        } else {
            Err(ExportError::MissingWorkingPath(self.workdir.clone()))
        }
    }

    fn write_skeleton_xml(&self, armature: &Armature, skeleton_name: &str, skip_ik: bool) -> Result<PathBuf> {
        let skeleton = FlatSkeleton::flatten(&armature.bones, skip_ik_bones(skip_ik));
        let bind_pose = BindPose::new(armature)?;
        let path = self.workdir.join(SKELETON_XML);
        fs::write(&path, render_skeleton(&skeleton, &bind_pose, skeleton_name))?;
        log::info!("Wrote skeleton with {} bones to {:?}", skeleton.len(), path);
        Ok(path)
    }

    pub async fn export_skeleton(&self, scene: &Scene, job: &SkeletonExport) -> Result<()> {
        if !has_hkx_extension(&job.output) {
            return Err(ExportError::InvalidOutputPath(job.output.clone()));
        }
        self.check_workdir()?;
        if !self.xml_only {
            self.tools.check_hkxcmd()?;
        }
        let armature = scene.armature()?;

        let skeleton_xml = self.write_skeleton_xml(armature, &file_name(&job.output)?, job.skip_ik)?;
        if self.xml_only {
            return Ok(());
        }

        let mut staged = StagedOutputs::default();
        let output = staged.stage(&job.output);
        self.tools.convert_packfile(&skeleton_xml, &output, job.platform).await?;
        staged.commit()?;

        log::info!("Exported skeleton {:?}", job.output);
        Ok(())
    }

    /// Writes the keyframe dump, converts it against the skeleton into a 32-bit animation
    /// (`<output>_LE.hkx`) and converts that to 64-bit at `job.output`.
    pub async fn export_animation(&self, scene: &Scene, job: &AnimationExport) -> Result<()> {
        if !has_hkx_extension(&job.skeleton) {
            return Err(ExportError::InvalidSkeletonPath(job.skeleton.clone()));
        }
        if !has_hkx_extension(&job.output) {
            return Err(ExportError::InvalidOutputPath(job.output.clone()));
        }
        if !self.xml_only {
            self.tools.check_hkxcmd()?;
            self.tools.check_convert_kf()?;
        }
        self.check_workdir()?;
        let armature = scene.armature()?;

        log::info!("Extracting f-curve animation keys");
        let document = AnimationDocument::build(armature, scene.frame_rate)?
            .ok_or_else(|| ExportError::NoActiveAction(armature.name.clone()))?;

        let dump = self.workdir.join(DUMP_FILE);
        write_dump_file(&dump, &document)?;
        log::info!("Created animation text file {:?} with {} bones", dump, document.bones.len());
        if self.xml_only {
            return Ok(());
        }

        let mut staged = StagedOutputs::default();
        let le_output = staged.stage(&le_variant(&job.output));
        self.tools.convert_keyframes(&job.skeleton, &dump, &le_output).await?;
        let output = staged.stage(&job.output);
        self.tools.convert_packfile(&le_output, &output, Platform::Amd64).await?;
        staged.commit()?;

        log::info!("Exported animation {:?}", job.output);
        Ok(())
    }

    pub async fn export_project(&self, scene: &Scene, job: &ProjectExport) -> Result<()> {
        if !has_hkx_extension(&job.project) {
            return Err(ExportError::InvalidOutputPath(job.project.clone()));
        }
        self.check_workdir()?;
        if !self.xml_only {
            self.tools.check_hkxcmd()?;
        }
        let base = match job.project.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !base.is_dir() {
            return Err(ExportError::MissingWorkingPath(base));
        }
        for directory in PROJECT_DIRECTORIES {
            let path = base.join(directory);
            if path.exists() && !path.is_dir() {
                return Err(ExportError::BlockedProjectDirectory(path));
            }
        }
        let armature = scene.armature()?;

        for directory in PROJECT_DIRECTORIES {
            let path = base.join(directory);
            if !path.exists() {
                log::debug!("Creating {:?}", path);
                fs::create_dir(&path)?;
            }
        }

        log::info!("Exporting project, skeleton and character to intermediate XML files");
        let skeleton_xml = self.write_skeleton_xml(armature, &job.skeleton_name, job.skip_ik)?;
        let character_xml = self.workdir.join(CHARACTER_XML);
        fs::write(&character_xml, render_character(&job.character_name, &job.skeleton_name, &job.behavior_name))?;
        let project_xml = self.workdir.join(PROJECT_XML);
        fs::write(&project_xml, render_project(&job.character_name))?;
        if self.xml_only {
            return Ok(());
        }

        let mut staged = StagedOutputs::default();
        let skeleton_path = base.join("CharacterAssets").join(&job.skeleton_name);
        let skeleton = staged.stage(&skeleton_path);
        self.tools.convert_packfile(&skeleton_xml, &skeleton, job.platform).await?;
        if job.platform == Platform::Amd64 && job.also_le_skeleton {
            log::info!("SSE selected but also exporting a LE skeleton to use for animation");
            let le_skeleton = staged.stage(&le_variant(&skeleton_path));
            self.tools.convert_packfile(&skeleton_xml, &le_skeleton, Platform::Win32).await?;
        }

        let character = staged.stage(&base.join("Characters").join(&job.character_name));
        self.tools.convert_packfile(&character_xml, &character, job.platform).await?;

        let project = staged.stage(&job.project);
        self.tools.convert_packfile(&project_xml, &project, job.platform).await?;
        staged.commit()?;

        log::info!("Exported project {:?}", job.project);
        Ok(())
    }
}
