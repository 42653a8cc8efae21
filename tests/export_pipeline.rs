use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pretty_assertions::assert_eq;

use hkx_rig_export::convert::{
    AnimationExport, Exporter, ProjectExport, SkeletonExport, CHARACTER_XML, DUMP_FILE, PROJECT_DIRECTORIES,
    PROJECT_XML, SKELETON_XML,
};
use hkx_rig_export::dump::{DUMP_END, DUMP_HEADER};
use hkx_rig_export::error::ExportError;
use hkx_rig_export::scene::Scene;
use hkx_rig_export::tools::{ExternalTools, Platform};

const SCENE: &str = r#"
frame_rate = 10.0

[[armatures]]
name = "Hero"
axis_forward = "Y"
axis_up = "Z"

[[armatures.bones]]
name = "Root"

[[armatures.bones]]
name = "Spine"
parent = "Root"
rest = { translation = [0.0, 0.0, 1.0] }

[[armatures.bones]]
name = "IK_Foot"
parent = "Root"

[[armatures.bones]]
name = "Toe"
parent = "IK_Foot"

[armatures.action]
name = "Idle"
frame_range = [0.0, 5.0]

[[armatures.action.groups]]
bone = "Spine"
channels = [
    { data_path = 'pose.bones["Spine"].rotation_quaternion', index = 0, keyframes = [[0.0, 1.0], [5.0, 1.0]] },
    { data_path = 'pose.bones["Spine"].rotation_quaternion', index = 1, keyframes = [[0.0, 0.0], [5.0, 0.0]] },
    { data_path = 'pose.bones["Spine"].rotation_quaternion', index = 2, keyframes = [[0.0, 0.0], [5.0, 0.0]] },
    { data_path = 'pose.bones["Spine"].rotation_quaternion', index = 3, keyframes = [[0.0, 0.0], [5.0, 0.0]] },
    { data_path = 'pose.bones["Spine"].location', index = 0, keyframes = [[0.0, 0.0], [5.0, 0.0]] },
    { data_path = 'pose.bones["Spine"].location', index = 1, keyframes = [[0.0, 0.0], [5.0, 0.5]] },
    { data_path = 'pose.bones["Spine"].location', index = 2, keyframes = [[0.0, 0.0], [5.0, 0.0]] },
]
"#;

fn missing_tools() -> ExternalTools {
    ExternalTools::new(
        PathBuf::from("/nonexistent/hkxcmd.exe"),
        PathBuf::from("/nonexistent/convertKF.exe"),
        Duration::from_secs(5),
    )
}

fn xml_exporter(workdir: &Path) -> Exporter {
    Exporter::new(missing_tools(), workdir.to_path_buf(), true)
}

fn skeleton_job(output: PathBuf) -> SkeletonExport {
    SkeletonExport {
        output,
        platform: Platform::Amd64,
        skip_ik: true,
    }
}

fn project_job(project: PathBuf) -> ProjectExport {
    ProjectExport {
        project,
        character_name: "hero.hkx".to_string(),
        skeleton_name: "skeleton.hkx".to_string(),
        behavior_name: "behavior.hkx".to_string(),
        platform: Platform::Amd64,
        also_le_skeleton: true,
        skip_ik: true,
    }
}

#[tokio::test]
async fn skeleton_xml_skips_ik_chain() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();

    xml_exporter(dir.path())
        .export_skeleton(&scene, &skeleton_job(dir.path().join("skeleton.hkx")))
        .await
        .unwrap();

    let xml = fs::read_to_string(dir.path().join(SKELETON_XML)).unwrap();
    assert!(xml.contains("<hkparam name=\"name\">skeleton</hkparam>"));
    assert!(xml.contains("<hkparam name=\"parentIndices\" numelements=\"2\">\n"));
    assert!(xml.contains("-1 0\n"));
    assert!(xml.contains("<hkparam name=\"name\">Spine</hkparam>"));
    assert!(!xml.contains("IK_Foot"));
    assert!(!xml.contains("Toe"));
    assert!(xml.ends_with("</hkpackfile>\n"));
    assert!(!dir.path().join("skeleton.hkx").exists());
}

#[tokio::test]
async fn skeleton_keeps_ik_bones_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();
    let mut job = skeleton_job(dir.path().join("skeleton.hkx"));
    job.skip_ik = false;

    xml_exporter(dir.path()).export_skeleton(&scene, &job).await.unwrap();

    let xml = fs::read_to_string(dir.path().join(SKELETON_XML)).unwrap();
    assert!(xml.contains("-1 0 0 2\n"));
    assert!(xml.contains("IK_Foot"));
}

#[tokio::test]
async fn animation_dump_contains_keyed_bones_only() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();
    let job = AnimationExport {
        skeleton: dir.path().join("skeleton_LE.hkx"),
        output: dir.path().join("idle.hkx"),
    };

    xml_exporter(dir.path()).export_animation(&scene, &job).await.unwrap();

    let dump = fs::read_to_string(dir.path().join(DUMP_FILE)).unwrap();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines[0], DUMP_HEADER);
    assert_eq!(lines[1], "  0.500000");
    assert_eq!(lines[2], "Bone_Name=['Spine']");
    assert_eq!(lines[3], "2");
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[6], DUMP_END);
    assert!(!dump.ends_with('\n'));
    assert!(!dump.contains("Root"));
}

#[tokio::test]
async fn animation_without_action_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE.split("[armatures.action]").next().unwrap()).unwrap();
    let job = AnimationExport {
        skeleton: dir.path().join("skeleton.hkx"),
        output: dir.path().join("idle.hkx"),
    };

    let result = xml_exporter(dir.path()).export_animation(&scene, &job).await;
    assert!(matches!(result, Err(ExportError::NoActiveAction(name)) if name == "Hero"));
}

#[tokio::test]
async fn animation_requires_hkx_skeleton() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();
    let job = AnimationExport {
        skeleton: dir.path().join("skeleton.xml"),
        output: dir.path().join("idle.hkx"),
    };

    let result = xml_exporter(dir.path()).export_animation(&scene, &job).await;
    assert!(matches!(result, Err(ExportError::InvalidSkeletonPath(_))));
    assert!(!dir.path().join(DUMP_FILE).exists());
}

#[tokio::test]
async fn project_creates_folders_and_xml() {
    let workdir = tempfile::tempdir().unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();

    xml_exporter(workdir.path())
        .export_project(&scene, &project_job(project_dir.path().join("hero_project.hkx")))
        .await
        .unwrap();

    for directory in PROJECT_DIRECTORIES {
        assert!(project_dir.path().join(directory).is_dir(), "{directory} missing");
    }
    let character = fs::read_to_string(workdir.path().join(CHARACTER_XML)).unwrap();
    assert!(character.contains("<hkparam name=\"name\">hero</hkparam>"));
    assert!(character.contains("CharacterAssets\\skeleton.hkx"));
    assert!(character.contains("Behaviors\\behavior.hkx"));
    let project = fs::read_to_string(workdir.path().join(PROJECT_XML)).unwrap();
    assert!(project.contains("<hkcstring>Characters\\hero.hkx</hkcstring>"));
    assert!(workdir.path().join(SKELETON_XML).is_file());
}

#[tokio::test]
async fn blocked_project_folder_is_rejected_before_writing() {
    let workdir = tempfile::tempdir().unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    fs::write(project_dir.path().join("Characters"), "not a folder").unwrap();
    let scene = Scene::parse(SCENE).unwrap();

    let result = xml_exporter(workdir.path())
        .export_project(&scene, &project_job(project_dir.path().join("hero_project.hkx")))
        .await;

    assert!(matches!(result, Err(ExportError::BlockedProjectDirectory(path)) if path.ends_with("Characters")));
    assert!(!project_dir.path().join("Animations").exists());
    assert!(!workdir.path().join(SKELETON_XML).exists());
}

#[tokio::test]
async fn missing_workdir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();
    let workdir = dir.path().join("missing");

    let result = xml_exporter(&workdir)
        .export_skeleton(&scene, &skeleton_job(dir.path().join("skeleton.hkx")))
        .await;
    assert!(matches!(result, Err(ExportError::MissingWorkingPath(path)) if path == workdir));
}

#[tokio::test]
async fn output_must_be_hkx() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();

    let result = xml_exporter(dir.path())
        .export_skeleton(&scene, &skeleton_job(dir.path().join("skeleton.xml")))
        .await;
    assert!(matches!(result, Err(ExportError::InvalidOutputPath(_))));
    assert!(!dir.path().join(SKELETON_XML).exists());
}

#[tokio::test]
async fn tools_are_checked_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let scene = Scene::parse(SCENE).unwrap();
    let exporter = Exporter::new(missing_tools(), dir.path().to_path_buf(), false);

    let result = exporter.export_skeleton(&scene, &skeleton_job(dir.path().join("skeleton.hkx"))).await;
    assert!(matches!(result, Err(ExportError::InvalidExternalToolPath { .. })));
    assert!(!dir.path().join(SKELETON_XML).exists());
}
