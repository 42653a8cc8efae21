use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{arg, command, value_parser, ArgAction, ArgMatches, Command};

use hkx_rig_export::config::ExportConfig;
use hkx_rig_export::convert::{AnimationExport, Exporter, ProjectExport, SkeletonExport};
use hkx_rig_export::scene::Scene;
use hkx_rig_export::tools::Platform;

fn platform_arg() -> clap::Arg {
    arg!(-p --platform <PLATFORM> "Target game: le writes 32-bit packfiles, sse writes 64-bit packfiles.")
        .value_parser(["le", "sse"])
        .default_value("sse")
}

fn keep_ik_arg() -> clap::Arg {
    arg!(--"keep-ik" "Export bones whose names start with IK_ instead of skipping them and their children.")
        .action(ArgAction::SetTrue)
}

fn platform(matches: &ArgMatches) -> Platform {
    match matches.get_one::<String>("platform").map(String::as_str) {
        Some("le") => Platform::Win32,
        _ => Platform::Amd64,
    }
}

fn required<'a, T: Clone + Send + Sync + 'static>(matches: &'a ArgMatches, id: &str) -> Result<&'a T> {
    matches.get_one::<T>(id).with_context(|| format!("Missing argument {id}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = command!()
        .subcommand_required(true)
        .arg(
            arg!(-c --config <CONFIG> "Config file with tool locations. If not provided, hkx-export.toml in the current directory is used when present.")
                .value_parser(value_parser!(PathBuf))
                .global(true)
        )
        .arg(arg!(--hkxcmd <HKXCMD> "Path to hkxcmd.exe. Overrides the config file.").value_parser(value_parser!(PathBuf)).global(true))
        .arg(arg!(--"convert-kf" <CONVERT_KF> "Path to convertKF.exe. Overrides the config file.").value_parser(value_parser!(PathBuf)).global(true))
        .arg(arg!(-w --workdir <WORKDIR> "Directory for intermediate XML and dump files. Must already exist.").value_parser(value_parser!(PathBuf)).global(true))
        .arg(arg!(--timeout <SECONDS> "Seconds to wait for each external tool before killing it.").value_parser(value_parser!(u64)).global(true))
        .arg(
            arg!(--"xml-only" "Only write the intermediate files to the working directory; don't run the external tools.")
                .action(ArgAction::SetTrue)
                .global(true)
        )
        .arg(arg!(-v --verbose "Log debug output.").action(ArgAction::SetTrue).global(true))
        .subcommand(
            Command::new("skeleton")
                .about("Export the armature as a skeleton packfile")
                .arg(arg!(<SCENE> "The scene TOML file describing the armature.").value_parser(value_parser!(PathBuf)))
                .arg(arg!(<OUTPUT> "The .hkx file to write.").value_parser(value_parser!(PathBuf)))
                .arg(platform_arg())
                .arg(keep_ik_arg())
        )
        .subcommand(
            Command::new("animation")
                .about("Export the armature's active action as an animation packfile")
                .arg(arg!(<SCENE> "The scene TOML file describing the armature and its action.").value_parser(value_parser!(PathBuf)))
                .arg(arg!(<SKELETON> "The 32-bit skeleton .hkx the animation is bound to.").value_parser(value_parser!(PathBuf)))
                .arg(arg!(<OUTPUT> "The .hkx file to write.").value_parser(value_parser!(PathBuf)))
        )
        .subcommand(
            Command::new("project")
                .about("Create a behavior project with character and skeleton files")
                .arg(arg!(<SCENE> "The scene TOML file describing the armature.").value_parser(value_parser!(PathBuf)))
                .arg(arg!(<OUTPUT> "The project .hkx file to write. The project folders are created next to it.").value_parser(value_parser!(PathBuf)))
                .arg(arg!(--character <NAME> "File name of the character packfile.").default_value("character.hkx"))
                .arg(arg!(--skeleton <NAME> "File name of the skeleton packfile.").default_value("skeleton.hkx"))
                .arg(arg!(--behavior <NAME> "File name of the behavior the character references.").default_value("behavior.hkx"))
                .arg(platform_arg())
                .arg(
                    arg!(--"no-le-skeleton" "With sse, don't also write a 32-bit skeleton_LE.hkx for animation export.")
                        .action(ArgAction::SetTrue)
                )
                .arg(keep_ik_arg())
        )
        .get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = ExportConfig::discover(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(hkxcmd) = matches.get_one::<PathBuf>("hkxcmd") {
        config.hkxcmd = hkxcmd.clone();
    }
    if let Some(convert_kf) = matches.get_one::<PathBuf>("convert-kf") {
        config.convert_kf = convert_kf.clone();
    }
    if let Some(workdir) = matches.get_one::<PathBuf>("workdir") {
        config.workdir = workdir.clone();
    }
    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        config.tool_timeout_secs = timeout;
    }
    log::debug!("Using {:?} (timeout {:?})", config, Duration::from_secs(config.tool_timeout_secs));

    let exporter = Exporter::new(config.tools(), config.workdir.clone(), matches.get_flag("xml-only"));

    match matches.subcommand() {
        Some(("skeleton", sub)) => {
            let scene = Scene::load(required::<PathBuf>(sub, "SCENE")?).context("Scene")?;
            let job = SkeletonExport {
                output: required::<PathBuf>(sub, "OUTPUT")?.clone(),
                platform: platform(sub),
                skip_ik: !sub.get_flag("keep-ik"),
            };
            exporter.export_skeleton(&scene, &job).await.context("Skeleton export")?;
        }
        Some(("animation", sub)) => {
            let scene = Scene::load(required::<PathBuf>(sub, "SCENE")?).context("Scene")?;
            let job = AnimationExport {
                skeleton: required::<PathBuf>(sub, "SKELETON")?.clone(),
                output: required::<PathBuf>(sub, "OUTPUT")?.clone(),
            };
            exporter.export_animation(&scene, &job).await.context("Animation export")?;
        }
        Some(("project", sub)) => {
            let scene = Scene::load(required::<PathBuf>(sub, "SCENE")?).context("Scene")?;
            let job = ProjectExport {
                project: required::<PathBuf>(sub, "OUTPUT")?.clone(),
                character_name: required::<String>(sub, "character")?.clone(),
                skeleton_name: required::<String>(sub, "skeleton")?.clone(),
                behavior_name: required::<String>(sub, "behavior")?.clone(),
                platform: platform(sub),
                also_le_skeleton: !sub.get_flag("no-le-skeleton"),
                skip_ik: !sub.get_flag("keep-ik"),
            };
            exporter.export_project(&scene, &job).await.context("Project export")?;
        }
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}
