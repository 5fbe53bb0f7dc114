//! de-export - Drag[en]gine asset export tool
//!
//! Converts a JSON scene snapshot to engine assets
//! (.demodel, .deanim, .derig, .deoccmesh, .denavspace)

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use de_common::{ANIMATION_EXT, MODEL_EXT, NAVIGATION_SPACE_EXT, OCCLUSION_MESH_EXT, RIG_EXT};
use std::path::{Path, PathBuf};

use de_export::config::Configuration;
use de_export::export::{self, AnimationOptions};
use de_export::SceneSnapshot;

#[derive(Parser)]
#[command(name = "de-export")]
#[command(about = "Drag[en]gine asset export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: deexport.config next to the scene)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a mesh and its LOD chain as .demodel
    Model {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Mesh name (default: first mesh)
        #[arg(long)]
        mesh: Option<String>,
    },

    /// Export the moves of an armature as .deanim
    Animation {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Armature name (default: first armature)
        #[arg(long)]
        armature: Option<String>,

        /// Mesh whose shape keys are exported as vertex position sets
        #[arg(long)]
        mesh: Option<String>,

        /// Export only this action, replacing it in an existing file
        #[arg(long = "move")]
        single_move: Option<String>,

        /// Move set whose filters select the actions (default: the scene's active set)
        #[arg(long)]
        move_set: Option<String>,
    },

    /// Export an armature's physics rig as .derig
    Rig {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Armature name (default: first armature)
        #[arg(long)]
        armature: Option<String>,
    },

    /// Export a mesh as .deoccmesh
    Occlusion {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Mesh name (default: first mesh)
        #[arg(long)]
        mesh: Option<String>,
    },

    /// Export a mesh as .denavspace
    Navspace {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Mesh name (default: first mesh)
        #[arg(long)]
        mesh: Option<String>,
    },
}

impl Commands {
    fn scene(&self) -> &Path {
        match self {
            Commands::Model { scene, .. }
            | Commands::Animation { scene, .. }
            | Commands::Rig { scene, .. }
            | Commands::Occlusion { scene, .. }
            | Commands::Navspace { scene, .. } => scene,
        }
    }
}

fn init_logging(verbose: bool, config: &Configuration) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level().unwrap_or(tracing::Level::INFO)
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn pick_mesh(snapshot: &SceneSnapshot, name: Option<String>) -> Result<String> {
    name.or_else(|| snapshot.meshes.first().map(|mesh| mesh.name.clone()))
        .ok_or_else(|| anyhow!("Scene contains no meshes"))
}

fn pick_armature(snapshot: &SceneSnapshot, name: Option<String>) -> Result<String> {
    name.or_else(|| snapshot.armatures.first().map(|armature| armature.name.clone()))
        .ok_or_else(|| anyhow!("Scene contains no armatures"))
}

fn output_path(output: Option<PathBuf>, scene: &Path, extension: &str) -> PathBuf {
    output.unwrap_or_else(|| scene.with_extension(extension))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let scene_path = cli.command.scene().to_path_buf();
    let config = export::load_configuration(cli.config.as_deref(), &scene_path)?;
    init_logging(cli.verbose, &config);

    let mut snapshot = SceneSnapshot::load(&scene_path)?;

    match cli.command {
        Commands::Model { scene, output, mesh } => {
            let mesh = pick_mesh(&snapshot, mesh)?;
            let output = output_path(output, &scene, MODEL_EXT);
            tracing::info!("Exporting model '{}' -> {:?}", mesh, output);
            export::export_model(&snapshot, &mesh, &config, &output)?;
        }

        Commands::Animation {
            scene,
            output,
            armature,
            mesh,
            single_move,
            move_set,
        } => {
            let options = AnimationOptions {
                armature: pick_armature(&snapshot, armature)?,
                mesh,
                single_move,
                move_set,
            };
            let output = output_path(output, &scene, ANIMATION_EXT);
            tracing::info!("Exporting animation of '{}' -> {:?}", options.armature, output);
            export::export_animation(&mut snapshot, &options, &config, &output)?;
        }

        Commands::Rig {
            scene,
            output,
            armature,
        } => {
            let armature = pick_armature(&snapshot, armature)?;
            let output = output_path(output, &scene, RIG_EXT);
            tracing::info!("Exporting rig '{}' -> {:?}", armature, output);
            export::export_rig(&snapshot, &armature, &config, &output)?;
        }

        Commands::Occlusion { scene, output, mesh } => {
            let mesh = pick_mesh(&snapshot, mesh)?;
            let output = output_path(output, &scene, OCCLUSION_MESH_EXT);
            tracing::info!("Exporting occlusion mesh '{}' -> {:?}", mesh, output);
            export::export_occlusion_mesh(&snapshot, &mesh, &config, &output)?;
        }

        Commands::Navspace { scene, output, mesh } => {
            let mesh = pick_mesh(&snapshot, mesh)?;
            let output = output_path(output, &scene, NAVIGATION_SPACE_EXT);
            tracing::info!("Exporting navigation space '{}' -> {:?}", mesh, output);
            export::export_navigation_space(&snapshot, &mesh, &config, &output)?;
        }
    }

    tracing::info!("Done!");
    Ok(())
}
