//! de-build - Drag[en]gine module build helpers

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use de_build::{DirectiveFile, ModuleList};

#[derive(Parser)]
#[command(name = "de-build")]
#[command(about = "Drag[en]gine module build helpers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the library size and SHA-1 into a module manifest
    Manifest {
        /// Module manifest (XML)
        manifest: PathBuf,

        /// Extra rewrites to apply (TOML)
        #[arg(long)]
        directives: Option<PathBuf>,
    },

    /// Check a module manifest against its library
    Verify {
        /// Module manifest (XML)
        manifest: PathBuf,

        /// Expected module version
        #[arg(long)]
        version: Option<String>,
    },

    /// Generate the internal module registrar source
    Modules {
        /// Registration functions loaded first
        #[arg(long, num_args = 1..)]
        priority: Vec<String>,

        /// Registration functions loaded after the priority ones
        #[arg(long, num_args = 1..)]
        regular: Vec<String>,

        /// Export entry points for a standalone shared library
        #[arg(long)]
        standalone: bool,

        /// Output source file
        #[arg(short, long)]
        output: PathBuf,

        /// Check the output is up to date instead of writing it
        #[arg(long)]
        check: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Manifest {
            manifest,
            directives,
        } => {
            let directives = directives
                .as_deref()
                .map(DirectiveFile::load)
                .transpose()?;
            de_build::update_manifest(&manifest, directives.as_ref())?;
            println!("✓ Done!");
        }

        Commands::Verify { manifest, version } => {
            match de_build::verify_manifest(&manifest, version.as_deref()) {
                Ok(_) => println!("✓ {} is up to date", manifest.display()),
                Err(e) => {
                    eprintln!("✗ {}: {:#}", manifest.display(), e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Modules {
            priority,
            regular,
            standalone,
            output,
            check,
        } => {
            let modules = ModuleList {
                priority,
                regular,
                standalone,
            };
            if check {
                if de_build::check_registrar(&modules, &output)? {
                    println!("✓ {} is in sync", output.display());
                } else {
                    println!("✗ {} is out of sync", output.display());
                    anyhow::bail!("Registrar is out of sync. Run 'de-build modules' to regenerate.");
                }
            } else {
                de_build::write_registrar(&modules, &output)?;
                println!("✓ Done!");
            }
        }
    }

    Ok(())
}
