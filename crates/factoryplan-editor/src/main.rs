use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use factoryplan_editor::{Editor, EditorSettings};
use factoryplan_io::{BlueprintReader, BlueprintWriter};

#[derive(Parser, Debug)]
#[command(name = "factoryplan", version, about = "Factory layout planning tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an oil outpost around the pumpjacks of a blueprint.
    Generate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// JSON editor settings; every field is optional.
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Generate {
            input,
            output,
            settings,
        } => generate(input, output, settings),
    }
}

fn generate(input: PathBuf, output: PathBuf, settings: Option<PathBuf>) -> Result<()> {
    let settings = match settings {
        Some(path) => EditorSettings::load(&path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => EditorSettings::default(),
    };

    let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
    let document = BlueprintReader::new(BufReader::new(file))
        .read()
        .with_context(|| format!("reading blueprint {}", input.display()))?;

    let mut editor = Editor::new(settings);
    editor.load_blueprint(&document)?;
    let stats = editor
        .generate_outpost()
        .context("generating oil outpost")?;
    log::info!(
        "placed {} pipes, {} beacons and {} poles",
        stats.pipes.pipes + stats.pipes.underground_pipes,
        stats.beacons,
        stats.poles
    );

    let file = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = BlueprintWriter::new(BufWriter::new(file));
    writer
        .write(&editor.export_blueprint())
        .with_context(|| format!("writing blueprint {}", output.display()))?;
    log::info!("wrote {}", output.display());
    Ok(())
}
