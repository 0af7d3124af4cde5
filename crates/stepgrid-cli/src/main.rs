mod render;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use stepgrid_engine::EngineConfig;
use stepgrid_model::State;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::render::{parse_trigger, render, starter_state, RenderSettings, TriggerSpec};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => execute_render(args),
        Commands::Init(args) => execute_init(args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Offline tools for the stepgrid sequencer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a state file against a scripted transport and print the MIDI it emits.
    Render(RenderArgs),
    /// Write a starter state file.
    Init(InitArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Sequencer state (JSON).
    #[arg(long)]
    state: PathBuf,
    /// Optional engine configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,
    #[arg(long, default_value_t = 48_000.0)]
    sample_rate: f64,
    /// Frames per processing block.
    #[arg(long, default_value_t = 512)]
    block_frames: u32,
    /// Length of the render in 16-step bars.
    #[arg(long, default_value_t = 1)]
    bars: u32,
    /// Held input note, `NOTE[:VELOCITY]@START..END` in steps. Repeatable.
    #[arg(long = "trigger", value_parser = parse_trigger)]
    triggers: Vec<TriggerSpec>,
    /// Loop the selected pattern for the whole render.
    #[arg(long)]
    play_selected: bool,
    /// Print events as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InitArgs {
    /// Destination for the new state file.
    #[arg(long)]
    output: PathBuf,
    /// Number of patterns to create.
    #[arg(long, default_value_t = 1)]
    patterns: usize,
    /// Replace an existing file.
    #[arg(long)]
    force: bool,
}

fn execute_render(args: RenderArgs) -> Result<()> {
    if !(args.bpm.is_finite() && args.bpm > 0.0) {
        bail!("--bpm must be positive");
    }
    if !(args.sample_rate.is_finite() && args.sample_rate > 0.0) {
        bail!("--sample-rate must be positive");
    }

    let mut state = State::read_from_file(&args.state)
        .with_context(|| format!("failed to load state from {}", args.state.display()))?
        .with_context(|| format!("state file {} does not exist", args.state.display()))?;
    if args.play_selected {
        state.play_selected = true;
    }

    let config = match &args.config {
        Some(path) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("{} is not a valid engine config", path.display()))?
        }
        None => EngineConfig::default(),
    };

    let settings = RenderSettings {
        beats_per_minute: args.bpm,
        sample_rate: args.sample_rate,
        block_frames: args.block_frames,
        bars: args.bars,
    };
    info!(
        patterns = state.num_patterns(),
        triggers = args.triggers.len(),
        bars = args.bars,
        "rendering state"
    );
    let events = render(state, &args.triggers, &settings, &config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    println!("{:>10}  {:>5}  {:<8}  {:>4}  {:>3}", "sample", "frame", "event", "note", "vel");
    for event in &events {
        let kind = if event.is_note_on() { "note-on" } else { "note-off" };
        println!(
            "{:>10}  {:>5}  {:<8}  {:>4}  {:>3}",
            event.sample, event.frame, kind, event.note, event.velocity
        );
    }
    Ok(())
}

fn execute_init(args: InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{} already exists, pass --force to replace it",
            args.output.display()
        );
    }
    let state = starter_state(args.patterns);
    state
        .write_to_file(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Wrote {} pattern(s) to {}",
        state.num_patterns(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_render_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        execute_init(InitArgs {
            output: path.clone(),
            patterns: 3,
            force: false,
        })
        .unwrap();
        let state = State::read_from_file(&path).unwrap().unwrap();
        assert_eq!(state.num_patterns(), 3);
        assert_eq!(state.selected_id(), Some(0));

        assert!(execute_init(InitArgs {
            output: path.clone(),
            patterns: 1,
            force: false,
        })
        .is_err());
    }

    #[test]
    fn cli_accepts_repeated_triggers() {
        let cli = Cli::try_parse_from([
            "stepgrid",
            "render",
            "--state",
            "s.json",
            "--trigger",
            "60@0..4",
            "--trigger",
            "62:90@4..8",
        ])
        .unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.triggers.len(), 2);
        assert_eq!(args.triggers[1].velocity, 90);
    }
}
