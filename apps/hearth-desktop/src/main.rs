mod display;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hearth_demo::{DemoOptions, SpiralDemo};
use hearth_kernel::{EngineConfig, GameEngine};
use tracing_subscriber::EnvFilter;

use crate::display::WinitDisplay;

#[derive(Parser)]
#[command(name = "hearth-desktop", about = "Hearth spiral demo")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Demo options (JSON); flags below override it
    #[arg(long)]
    demo: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Present as fast as possible
    #[arg(long)]
    no_vsync: bool,

    /// Directory with scene.vert.wgsl and scene.frag.wgsl
    #[arg(long)]
    shaders: Option<PathBuf>,

    /// Root for --model and --texture
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Extra OBJ placed at the origin
    #[arg(long)]
    model: Option<String>,

    /// Image applied to every mesh
    #[arg(long)]
    texture: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.width = cli.width.unwrap_or(config.width);
    config.height = cli.height.unwrap_or(config.height);
    if cli.no_vsync {
        config.vsync = false;
    }

    let mut options: DemoOptions = match &cli.demo {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => DemoOptions::default(),
    };
    if cli.shaders.is_some() {
        options.shader_dir = cli.shaders;
    }
    if let Some(assets) = cli.assets {
        options.asset_dir = assets;
    }
    if cli.model.is_some() {
        options.model = cli.model;
    }
    if cli.texture.is_some() {
        options.texture = cli.texture;
    }

    let display = WinitDisplay::new(&config);
    let stats = GameEngine::new(config, display, SpiralDemo::new(options)).run()?;
    tracing::info!(
        iterations = stats.iterations,
        updates = stats.updates,
        "exited"
    );
    Ok(())
}
