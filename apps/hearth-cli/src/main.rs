use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use hearth_assets::{AssetDir, BuiltinShaders, ShaderSource};
use hearth_demo::{DemoOptions, FRAGMENT_SHADER, HeadlessSurface, SpiralDemo, VERTEX_SHADER};
use hearth_kernel::{DeltaSource, EngineConfig, GameEngine};
use hearth_render::{HeadlessDevice, Renderer, RendererSettings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hearth-cli", about = "Headless tools for the hearth engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective engine and renderer configuration
    Info,
    /// Run the demo scene headless and report what was drawn
    Simulate {
        /// Frames to render before closing
        #[arg(short, long, default_value = "3")]
        frames: u64,
        /// Seconds fed to the loop per iteration; one tick interval by
        /// default. Use `--wall-clock` for real time.
        #[arg(long)]
        delta: Option<f64>,
        /// Measure iterations with the wall clock instead of a fixed delta
        #[arg(long, conflicts_with = "delta")]
        wall_clock: bool,
        /// Override the configured surface width
        #[arg(long)]
        width: Option<u32>,
        /// Override the configured surface height
        #[arg(long)]
        height: Option<u32>,
        /// Override the configured updates per second
        #[arg(long)]
        ups: Option<u32>,
        #[command(flatten)]
        demo: DemoArgs,
    },
    /// Compile and link the scene stages and print their uniform layout
    CheckShaders {
        /// Directory with scene.vert.wgsl and scene.frag.wgsl; built-in
        /// stages when omitted
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct DemoArgs {
    /// Directory with scene.vert.wgsl and scene.frag.wgsl
    #[arg(long)]
    shaders: Option<PathBuf>,
    /// Root for --cube-model, --model and --texture
    #[arg(long, default_value = ".")]
    assets: PathBuf,
    /// OBJ used for the spiral instead of the built-in cube
    #[arg(long)]
    cube_model: Option<String>,
    /// Extra OBJ placed at the origin
    #[arg(long)]
    model: Option<String>,
    /// Image applied to every mesh
    #[arg(long)]
    texture: Option<String>,
    /// Number of cubes on the spiral
    #[arg(long, default_value = "100")]
    cubes: usize,
}

impl DemoArgs {
    fn options(self) -> DemoOptions {
        DemoOptions {
            shader_dir: self.shaders,
            asset_dir: self.assets,
            cube_model: self.cube_model,
            model: self.model,
            texture: self.texture,
            cubes: self.cubes,
            ..DemoOptions::default()
        }
    }
}

struct FixedDelta(f64);

impl DeltaSource for FixedDelta {
    fn delta(&mut self) -> f64 {
        self.0
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Info => {
            println!("hearth-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("engine config:");
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("renderer settings:");
            println!(
                "{}",
                serde_json::to_string_pretty(&RendererSettings::default())?
            );
            println!("tick interval: {:.4} s", config.tick_interval());
        }
        Commands::Simulate {
            frames,
            delta,
            wall_clock,
            width,
            height,
            ups,
            demo,
        } => {
            let mut config = config;
            config.width = width.unwrap_or(config.width);
            config.height = height.unwrap_or(config.height);
            config.target_ups = ups.unwrap_or(config.target_ups);

            let surface = HeadlessSurface::new(config.width, config.height).close_after(frames);
            let retained = surface.retained();
            let demo = SpiralDemo::new(demo.options());
            let fixed = FixedDelta(delta.unwrap_or(config.tick_interval()));

            let engine = GameEngine::new(config, surface, demo);
            let stats = if wall_clock {
                engine.run()?
            } else {
                engine.with_delta_source(fixed).run()?
            };

            let device = retained
                .borrow_mut()
                .take()
                .context("headless surface kept no device")?;
            println!(
                "iterations={} updates={} frames={}",
                stats.iterations,
                stats.updates,
                device.frames()
            );
            println!(
                "draw calls={} (per frame {:.1})",
                device.draw_calls().len(),
                device.draw_calls().len() as f64 / device.frames().max(1) as f64
            );
            println!("leaked handles={}", device.live_handles());
        }
        Commands::CheckShaders { dir } => {
            let source: Box<dyn ShaderSource> = match &dir {
                Some(dir) => Box::new(AssetDir::new(dir)),
                None => Box::new(BuiltinShaders),
            };
            let vertex = source.load_source(VERTEX_SHADER)?;
            let fragment = source.load_source(FRAGMENT_SHADER)?;

            let mut device = HeadlessDevice::new();
            let mut renderer =
                Renderer::init(&mut device, &vertex, &fragment, RendererSettings::default())
                    .context("scene program rejected")?;
            renderer.cleanup(&mut device);
            println!("{VERTEX_SHADER} + {FRAGMENT_SHADER}: every scene uniform resolves");

            let block = hearth_render_wgpu::reflect(&vertex)
                .with_context(|| format!("reflecting {VERTEX_SHADER}"))?;
            if hearth_render_wgpu::reflect(&fragment)? != block {
                anyhow::bail!("uniform struct differs between {VERTEX_SHADER} and {FRAGMENT_SHADER}");
            }
            println!("uniform struct {} ({} bytes):", block.type_name, block.size);
            for field in &block.fields {
                println!("  {:>4}  {:<28} {:?}", field.offset, field.name, field.kind);
            }
        }
    }

    Ok(())
}
