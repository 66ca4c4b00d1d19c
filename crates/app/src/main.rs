use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use model_viewer_core::asset::format::{encode, DECODER_MANIFEST_NAME};
use model_viewer_core::asset::DecoderManifest;
use model_viewer_core::capability::GpuContextClass;
use model_viewer_core::host::{FileTransport, OffscreenPlatform};
use model_viewer_core::{
    probe, CapabilitySignals, DecoderSource, RenderSettings, Viewer, ViewerConfig,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod sample;

const FRAME_INTERVAL_MS: u64 = 16;

fn main() -> model_viewer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pack { output } => run_pack(&output),
        Commands::Probe { signals } => run_probe(signals.to_signals()),
        Commands::View {
            asset,
            frames,
            fail_at,
            json,
            signals,
        } => run_view(&asset, frames, fail_at, json, signals.to_signals()),
    }
}

fn run_pack(output: &Path) -> model_viewer_core::Result<()> {
    let scene = sample::sample_scene();
    tracing::info!(
        meshes = scene.meshes.len(),
        vertices = scene.total_vertex_count(),
        triangles = scene.total_triangle_count(),
        "encoding sample model"
    );

    let bytes = encode(&scene)?;
    fs::write(output, &bytes)?;

    let manifest_path = match output.parent() {
        Some(parent) => parent.join(DECODER_MANIFEST_NAME),
        None => PathBuf::from(DECODER_MANIFEST_NAME),
    };
    fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&DecoderManifest::current())?,
    )?;

    println!(
        "wrote {} ({} bytes) and {}",
        output.display(),
        bytes.len(),
        manifest_path.display()
    );
    Ok(())
}

fn run_probe(signals: CapabilitySignals) -> model_viewer_core::Result<()> {
    if !signals.supports_rendering() {
        println!("rendering unsupported: the host exposes no GPU context class");
        return Ok(());
    }

    let tier = probe(&signals);
    let settings = RenderSettings::for_tier(tier, signals.device_pixel_ratio);
    println!("tier:             {tier:?}");
    println!("antialias:        {}", settings.antialias);
    println!("shadow maps:      {}", settings.shadow_maps);
    println!("shadow map size:  {}", settings.shadow_map_size);
    println!("pixel ratio:      {}", settings.pixel_ratio);
    println!("power preference: {:?}", settings.power_preference);
    Ok(())
}

fn run_view(
    asset: &Path,
    frames: u64,
    fail_at: Option<u64>,
    json: bool,
    signals: CapabilitySignals,
) -> model_viewer_core::Result<()> {
    tracing::info!(?asset, frames, "starting offscreen view run");

    let platform = OffscreenPlatform::new(signals);
    let diagnostics = platform.diagnostics();
    let resource_dir = match asset.parent() {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };

    let mut viewer = Viewer::new(
        ViewerConfig::new([asset.to_string_lossy()]),
        Box::new(platform),
        Arc::new(FileTransport::new()),
        DecoderSource::ResourceDir(resource_dir),
    )?;

    viewer.activate();
    viewer.settle_load();
    for frame in 0..frames {
        if fail_at == Some(frame) {
            diagnostics.force_context_loss();
        }
        viewer.on_frame(Duration::from_millis(frame * FRAME_INTERVAL_MS));
    }

    let final_state = viewer.state().clone();
    let tier = viewer.tier();
    let frame_stats = diagnostics.last_frame_stats();
    viewer.deactivate();
    let residual = viewer.resource_counts();

    let report = json!({
        "state": final_state,
        "tier": tier,
        "frames": frames,
        "draw_calls": diagnostics.draw_calls(),
        "contexts_acquired": diagnostics.contexts_acquired(),
        "frame_stats": frame_stats.map(|stats| json!({
            "meshes": stats.meshes,
            "triangles": stats.triangles,
            "lights": stats.lights,
        })),
        "residual_resources": {
            "contexts": residual.contexts,
            "geometries": residual.geometries,
            "materials": residual.materials,
        },
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("final state:       {final_state:?}");
        println!("tier:              {tier:?}");
        println!("frames pumped:     {frames}");
        println!("draw calls:        {}", diagnostics.draw_calls());
        println!("contexts acquired: {}", diagnostics.contexts_acquired());
        if let Some(stats) = frame_stats {
            println!(
                "last frame:        {} meshes, {} triangles, {} lights",
                stats.meshes, stats.triangles, stats.lights
            );
        }
        println!(
            "residual:          {} contexts, {} geometries, {} materials",
            residual.contexts, residual.geometries, residual.materials
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Offscreen tooling for the model viewer engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the sample model container and its decoder manifest.
    Pack {
        /// Output path for the container; the manifest lands next to it.
        output: PathBuf,
    },
    /// Print the capability tier derived from a set of host signals.
    Probe {
        #[command(flatten)]
        signals: SignalArgs,
    },
    /// Load a container into the offscreen host and pump frames.
    View {
        /// Path to the model container to display.
        asset: PathBuf,
        /// Number of frames to pump before tearing down.
        #[arg(long, default_value_t = 120)]
        frames: u64,
        /// Force a context loss right before this frame.
        #[arg(long)]
        fail_at: Option<u64>,
        /// Emit the run report as JSON instead of text.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        signals: SignalArgs,
    },
}

/// Host signals fed to the capability probe. Defaults describe a desktop
/// class device; pass `--gpu none` to exercise the fallback path.
#[derive(Args, Debug)]
struct SignalArgs {
    /// GPU context class exposed by the host.
    #[arg(long, value_enum, default_value = "modern")]
    gpu: GpuArg,
    /// Logical CPU cores visible to the engine.
    #[arg(long, default_value_t = 8)]
    cores: u32,
    /// Device memory in gigabytes.
    #[arg(long, default_value_t = 8.0)]
    memory: f32,
    /// Viewport width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,
    /// Viewport height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,
    /// Device pixel ratio.
    #[arg(long, default_value_t = 2.0)]
    pixel_ratio: f32,
}

impl SignalArgs {
    fn to_signals(&self) -> CapabilitySignals {
        CapabilitySignals {
            gpu: self.gpu.into(),
            logical_cores: Some(self.cores),
            device_memory_gb: Some(self.memory),
            viewport_width: self.width,
            viewport_height: self.height,
            device_pixel_ratio: self.pixel_ratio,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GpuArg {
    None,
    Legacy,
    Modern,
}

impl From<GpuArg> for Option<GpuContextClass> {
    fn from(arg: GpuArg) -> Self {
        match arg {
            GpuArg::None => None,
            GpuArg::Legacy => Some(GpuContextClass::Legacy),
            GpuArg::Modern => Some(GpuContextClass::Modern),
        }
    }
}
