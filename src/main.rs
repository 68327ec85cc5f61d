use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};
use simplelog::{Config, WriteLogger};

use tileview::settings::{Settings, default_config_path};
use tileview::tiles::{
    EngineCommand, FloatSize, RenderResponse, RenderService, SyntheticEngine, ViewportMetrics,
};

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Drive a synthetic document through the tile cache and dump the composite
#[derive(Parser)]
#[command(name = "tileview", version)]
struct Args {
    /// Settings file (defaults to the per-user config path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "tileview.log")]
    log_file: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    /// Override the configured tile edge length
    #[arg(long)]
    tile_size: Option<u32>,

    /// Page size at zoom 1.0, as WIDTHxHEIGHT
    #[arg(long, default_value = "2000x3000", value_parser = parse_size)]
    page: FloatSize,

    /// Viewport size in pixels, as WIDTHxHEIGHT
    #[arg(long, default_value = "800x600", value_parser = parse_size)]
    viewport: FloatSize,

    /// Number of pan steps to simulate
    #[arg(long, default_value_t = 4)]
    steps: u32,

    /// Pixels moved per step, as DXxDY
    #[arg(long, default_value = "0x250", value_parser = parse_size)]
    pan: FloatSize,

    /// Zoom applied before panning
    #[arg(long, default_value_t = 1.0)]
    zoom: f32,

    /// Post a content change after panning and wait for the refetch
    #[arg(long)]
    bump: bool,

    /// Write the final composite as PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the default settings file and exit
    #[arg(long)]
    write_default_config: bool,
}

fn parse_size(value: &str) -> Result<FloatSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let w: f32 = w.trim().parse().map_err(|e| format!("{w:?}: {e}"))?;
    let h: f32 = h.trim().parse().map_err(|e| format!("{h:?}: {e}"))?;
    Ok(FloatSize::new(w, h))
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level {value:?}"))
}

fn main() -> Result<()> {
    better_panic::install();
    let args = Args::parse();

    WriteLogger::init(
        args.log_level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("creating log file {:?}", args.log_file))?,
    )?;

    let config_path = args.config.clone().or_else(default_config_path);
    if args.write_default_config {
        let Some(path) = config_path else {
            bail!("no config directory available, pass --config");
        };
        Settings::default()
            .save(&path)
            .with_context(|| format!("writing {path:?}"))?;
        println!("Wrote default settings to {}", path.display());
        return Ok(());
    }

    let mut settings = config_path
        .as_deref()
        .map(Settings::load_or_default)
        .unwrap_or_default();
    if let Some(tile_size) = args.tile_size {
        settings.tile_size = tile_size;
    }
    if args.bump {
        settings.experimental_mode = true;
    }

    info!("Starting tileview with {settings:?}");
    run(&args, Arc::new(settings))
}

fn run(args: &Args, settings: Arc<Settings>) -> Result<()> {
    let page = args.page;
    let metrics = ViewportMetrics::new(page, args.viewport);
    let mut service = RenderService::spawn(settings, metrics, move |_| {
        SyntheticEngine::new(page, 1)
    })
    .context("spawning render worker")?;

    if (args.zoom - 1.0).abs() > f32::EPSILON {
        service.on_zoom_changed(args.zoom, 0.0, 0.0);
    }
    report(&service.wait_idle(IDLE_TIMEOUT)?);

    for step in 0..args.steps {
        service.on_pan(args.pan.width, args.pan.height);
        let responses = service.wait_idle(IDLE_TIMEOUT)?;
        info!("Step {step}: viewport {}", service.metrics().viewport());
        report(&responses);
    }

    if args.bump {
        let id = service.post_command(EngineCommand::new("bump", ""));
        let viewport = service.metrics().viewport();
        let zoom = service.metrics().zoom();
        service.invalidate_region(viewport.scale(1.0 / zoom));
        let responses = service.wait_idle(IDLE_TIMEOUT)?;
        for response in &responses {
            if let RenderResponse::Error { id: failed, error } = response {
                if *failed == id {
                    bail!("bump rejected: {error}");
                }
            }
        }
        report(&responses);
    }

    let frame = service.composite();
    let stats = frame.stats;
    println!(
        "frame #{}: {} tiles ({} stale) at zoom {:.3}",
        frame.sequence,
        frame.tile_count(),
        frame.stale_count(),
        frame.metrics.zoom()
    );
    println!(
        "reconciliations={} short_circuits={} requested={} filled={} failed={} released={} refreshed={}",
        stats.reconciliations,
        stats.short_circuits,
        stats.tiles_requested,
        stats.tiles_filled,
        stats.fetch_failures,
        stats.tiles_released,
        stats.tiles_refreshed
    );

    if let Some(output) = &args.output {
        frame
            .rasterize()
            .save(output)
            .with_context(|| format!("writing {output:?}"))?;
        println!("Wrote composite to {}", output.display());
    }

    service.shutdown();
    info!("Shutting down tileview");
    Ok(())
}

fn report(responses: &[RenderResponse]) {
    for response in responses {
        match response {
            RenderResponse::TileFailing { id, attempts } => {
                eprintln!("warning: {id} failed {attempts} times");
            }
            RenderResponse::Error { error, .. } => eprintln!("error: {error}"),
            RenderResponse::PartChanged { part, .. } => info!("Now showing part {part}"),
            RenderResponse::Frame(_) | RenderResponse::Flushed(_) => {}
        }
    }
}
