#![deny(clippy::all, clippy::pedantic)]

mod config;
mod demo;

use std::io::IsTerminal;

use anyhow::{Context, Result};
use compute::MockCpu;
use glam::Vec3;
use raymarch::{
    Camera, FractalRenderer, FrameOutcome, HostTransform, LightData, RayMarchConfig, RayMarcher,
    ShapeController, FRACTAL_LAYOUT, RAYMARCH_LAYOUT,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let config = RuntimeConfig::from_env().context("invalid runtime configuration")?;
    info!(
        frames = config.frames,
        width = config.width,
        height = config.height,
        "Running headless on the mock compute backend."
    );

    run_gated(config)?;
    run_fractal(config)?;
    Ok(())
}

fn run_gated(config: RuntimeConfig) -> Result<()> {
    let mut backend = MockCpu::with_layout(&RAYMARCH_LAYOUT);
    let target = backend.create_image();
    let source = backend.create_image();
    let destination = backend.create_image();
    let mut marcher = RayMarcher::new(
        backend,
        target,
        RayMarchConfig::new(config.width, config.height),
    )
    .context("failed to create ray marcher")?;
    info!(workgroups = ?marcher.workgroups(), "ray marcher initialized");

    let mut controller = ShapeController::new();
    controller.attach(demo::scene());
    let mut camera = Camera::new(config.width, config.height);
    let mut floor = HostTransform::new(Vec3::new(0.0, -1.0, 0.0));

    for frame in 0..config.frames {
        demo::drive(frame, &mut camera, &mut controller, &mut floor);
        let moved = camera.take_moved();
        match marcher.render_frame(&mut controller, &camera, moved, source, destination) {
            FrameOutcome::Dispatched { recreated } => {
                info!(frame, recreated, shapes = ?marcher.element_count(), "frame dispatched");
            }
            FrameOutcome::Reused => debug!(frame, "frame reused"),
            FrameOutcome::Empty => info!(frame, "scene empty"),
            FrameOutcome::Failed(err) => warn!(frame, "frame failed: {err}"),
        }
    }

    let stats = marcher.stats();
    info!(
        dispatches = stats.dispatches,
        reuses = stats.reuses,
        recreations = stats.recreations,
        writes = stats.writes,
        failures = stats.failures,
        flattens = controller.flatten_count(),
        "Frame loop finished."
    );

    marcher.teardown();
    controller.teardown();
    Ok(())
}

fn run_fractal(config: RuntimeConfig) -> Result<()> {
    if config.fractal_frames == 0 {
        return Ok(());
    }
    let mut backend = MockCpu::with_layout(&FRACTAL_LAYOUT);
    let target = backend.create_image();
    let destination = backend.create_image();
    let mut fractal = FractalRenderer::new(
        backend,
        target,
        RayMarchConfig::new(config.width, config.height),
    )
    .context("failed to create fractal renderer")?;

    let camera = Camera::new(config.width, config.height);
    let light = LightData::default();
    for frame in 0..config.fractal_frames {
        fractal
            .render_frame(&camera, light, destination)
            .with_context(|| format!("fractal frame {frame} failed"))?;
    }
    info!(
        dispatches = fractal.dispatches(),
        light_updates = fractal.light_updates(),
        "Fractal pass finished."
    );
    Ok(())
}
