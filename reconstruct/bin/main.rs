use std::{
    io::{stdout, Write},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use args::Args;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use common::{
    misc::{human_duration, separated_count},
    progress::Progress,
};
use reconstruct::{
    export::{FileSink, MeshSink},
    Reconstructor,
};

mod args;
mod source;

fn main() -> Result<()> {
    let filter = filter::Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target("reconstruct", LevelFilter::TRACE)
        .with_target("common", LevelFilter::TRACE);
    let format = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();

    let args = Args::parse();
    let params = args.parameters()?;
    FileSink::format_for(&args.output)?;

    let volume = args
        .volume_source()
        .load()
        .context("Failed to load volume")?;
    let (dims, extent) = (volume.dimensions(), volume.physical_extent());
    let (min, max) = volume.value_range();
    println!(
        "Loaded volume. {{ size: {}x{}x{}, extent: {:.1}x{:.1}x{:.1}, voxels: {}, range: {min}..{max} }}",
        dims.x,
        dims.y,
        dims.z,
        extent.x,
        extent.y,
        extent.z,
        separated_count(volume.voxel_count())
    );

    // Reconstruct on another thread so progress can be shown here
    let now = Instant::now();
    let reconstructor = Reconstructor::new(params);
    let progress = reconstructor.progress();
    let worker = thread::spawn(move || reconstructor.reconstruct(&volume));

    show_progress(&progress, &worker, Duration::from_millis(50))?;

    let mesh = worker
        .join()
        .map_err(|_| anyhow!("Reconstruction thread panicked"))?
        .context("Reconstruction failed")?;

    FileSink
        .write(&mesh, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "\nDone. {{ vert: {}, face: {} }} Elapsed: {}",
        separated_count(mesh.vertex_count()),
        separated_count(mesh.face_count()),
        human_duration(now.elapsed())
    );

    Ok(())
}

/// Prints the current stage until the worker is done.
fn show_progress<T>(
    progress: &Progress,
    worker: &JoinHandle<T>,
    interval: Duration,
) -> Result<()> {
    // A panicking worker never marks the progress finished.
    while !progress.complete() && !worker.is_finished() {
        print!(
            "\r{:>5.1}% {:<40}",
            progress.progress() * 100.0,
            progress.label()
        );
        stdout().flush()?;
        thread::sleep(interval);
    }

    Ok(())
}
