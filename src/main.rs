use anyhow::Context;
use clap::Parser;
use nowplaying_edge_rs::{
    config::Args,
    ingest::Ingestor,
    render::{ConsoleRenderer, RenderLoop},
    source::StreamSource,
    track::TrackStore,
};
use std::fs::{File, OpenOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    log::info!("🎵 nowplaying-edge starting on {}", args.device.display());

    // Separate read and ack handles onto the same device node. Port
    // attributes (baud rate etc.) are left to the OS.
    let reader = File::open(&args.device)
        .with_context(|| format!("opening {} for reading", args.device.display()))?;
    let ack = OpenOptions::new()
        .write(true)
        .open(&args.device)
        .with_context(|| format!("opening {} for acks", args.device.display()))?;

    let store = TrackStore::new();
    let should_stop = Arc::new(AtomicBool::new(false));

    let stop = Arc::clone(&should_stop);
    ctrlc::set_handler(move || {
        log::info!("🛑 received shutdown signal");
        stop.store(true, Ordering::SeqCst);
    })
    .ok();

    let mut ingestor = Ingestor::new(
        StreamSource::spawn(reader),
        ack,
        args.frame_config(),
        store.clone(),
        Arc::clone(&should_stop),
    );
    let ingest_handle = thread::spawn(move || ingestor.run());

    let mut render_loop = RenderLoop::new(
        store,
        ConsoleRenderer::new(),
        args.refresh_interval(),
        should_stop,
    );
    render_loop.run();

    ingest_handle
        .join()
        .map_err(|_| anyhow::anyhow!("ingestion thread panicked"))?;
    println!();

    Ok(())
}
