use crate::frame::{FrameConfig, FrameReader};
use crate::message;
use crate::source::ByteSource;
use crate::track::TrackStore;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Drives the link: frames bytes, decodes payloads and merges the result
/// into the track store. Never gives up on a noisy link; every protocol
/// error is logged and the loop re-enters the handshake.
pub struct Ingestor<S, W> {
    reader: FrameReader<S, W>,
    store: TrackStore,
    should_stop: Arc<AtomicBool>,
}

impl<S: ByteSource, W: Write> Ingestor<S, W> {
    pub fn new(
        source: S,
        ack: W,
        config: FrameConfig,
        store: TrackStore,
        should_stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader: FrameReader::new(source, ack, config, Arc::clone(&should_stop)),
            store,
            should_stop,
        }
    }

    /// Run until the stop flag is raised (blocking).
    pub fn run(&mut self) {
        log::info!("ingestion loop started");

        while !self.should_stop.load(Ordering::SeqCst) {
            let frame = match self.reader.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("framing error, awaiting next hello: {}", e);
                    continue;
                }
            };

            match message::decode(&frame.payload) {
                Ok(update) if update.is_empty() => {
                    log::debug!("update carried no applicable records");
                }
                Ok(update) => self.store.apply(update),
                Err(e) => log::warn!("dropping message: {}", e),
            }
        }

        log::info!("ingestion loop stopped");
    }
}
