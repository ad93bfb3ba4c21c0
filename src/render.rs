use crate::error::{NowPlayingError, Result};
use crate::track::{TrackSnapshot, TrackStore};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// The display side of the system. Implementations draw one snapshot;
/// failures are renderer-local and never reach the ingestion loop.
pub trait Renderer {
    fn draw(&mut self, snapshot: &TrackSnapshot) -> Result<()>;
}

/// Polls the track store at a fixed cadence and hands each snapshot to the
/// renderer.
pub struct RenderLoop<R> {
    store: TrackStore,
    renderer: R,
    interval: Duration,
    should_stop: Arc<AtomicBool>,
}

impl<R: Renderer> RenderLoop<R> {
    pub fn new(
        store: TrackStore,
        renderer: R,
        interval: Duration,
        should_stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            renderer,
            interval,
            should_stop,
        }
    }

    /// Run until the stop flag is raised (blocking).
    pub fn run(&mut self) {
        log::info!("render loop started ({:?} cadence)", self.interval);

        while !self.should_stop.load(Ordering::SeqCst) {
            let snapshot = self.store.snapshot();
            if let Err(e) = self.renderer.draw(&snapshot) {
                log::warn!("draw failed: {}", e);
            }
            thread::sleep(self.interval);
        }

        log::info!("render loop stopped");
    }
}

const BAR_CELLS: usize = 24;

/// Status-line renderer for a terminal: rewrites one line per draw with
/// identity, elapsed/length and a progress bar.
pub struct ConsoleRenderer<W = io::Stdout> {
    out: W,
    last_width: usize,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            last_width: 0,
        }
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out, last_width: 0 }
    }

    pub fn into_writer(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn draw(&mut self, snapshot: &TrackSnapshot) -> Result<()> {
        let filled = (snapshot.ratio * BAR_CELLS as f64).round() as usize;
        let bar: String = (0..BAR_CELLS)
            .map(|cell| if cell < filled { '#' } else { '-' })
            .collect();

        let line = format!(
            "{} by {} on {} [{}] {}/{}",
            snapshot.name,
            snapshot.artist,
            snapshot.album,
            bar,
            snapshot.elapsed_text(),
            snapshot.length_text(),
        );

        // Pad over whatever the previous, possibly longer, line left behind.
        let width = line.chars().count();
        let padding = self.last_width.saturating_sub(width);
        write!(self.out, "\r{}{}", line, " ".repeat(padding))
            .map_err(|e| NowPlayingError::Render(e.to_string()))?;
        self.out
            .flush()
            .map_err(|e| NowPlayingError::Render(e.to_string()))?;
        self.last_width = width;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TrackSnapshot {
        TrackSnapshot {
            name: "A".into(),
            album: "B".into(),
            artist: "C".into(),
            elapsed: Duration::from_secs(65),
            length: Duration::from_secs(210),
            ratio: 65.0 / 210.0,
            art: None,
        }
    }

    #[test]
    fn test_console_renderer_writes_progress_line() {
        let mut renderer = ConsoleRenderer::with_writer(Vec::new());
        renderer.draw(&snapshot()).unwrap();

        let line = String::from_utf8(renderer.into_writer()).unwrap();
        assert!(line.contains("A by C on B"));
        assert!(line.contains("01:05/03:30"));
    }

    #[test]
    fn test_console_renderer_pads_over_shorter_lines() {
        let mut renderer = ConsoleRenderer::with_writer(Vec::new());
        let mut long = snapshot();
        long.name = "A very long track title".into();
        renderer.draw(&long).unwrap();
        renderer.draw(&snapshot()).unwrap();

        let out = String::from_utf8(renderer.into_writer()).unwrap();
        let second = out.rsplit('\r').next().unwrap();
        assert!(second.ends_with(' '));
    }
}
