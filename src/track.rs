//! The one shared mutable resource: the currently playing track, its
//! progress anchor and its art, plus the clock math the renderer reads.

use crate::message::{PartialUpdate, TrackInfoUpdate};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

pub const ART_WIDTH: usize = 45;
pub const ART_HEIGHT: usize = 45;
pub const ART_PIXELS: usize = ART_WIDTH * ART_HEIGHT;

/// Monochrome 45x45 album art, one bool per pixel, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct AlbumArt {
    pixels: Box<[bool; ART_PIXELS]>,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("art bitmap has {got} entries, expected exactly {expected}")]
pub struct ArtSizeError {
    pub expected: usize,
    pub got: usize,
}

impl AlbumArt {
    /// Build from a flat pixel array; zero is unset, anything else is set.
    /// The array must hold exactly [`ART_PIXELS`] entries; any other count
    /// is rejected wholesale, never truncated or padded.
    pub fn from_values(values: &[i64]) -> Result<Self, ArtSizeError> {
        if values.len() != ART_PIXELS {
            return Err(ArtSizeError {
                expected: ART_PIXELS,
                got: values.len(),
            });
        }

        let mut pixels = Box::new([false; ART_PIXELS]);
        for (pixel, value) in pixels.iter_mut().zip(values) {
            *pixel = *value != 0;
        }

        Ok(Self { pixels })
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[y * ART_WIDTH + x]
    }

    pub fn pixels(&self) -> &[bool] {
        &self.pixels[..]
    }

    pub fn set_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }
}

impl fmt::Debug for AlbumArt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlbumArt({}x{}, {} set)",
            ART_WIDTH,
            ART_HEIGHT,
            self.set_count()
        )
    }
}

/// The moment progress was last merged plus how far into the track playback
/// was at that moment. Elapsed time derives from the monotonic clock, so
/// periodic updates cannot accumulate drift and the anchor can never sit in
/// the future.
#[derive(Debug, Clone, Copy)]
struct ProgressAnchor {
    anchored_at: Instant,
    offset: Duration,
}

impl ProgressAnchor {
    fn elapsed(&self) -> Duration {
        self.offset + self.anchored_at.elapsed()
    }
}

/// The currently playing track.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub album: String,
    pub artist: String,
    pub length: Duration,
    anchor: Option<ProgressAnchor>,
    pub art: Option<AlbumArt>,
}

impl Track {
    /// Identity shown before the first update arrives.
    pub fn placeholder() -> Self {
        Self {
            name: "No Music".to_string(),
            album: "Unknown Album".to_string(),
            artist: "Nobody".to_string(),
            length: Duration::ZERO,
            anchor: None,
            art: None,
        }
    }

    /// Time into the track; zero until progress has been merged once.
    pub fn elapsed(&self) -> Duration {
        self.anchor.map(|a| a.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Completion in `[0, 1]`. Zero-length tracks report zero; elapsed past
    /// the end clamps to one.
    pub fn ratio(&self) -> f64 {
        if self.length.is_zero() {
            return 0.0;
        }
        (self.elapsed().as_secs_f64() / self.length.as_secs_f64()).clamp(0.0, 1.0)
    }

    fn merge_info(&mut self, info: TrackInfoUpdate) {
        self.name = info.name;
        self.album = info.album;
        self.artist = info.artist;
        self.length = info.length;
    }

    fn anchor_progress(&mut self, elapsed: Duration) {
        self.anchor = Some(ProgressAnchor {
            anchored_at: Instant::now(),
            offset: elapsed,
        });
    }
}

/// Cloneable handle to the canonical [`Track`]. The ingestion loop is the
/// sole writer, the render loop the sole reader; each merge and each
/// snapshot is one short critical section, so a reader never observes a
/// half-written track.
#[derive(Clone)]
pub struct TrackStore {
    inner: Arc<Mutex<Track>>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Track::placeholder())),
        }
    }

    /// Replace identity fields and duration as a unit. Progress anchor and
    /// art are untouched.
    pub fn merge_track_info(&self, name: String, album: String, artist: String, length: Duration) {
        self.inner.lock().unwrap().merge_info(TrackInfoUpdate {
            name,
            album,
            artist,
            length,
        });
    }

    /// Re-anchor progress so that elapsed time reads `elapsed` right now.
    pub fn set_progress(&self, elapsed: Duration) {
        self.inner.lock().unwrap().anchor_progress(elapsed);
    }

    /// Replace the art bitmap wholesale.
    pub fn set_art(&self, art: AlbumArt) {
        self.inner.lock().unwrap().art = Some(art);
    }

    /// Apply every sub-record present in one decoded message under a single
    /// lock acquisition.
    pub fn apply(&self, update: PartialUpdate) {
        let mut track = self.inner.lock().unwrap();
        if let Some(info) = update.track {
            log::debug!("merging track info: {:?} by {:?}", info.name, info.artist);
            track.merge_info(info);
        }
        if let Some(elapsed) = update.progress {
            log::debug!("re-anchoring progress at {:?} elapsed", elapsed);
            track.anchor_progress(elapsed);
        }
        if let Some(art) = update.art {
            log::debug!("replacing {:?}", art);
            track.art = Some(art);
        }
    }

    /// Consistent read-only view for the renderer.
    pub fn snapshot(&self) -> TrackSnapshot {
        let track = self.inner.lock().unwrap();
        TrackSnapshot {
            name: track.name.clone(),
            album: track.album.clone(),
            artist: track.artist.clone(),
            elapsed: track.elapsed(),
            length: track.length,
            ratio: track.ratio(),
            art: track.art.clone(),
        }
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}

/// What the renderer consumes: identity, progress values and art captured
/// in one consistent read.
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub name: String,
    pub album: String,
    pub artist: String,
    pub elapsed: Duration,
    pub length: Duration,
    pub ratio: f64,
    pub art: Option<AlbumArt>,
}

impl TrackSnapshot {
    pub fn elapsed_text(&self) -> String {
        format_clock(self.elapsed)
    }

    pub fn length_text(&self) -> String {
        format_clock(self.length)
    }
}

/// `MM:SS` with seconds always two digits; minutes grow past two digits
/// rather than wrapping, so a 100-minute track shows `100:00`.
pub fn format_clock(d: Duration) -> String {
    let total = d.as_secs();
    format!("{:02}:{:02}", total / 60, total % 60)
}
