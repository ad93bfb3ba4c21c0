//! Turns the raw byte stream into discrete payloads.
//!
//! The sender announces each message with a `#<length>#` hello token, waits
//! for an `OK` ack, then streams exactly `<length>` payload bytes. The link
//! is slow and noisy, so accumulation is bounded by a timeout and whatever
//! arrived by then is still emitted. An alternative quiesce framing (every
//! quiet-delimited burst is one payload) is available for senders that skip
//! the handshake.

use crate::source::ByteSource;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Sent back over the link once a hello token has been accepted.
pub const ACK: &[u8] = b"OK\n";

/// Declared payload lengths above this are treated as line noise.
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("hello token not framed as #<length>#: {0:?}")]
    MalformedHello(String),

    #[error("hello token length is not a number: {0:?}")]
    BadLength(String),

    #[error("declared payload length {0} exceeds the sanity cap")]
    PayloadTooLarge(usize),

    #[error("failed to send ack: {0}")]
    Ack(#[from] std::io::Error),
}

/// Framing behavior. The defaults match the deployed link: `#<n>#`
/// handshake, 100 ms input polls, a 4 s bound on payload transfer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Length-prefixed `#<n>#` handshake framing; when off, every
    /// quiet-delimited burst is one payload.
    pub handshake: bool,
    /// How long to sleep when the link has nothing buffered.
    pub poll_interval: Duration,
    /// Bound on payload accumulation once a hello has been acked.
    pub payload_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            handshake: true,
            poll_interval: Duration::from_millis(100),
            payload_timeout: Duration::from_secs(4),
        }
    }
}

/// One framed payload plus how it arrived.
#[derive(Debug)]
pub struct Frame {
    pub payload: Vec<u8>,
    /// Length the hello token declared; `None` in quiesce mode.
    pub declared_len: Option<usize>,
    /// Accumulation hit the transfer timeout before `declared_len` arrived.
    pub timed_out: bool,
}

/// Reads frames off a byte source forever. Framing errors abandon the
/// current frame and the caller re-enters the handshake; they never wedge
/// the reader.
pub struct FrameReader<S, W> {
    source: S,
    ack: W,
    config: FrameConfig,
    should_stop: Arc<AtomicBool>,
}

impl<S: ByteSource, W: Write> FrameReader<S, W> {
    pub fn new(source: S, ack: W, config: FrameConfig, should_stop: Arc<AtomicBool>) -> Self {
        Self {
            source,
            ack,
            config,
            should_stop,
        }
    }

    /// Block until the next frame. `Ok(None)` means the stop flag was
    /// raised while waiting on the link.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if !self.wait_for_input() {
            return Ok(None);
        }

        let burst = self.drain_burst();

        if !self.config.handshake {
            log::debug!("read {} byte burst (no handshake)", burst.len());
            return Ok(Some(Frame {
                payload: burst,
                declared_len: None,
                timed_out: false,
            }));
        }

        let declared = parse_hello(&burst)?;
        log::debug!("hello accepted, expecting {} payload bytes", declared);

        self.ack.write_all(ACK)?;
        self.ack.flush()?;

        Ok(Some(self.accumulate(declared)))
    }

    /// Gather payload bytes until the declared length is reached or the
    /// transfer timeout elapses. Excess bytes stay buffered for the next
    /// hello.
    fn accumulate(&mut self, declared: usize) -> Frame {
        let mut payload = Vec::with_capacity(declared.min(4096));
        let deadline = Instant::now() + self.config.payload_timeout;
        let mut timed_out = false;

        loop {
            while payload.len() < declared && self.source.bytes_available() > 0 {
                match self.source.read_byte() {
                    Ok(byte) => payload.push(byte),
                    Err(e) => log::warn!("read error, skipping byte: {}", e),
                }
            }
            if payload.len() >= declared {
                break;
            }
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            thread::sleep(self.config.poll_interval);
        }

        if timed_out {
            log::warn!(
                "payload transfer timed out with {} of {} bytes, continuing with what arrived",
                payload.len(),
                declared
            );
        }

        Frame {
            payload,
            declared_len: Some(declared),
            timed_out,
        }
    }

    /// Poll until at least one byte is buffered. Returns false when stopped.
    fn wait_for_input(&mut self) -> bool {
        while self.source.bytes_available() == 0 {
            if self.should_stop.load(Ordering::SeqCst) {
                return false;
            }
            thread::sleep(self.config.poll_interval);
        }
        true
    }

    /// Drain everything currently buffered, skipping unreadable bytes.
    fn drain_burst(&mut self) -> Vec<u8> {
        let mut burst = Vec::new();
        while self.source.bytes_available() > 0 {
            match self.source.read_byte() {
                Ok(byte) => burst.push(byte),
                Err(e) => log::warn!("read error, skipping byte: {}", e),
            }
        }
        burst
    }
}

fn parse_hello(raw: &[u8]) -> Result<usize, FrameError> {
    if raw.len() < 3 || raw[0] != b'#' || raw[raw.len() - 1] != b'#' {
        return Err(FrameError::MalformedHello(
            String::from_utf8_lossy(raw).into_owned(),
        ));
    }

    let digits = &raw[1..raw.len() - 1];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::BadLength(
            String::from_utf8_lossy(raw).into_owned(),
        ));
    }

    let declared = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| FrameError::BadLength(String::from_utf8_lossy(raw).into_owned()))?;

    if declared > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(declared));
    }

    Ok(declared)
}
