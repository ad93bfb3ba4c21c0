use crossbeam::channel::{bounded, Receiver, Sender};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

/// An unreliable byte-at-a-time input channel with a pending-bytes poll.
///
/// `read_byte` may fail per byte; callers log and skip the bad byte rather
/// than abort. Calling it with nothing buffered is a `WouldBlock` error.
pub trait ByteSource {
    fn bytes_available(&mut self) -> usize;
    fn read_byte(&mut self) -> io::Result<u8>;
}

/// Production byte source: a reader thread pulls from the underlying stream
/// (typically a serial device node) and forwards bytes over a bounded
/// channel, so the consuming side can poll without ever blocking on the
/// device.
pub struct StreamSource {
    receiver: Receiver<io::Result<u8>>,
    pending: VecDeque<io::Result<u8>>,
    _handle: thread::JoinHandle<()>,
}

impl StreamSource {
    pub fn spawn<R: Read + Send + 'static>(reader: R) -> Self {
        let (sender, receiver) = bounded(4096);

        let handle = thread::spawn(move || Self::run_read_thread(reader, sender));

        Self {
            receiver,
            pending: VecDeque::new(),
            _handle: handle,
        }
    }

    fn run_read_thread<R: Read>(mut reader: R, sender: Sender<io::Result<u8>>) {
        let mut buf = [0u8; 256];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    log::info!("byte source reached end of stream");
                    break;
                }
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if sender.send(Ok(byte)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // A read error takes up one slot in the stream like a
                    // byte would; the consumer logs it and moves on.
                    if sender.send(Err(e)).is_err() {
                        return;
                    }
                    thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }
}

impl ByteSource for StreamSource {
    fn bytes_available(&mut self) -> usize {
        while let Ok(item) = self.receiver.try_recv() {
            self.pending.push_back(item);
        }
        self.pending.len()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        match self.pending.pop_front() {
            Some(item) => item,
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no bytes buffered")),
        }
    }
}

/// Scripted byte source for tests: bytes arrive in bursts, and the link
/// reports quiet once between bursts the way a real serial buffer drains.
pub struct ScriptedSource {
    bursts: VecDeque<Vec<Option<u8>>>,
    current: VecDeque<Option<u8>>,
    reported_quiet: bool,
}

impl ScriptedSource {
    pub fn new<I>(bursts: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        Self::scripted(
            bursts
                .into_iter()
                .map(|burst| burst.as_ref().iter().copied().map(Some).collect())
                .collect(),
        )
    }

    /// Bursts with explicit fault slots; a `None` entry injects a read
    /// error for that byte.
    pub fn scripted(bursts: Vec<Vec<Option<u8>>>) -> Self {
        Self {
            bursts: bursts.into(),
            current: VecDeque::new(),
            reported_quiet: true,
        }
    }
}

impl ByteSource for ScriptedSource {
    fn bytes_available(&mut self) -> usize {
        if self.current.is_empty() {
            if !self.reported_quiet {
                self.reported_quiet = true;
                return 0;
            }
            if let Some(next) = self.bursts.pop_front() {
                self.current = next.into();
                self.reported_quiet = false;
            }
        }
        self.current.len()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        match self.current.pop_front() {
            Some(Some(byte)) => Ok(byte),
            Some(None) => Err(io::Error::new(io::ErrorKind::Other, "scripted read fault")),
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no bytes buffered")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_stream_source_delivers_bytes_in_order() {
        let mut source = StreamSource::spawn(io::Cursor::new(b"abc".to_vec()));

        let deadline = Instant::now() + Duration::from_secs(2);
        while source.bytes_available() < 3 {
            assert!(Instant::now() < deadline, "reader thread never delivered");
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(source.read_byte().unwrap(), b'a');
        assert_eq!(source.read_byte().unwrap(), b'b');
        assert_eq!(source.read_byte().unwrap(), b'c');
        assert!(source.read_byte().is_err());
    }

    #[test]
    fn test_scripted_source_reports_quiet_between_bursts() {
        let mut source = ScriptedSource::new([b"ab".to_vec(), b"c".to_vec()]);

        assert_eq!(source.bytes_available(), 2);
        source.read_byte().unwrap();
        source.read_byte().unwrap();

        assert_eq!(source.bytes_available(), 0); // quiet gap
        assert_eq!(source.bytes_available(), 1); // next burst
        assert_eq!(source.read_byte().unwrap(), b'c');
        assert_eq!(source.bytes_available(), 0);
    }

    #[test]
    fn test_scripted_fault_slot_errors_once() {
        let mut source = ScriptedSource::scripted(vec![vec![Some(b'a'), None, Some(b'b')]]);

        assert_eq!(source.bytes_available(), 3);
        assert_eq!(source.read_byte().unwrap(), b'a');
        assert!(source.read_byte().is_err());
        assert_eq!(source.read_byte().unwrap(), b'b');
    }
}
