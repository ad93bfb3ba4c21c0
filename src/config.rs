use crate::frame::FrameConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "nowplaying-edge")]
#[command(about = "Displays now-playing track info received over a serial link")]
pub struct Args {
    /// Serial device to read track updates from
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    pub device: PathBuf,

    /// Skip the #<length># handshake and treat each quiet gap as a frame boundary
    #[arg(long)]
    pub no_handshake: bool,

    /// Seconds to keep accumulating a payload before continuing with what arrived
    #[arg(long, default_value_t = 4)]
    pub payload_timeout: u64,

    /// Milliseconds between input polls while the link is quiet
    #[arg(long, default_value_t = 100)]
    pub poll_ms: u64,

    /// Milliseconds between display refreshes
    #[arg(long, default_value_t = 500)]
    pub refresh_ms: u64,
}

impl Args {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            handshake: !self.no_handshake,
            poll_interval: Duration::from_millis(self.poll_ms),
            payload_timeout: Duration::from_secs(self.payload_timeout),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_link_defaults() {
        let args = Args::parse_from(["nowplaying-edge"]);
        let config = args.frame_config();
        assert!(config.handshake);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.payload_timeout, Duration::from_secs(4));
        assert_eq!(args.refresh_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_no_handshake_flag() {
        let args = Args::parse_from(["nowplaying-edge", "--no-handshake"]);
        assert!(!args.frame_config().handshake);
    }
}
