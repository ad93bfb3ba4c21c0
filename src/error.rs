use crate::frame::FrameError;
use crate::message::{DecodeError, DurationParseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NowPlayingError>;

#[derive(Error, Debug)]
pub enum NowPlayingError {
    #[error("Framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Duration error: {0}")]
    Duration(#[from] DurationParseError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
