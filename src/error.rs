// Error kinds for everything above the decoder.
//
// A failure is always local to one slice or one command: workers turn
// it into a Failed event, the viewer into a missing slice.

use gray16_png::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Downscale tool missing, failed, or wrote something unreadable.
    #[error("external tool: {0}")]
    ExternalTool(String),

    /// Archive unreachable or answered with a non-success status.
    #[error("fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("transport: {0}")]
    Transport(String),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
