// Error taxonomy shared by the core and its adapters
use thiserror::Error;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Rejected before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// A bare channel name matched more than one device under the strict policy.
    #[error("channel '{name}' is ambiguous, found in devices {devices:?}")]
    AmbiguousChannel { name: String, devices: Vec<String> },

    #[error("data source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
