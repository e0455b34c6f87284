use thiserror::Error;

/// Errors raised while enumerating devices or managing the capture stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The backend reported no host APIs or could not list devices. Fatal at startup.
    #[error("device enumeration failed: {0}")]
    DeviceEnumeration(String),

    #[error("no default input device")]
    NoDefaultInput,

    #[error("unknown host API {0}")]
    UnknownHostApi(usize),

    #[error("host API {host_api} has no device {index}")]
    UnknownDevice { host_api: usize, index: usize },

    #[error("device '{0}' has no input channels")]
    NotInputCapable(String),

    #[error("failed to open '{device}': {reason}")]
    StreamOpen { device: String, reason: String },

    #[error("capture has been shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, ScopeError>;
