//! Error handling for the GPU Pulse telemetry crate.

/// A specialized `Result` type for GPU Pulse operations.
pub type Result<T> = std::result::Result<T, PulseError>;

/// The main error type for GPU Pulse operations.
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    /// No compatible data source (driver missing, no devices). Startup-only.
    #[error("Metric source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single device could not be probed this cycle.
    #[error("Probe failed for device {index}: {reason}")]
    ProbeFailed { index: u32, reason: String },

    /// Terminal or dashboard formatting failed
    #[error("Render failed: {0}")]
    RenderFailed(String),

    /// The HTTP endpoint could not bind its listening socket
    #[error("Failed to bind HTTP endpoint on {addr}: {source}")]
    EndpointBindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus registry operation failed
    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PulseError {
    /// Create a new source unavailable error
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Create a new probe failure for a device index
    pub fn probe_failed(index: u32, reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            index,
            reason: reason.into(),
        }
    }

    /// Create a new render error
    pub fn render_error(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    /// Create a new bind failure for the given address
    pub fn bind_failed(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::EndpointBindFailed {
            addr: addr.into(),
            source,
        }
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
