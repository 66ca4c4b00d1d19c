/// Result alias that carries the custom [`ViewerError`] type.
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Common error type for the core crate.
///
/// Failures that belong to a running viewing session (transport, decode,
/// context loss) are not surfaced here; they are folded into
/// [`crate::lifecycle::LoadState`] so the facade can render them. This type
/// covers API misuse and plumbing around the session: configuration problems,
/// file IO in the packing tools, and JSON serialisation.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// The supplied [`crate::config::ViewerConfig`] cannot drive a session.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A scene handed to the container encoder is internally inconsistent.
    #[error("cannot encode asset: {0}")]
    Encode(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON encode/decode errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl ViewerError {
    /// Creates a configuration error from the provided message.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}
