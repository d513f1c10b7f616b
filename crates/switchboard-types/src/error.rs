use thiserror::Error;

/// Errors produced by the gateway protocol client.
///
/// All variants carry owned strings so the error can be cloned into the
/// client's fatal signal and handed to every observer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Discovery or dial failure.
    #[error("could not connect to gateway: {0}")]
    Connect(String),

    /// A frame could not be decoded. Recovered locally.
    #[error("bad frame from gateway: {0}")]
    Decode(String),

    /// Heartbeat acknowledgement lost, or recovery exhausted.
    #[error("gateway session error: {0}")]
    Session(String),

    /// The server closed the stream with a non-resumable close code.
    #[error("gateway closed with non-resumable code {code}: {reason}")]
    FatalClose { code: u16, reason: String },

    /// Transport-level read failure (including the stream ending).
    #[error("gateway read failed: {0}")]
    Read(String),

    /// Outbound frame could not be written. Recovered locally.
    #[error("gateway write failed: {0}")]
    Write(String),

    /// A REST call to the platform failed.
    #[error("gateway request failed: {0}")]
    Http(String),
}

/// Errors surfaced by buses, reactors, and the hub itself.
#[derive(Debug, Clone, Error)]
pub enum HubError {
    /// Clean, deliberate stop. Callers must not treat this as a failure.
    #[error("shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{component} failed: {message}")]
    Component { component: String, message: String },

    #[error("duplicate component name '{0}'")]
    DuplicateName(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("task '{0}' panicked")]
    Panicked(String),
}

impl HubError {
    /// Build a component failure with the component's name attached.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        HubError::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this is the shutdown sentinel.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, HubError::ShuttingDown)
    }
}

impl From<std::io::Error> for HubError {
    fn from(err: std::io::Error) -> Self {
        HubError::Io(err.to_string())
    }
}
