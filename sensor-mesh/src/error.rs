//! Error types for the sensor mesh

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Sensor mesh error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (socket or file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be rendered to TOML
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Unknown sensor kind name
    #[error("Invalid sensor kind: {0:?} (expected temperature, humidity or air_quality)")]
    InvalidSensorKind(String),

    /// Unknown IP version selector
    #[error("Invalid IP version: {0:?} (expected v4 or v6)")]
    InvalidIpVersion(String),

    /// Coordinates outside the 10x10 grid
    #[error("Coordinates ({x},{y}) out of range 0-9")]
    CoordinateOutOfRange {
        /// Column
        x: i32,
        /// Row
        y: i32,
    },

    /// Report bytes that do not describe a valid report
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    /// Read returned fewer bytes than one full report
    #[error("Truncated report: expected {expected} bytes, got {actual}")]
    TruncatedReport {
        /// Full record size
        expected: usize,
        /// Bytes actually read
        actual: usize,
    },

    /// Peer closed the connection
    #[error("Connection closed by peer")]
    Disconnected,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A worker thread panicked
    #[error("Thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the error means the peer went away rather than misbehaved.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Disconnected => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
