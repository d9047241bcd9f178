//! Error types for SSSP client operations.

/// Error from SSSP client operations.
#[derive(Debug)]
pub enum SsspError {
    /// Connection to the SAVDI socket failed.
    ConnectionFailed(std::io::Error),
    /// Timeout during connect or a protocol exchange.
    Timeout,
    /// I/O error mid-exchange (disconnect, short write).
    Io(std::io::Error),
    /// Malformed or unexpected response from the daemon.
    Protocol(String),
}

impl std::fmt::Display for SsspError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SsspError::ConnectionFailed(e) => write!(f, "Connection to SAVDI failed: {}", e),
            SsspError::Timeout => write!(f, "SSSP exchange timed out"),
            SsspError::Io(e) => write!(f, "I/O error: {}", e),
            SsspError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for SsspError {}

impl From<std::io::Error> for SsspError {
    fn from(e: std::io::Error) -> Self {
        SsspError::Io(e)
    }
}
