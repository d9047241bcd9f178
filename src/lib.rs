//! SSSP client for scanning data with a Sophos SAVDI daemon.
//!
//! Talks the Sophos Simple Scanning Protocol over a local Unix socket:
//! connection handshake, SCANDATA file submission, verdict interpretation
//! and clean shutdown. The `clamscan-sssp` binary wraps this in a
//! ClamAV-compatible command line surface.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod verdict;

pub use client::SsspClient;
pub use config::{Config, Settings, SsspConfig};
pub use error::SsspError;
pub use protocol::{Command, DaemonInfo, ResponseLine, Status};
pub use session::Session;
pub use transport::Transport;
pub use verdict::{reduce, ScanResult};
