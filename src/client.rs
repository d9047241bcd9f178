//! High-level scan client: one fresh session per operation.
//!
//! Matches the one-shot shape of the CLI: every scan acquires its own
//! connection, runs the whole conversation (handshake, self-test, scan,
//! metadata queries, BYE) and tears it down. No pooling, no shared state
//! across scans.

use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SsspError;
use crate::session::Session;
use crate::verdict::ScanResult;

/// SSSP scan client.
pub struct SsspClient {
    config: Config,
}

impl SsspClient {
    /// Create a new client. Nothing is connected until an operation runs.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Verify the daemon is reachable and its engine is loaded.
    ///
    /// Opens and closes a full session; returns `false` on any failure,
    /// including an absent socket.
    pub async fn selftest(&self) -> bool {
        match Session::connect(&self.config.sssp).await {
            Ok(mut session) => {
                let ok = session.selftest().await;
                if let Err(e) = session.bye().await {
                    debug!(error = %e, "BYE after selftest failed");
                }
                ok
            }
            Err(e) => {
                debug!(error = %e, "selftest connect failed");
                false
            }
        }
    }

    /// Scan an in-memory buffer.
    pub async fn scan_bytes(&self, label: &str, data: &[u8]) -> ScanResult {
        self.scan_stream(label, data, data.len() as u64).await
    }

    /// Scan a byte stream of known length.
    ///
    /// Never returns a fault: every connect, transport, or protocol error
    /// collapses into `ScanResult::Error`. Uncertainty is reported as an
    /// error verdict, never as clean.
    pub async fn scan_stream<R>(&self, label: &str, reader: R, length: u64) -> ScanResult
    where
        R: AsyncRead + Unpin,
    {
        if length > self.config.sssp.max_scan_size {
            warn!(
                file = %label,
                size = length,
                max = self.config.sssp.max_scan_size,
                "input exceeds the maximum scan size, not scanning"
            );
            return ScanResult::error(format!(
                "input size {} exceeds maximum {}",
                length, self.config.sssp.max_scan_size
            ));
        }

        match self.run_conversation(label, reader, length).await {
            Ok(result) => {
                self.log_outcome(label, &result);
                result
            }
            Err(e) => {
                warn!(file = %label, error = %e, "SSSP scan failed");
                ScanResult::error(e)
            }
        }
    }

    async fn run_conversation<R>(
        &self,
        label: &str,
        reader: R,
        length: u64,
    ) -> Result<ScanResult, SsspError>
    where
        R: AsyncRead + Unpin,
    {
        let mut session = Session::connect(&self.config.sssp).await?;

        if !session.selftest().await {
            warn!(file = %label, "SAVDI selftest failed, not scanning");
            let _ = session.bye().await;
            return Ok(ScanResult::error("SAVDI selftest failed"));
        }

        let result = session.scan_stream(reader, length).await?;

        // Best-effort metadata for the logs; failure here never disturbs
        // the verdict.
        match session.query_engine().await {
            Ok(info) => debug!(engine_version = ?info.version(), "engine metadata"),
            Err(e) => debug!(error = %e, "engine query failed"),
        }
        match session.query_server().await {
            Ok(info) => debug!(server_version = ?info.version(), "server metadata"),
            Err(e) => debug!(error = %e, "server query failed"),
        }

        if let Err(e) = session.bye().await {
            debug!(error = %e, "BYE failed");
        }

        Ok(result)
    }

    fn log_outcome(&self, label: &str, result: &ScanResult) {
        match result {
            ScanResult::Clean => {
                if self.config.settings.log_clean {
                    info!(file = %label, "scan complete, clean");
                }
            }
            ScanResult::Infected { signature } => {
                if self.config.settings.log_detections {
                    info!(file = %label, signature = %signature, "infection reported by SAVDI");
                }
            }
            ScanResult::Error { reason } => {
                warn!(file = %label, reason = %reason, "scan error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SsspConfig;

    #[tokio::test]
    async fn test_oversized_input_refused_without_daemon() {
        let config = Config {
            sssp: SsspConfig {
                max_scan_size: 16,
                ..SsspConfig::default()
            },
            ..Config::default()
        };
        let client = SsspClient::new(config);
        let data = vec![0u8; 17];
        let result = client.scan_bytes("big.bin", &data).await;
        assert!(matches!(result, ScanResult::Error { .. }));
    }

    #[tokio::test]
    async fn test_selftest_false_when_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            sssp: SsspConfig {
                socket_path: dir.path().join("absent.sock"),
                timeout_ms: 200,
                ..SsspConfig::default()
            },
            ..Config::default()
        };
        let client = SsspClient::new(config);
        assert!(!client.selftest().await);
    }

    #[tokio::test]
    async fn test_scan_unreachable_daemon_is_error_not_clean() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            sssp: SsspConfig {
                socket_path: dir.path().join("absent.sock"),
                timeout_ms: 200,
                ..SsspConfig::default()
            },
            ..Config::default()
        };
        let client = SsspClient::new(config);
        let result = client.scan_bytes("data.bin", b"hello").await;
        assert!(matches!(result, ScanResult::Error { .. }));
        assert!(!result.is_clean());
    }
}
