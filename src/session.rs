//! One SSSP conversation over one connection.
//!
//! The session lifecycle maps onto ownership: constructing a `Session`
//! performs the connect and version handshake, a live value is idle
//! between commands, and `bye()` consumes it for the polite shutdown.
//! Dropping a session on any error path closes the connection via the
//! transport, so the channel is released exactly once per conversation.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::config::SsspConfig;
use crate::error::SsspError;
use crate::protocol::{Command, DaemonInfo, ResponseLine, Status};
use crate::transport::Transport;
use crate::verdict::{reduce, signatures, ScanResult};

/// Upper bound on response lines read for a single command. A daemon
/// emitting more than this is misbehaving and gets cut off.
const MAX_RESPONSE_LINES: usize = 64;

/// An established, handshaken SSSP session.
pub struct Session {
    transport: Transport,
    chunk_size: usize,
}

impl Session {
    /// Connect to the daemon and perform the version handshake.
    ///
    /// Expects the "OK SSSP/1.0" greeting, announces our version and
    /// requires the daemon's ACC before the session is usable.
    pub async fn connect(config: &SsspConfig) -> Result<Self, SsspError> {
        let mut transport = Transport::connect(&config.socket_path, config.timeout()).await?;

        let greeting = ResponseLine::parse(&transport.read_line().await?);
        if greeting.status != Status::Ok || !greeting.text().starts_with("SSSP/") {
            return Err(SsspError::Protocol(format!(
                "unexpected greeting: {:?}",
                greeting.raw
            )));
        }

        transport.write_line(&Command::Version.encode()).await?;
        transport.flush().await?;

        let ack = ResponseLine::parse(&transport.read_line().await?);
        match ack.status {
            Status::Acc => {}
            Status::Rej => {
                return Err(SsspError::Protocol(format!(
                    "protocol version rejected: {}",
                    ack.raw
                )));
            }
            _ => {
                return Err(SsspError::Protocol(format!(
                    "unexpected handshake response: {:?}",
                    ack.raw
                )));
            }
        }

        debug!(socket = %config.socket_path.display(), "SSSP handshake complete");

        Ok(Self {
            transport,
            chunk_size: config.chunk_size,
        })
    }

    /// Verify the daemon is responsive and its engine is loaded.
    ///
    /// Returns `false` on any failure instead of propagating it, so
    /// callers can refuse to scan rather than abort.
    pub async fn selftest(&mut self) -> bool {
        match self.query_engine().await {
            Ok(info) if !info.is_empty() => true,
            Ok(_) => {
                debug!("engine query returned no attributes");
                false
            }
            Err(e) => {
                debug!(error = %e, "selftest query failed");
                false
            }
        }
    }

    /// Query engine metadata (versions, loaded virus data).
    pub async fn query_engine(&mut self) -> Result<DaemonInfo, SsspError> {
        self.query(Command::QueryEngine).await
    }

    /// Query server metadata.
    pub async fn query_server(&mut self) -> Result<DaemonInfo, SsspError> {
        self.query(Command::QueryServer).await
    }

    async fn query(&mut self, command: Command) -> Result<DaemonInfo, SsspError> {
        self.transport.write_line(&command.encode()).await?;
        self.transport.flush().await?;

        let ack = ResponseLine::parse(&self.transport.read_line().await?);
        if ack.status != Status::Acc {
            return Err(SsspError::Protocol(format!(
                "{} not accepted: {}",
                command.encode(),
                ack.raw
            )));
        }

        // The query body is "key: value" lines up to one empty line.
        let mut lines = Vec::new();
        loop {
            if lines.len() >= MAX_RESPONSE_LINES {
                return Err(SsspError::Protocol(
                    "query response exceeded the line limit".to_string(),
                ));
            }
            let line = self.transport.read_line().await?;
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }

        Ok(DaemonInfo::from_lines(&lines))
    }

    /// Scan an in-memory buffer.
    pub async fn scan_bytes(&mut self, data: &[u8]) -> Result<ScanResult, SsspError> {
        let length = data.len() as u64;
        self.scan_stream(data, length).await
    }

    /// Scan a byte stream of known length.
    ///
    /// Issues SCANDATA, streams exactly `length` bytes in chunks, then
    /// collects the response sequence and reduces it to a verdict. A FAIL
    /// rejection comes back as an error verdict, not a fault; the caller
    /// decides what to do with the session afterwards.
    pub async fn scan_stream<R>(
        &mut self,
        mut reader: R,
        length: u64,
    ) -> Result<ScanResult, SsspError>
    where
        R: AsyncRead + Unpin,
    {
        self.transport
            .write_line(&Command::ScanData { length }.encode())
            .await?;
        self.transport.flush().await?;

        let ack = ResponseLine::parse(&self.transport.read_line().await?);
        if ack.status != Status::Acc {
            return Ok(reduce(&[ack]));
        }

        // Stream the body. The declared length is a contract: the daemon
        // reads exactly that many bytes, so a short input is a protocol
        // error rather than a silently truncated scan.
        let mut buf = vec![0u8; self.chunk_size];
        let mut remaining = length;
        while remaining > 0 {
            let want = buf.len().min(remaining as usize);
            let n = reader.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(SsspError::Protocol(format!(
                    "input ended {} bytes short of the declared length",
                    remaining
                )));
            }
            self.transport.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }
        self.transport.flush().await?;

        let responses = self.collect_scan_responses().await?;

        let seen = signatures(&responses);
        for extra in seen.iter().skip(1) {
            warn!(signature = %extra, "additional detection in response sequence");
        }

        Ok(reduce(&responses))
    }

    /// Read response lines until a terminal status.
    async fn collect_scan_responses(&mut self) -> Result<Vec<ResponseLine>, SsspError> {
        let mut responses = Vec::new();
        for _ in 0..MAX_RESPONSE_LINES {
            let raw = self.transport.read_line().await?;
            if raw.is_empty() {
                continue;
            }
            let line = ResponseLine::parse(&raw);
            let terminal = line.is_terminal();
            responses.push(line);
            if terminal {
                return Ok(responses);
            }
        }
        Err(SsspError::Protocol(
            "scan response exceeded the line limit".to_string(),
        ))
    }

    /// End the session politely. Consumes the session; the connection is
    /// closed whether or not the daemon acknowledges.
    pub async fn bye(mut self) -> Result<(), SsspError> {
        self.transport.write_line(&Command::Bye.encode()).await?;
        self.transport.flush().await?;

        let line = ResponseLine::parse(&self.transport.read_line().await?);
        if line.status != Status::Bye {
            return Err(SsspError::Protocol(format!(
                "unexpected BYE response: {:?}",
                line.raw
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixListener;
    use tokio::task::JoinHandle;

    fn test_config(socket_path: PathBuf) -> SsspConfig {
        SsspConfig {
            socket_path,
            timeout_ms: 1000,
            chunk_size: 8,
            ..SsspConfig::default()
        }
    }

    /// Accept one connection and run `script` against it.
    fn spawn_stub<F, Fut>(listener: UnixListener, script: F) -> JoinHandle<()>
    where
        F: FnOnce(tokio::net::UnixStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            script(stream).await;
        })
    }

    #[tokio::test]
    async fn test_handshake_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("savdid.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let stub = spawn_stub(listener, |stream| async move {
            let (read_half, mut write) = stream.into_split();
            let mut read = BufReader::new(read_half);
            write.write_all(b"OK SSSP/1.0\r\n").await.unwrap();
            let mut line = String::new();
            read.read_line(&mut line).await.unwrap();
            assert_eq!(line.trim_end(), "SSSP/1.0");
            write.write_all(b"ACC 1/1\r\n").await.unwrap();
        });

        let session = Session::connect(&test_config(path)).await;
        assert!(session.is_ok());
        stub.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_rejected_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("savdid.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let stub = spawn_stub(listener, |stream| async move {
            let (read_half, mut write) = stream.into_split();
            let mut read = BufReader::new(read_half);
            write.write_all(b"OK SSSP/1.0\r\n").await.unwrap();
            let mut line = String::new();
            read.read_line(&mut line).await.unwrap();
            write.write_all(b"REJ 1/1\r\n").await.unwrap();
        });

        let result = Session::connect(&test_config(path)).await;
        assert!(matches!(result, Err(SsspError::Protocol(_))));
        stub.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_garbled_greeting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("savdid.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let stub = spawn_stub(listener, |mut stream| async move {
            stream.write_all(b"HELLO WORLD\r\n").await.unwrap();
        });

        let result = Session::connect(&test_config(path)).await;
        assert!(matches!(result, Err(SsspError::Protocol(_))));
        stub.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");
        let result = Session::connect(&test_config(path)).await;
        assert!(matches!(result, Err(SsspError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_scan_rejected_command_is_error_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("savdid.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let stub = spawn_stub(listener, |stream| async move {
            let (read_half, mut write) = stream.into_split();
            let mut read = BufReader::new(read_half);
            write.write_all(b"OK SSSP/1.0\r\n").await.unwrap();
            let mut line = String::new();
            read.read_line(&mut line).await.unwrap();
            write.write_all(b"ACC 1/1\r\n").await.unwrap();

            line.clear();
            read.read_line(&mut line).await.unwrap();
            assert!(line.starts_with("SCANDATA"));
            write
                .write_all(b"FAIL 0011 command not permitted\r\n")
                .await
                .unwrap();
        });

        let mut session = Session::connect(&test_config(path)).await.unwrap();
        let result = session.scan_bytes(b"data").await.unwrap();
        assert!(matches!(result, ScanResult::Error { .. }));
        stub.await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_short_input_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("savdid.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let stub = spawn_stub(listener, |stream| async move {
            let (read_half, mut write) = stream.into_split();
            let mut read = BufReader::new(read_half);
            write.write_all(b"OK SSSP/1.0\r\n").await.unwrap();
            let mut line = String::new();
            read.read_line(&mut line).await.unwrap();
            write.write_all(b"ACC 1/1\r\n").await.unwrap();

            line.clear();
            read.read_line(&mut line).await.unwrap();
            write.write_all(b"ACC 2/1\r\n").await.unwrap();
            // Hold the connection open while the client fails locally.
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let mut session = Session::connect(&test_config(path)).await.unwrap();
        // Declare more bytes than the reader can provide.
        let result = session.scan_stream(&b"short"[..], 100).await;
        assert!(matches!(result, Err(SsspError::Protocol(_))));
        stub.abort();
        let _ = stub.await;
    }
}
