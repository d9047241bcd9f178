//! Unix socket transport with a line-oriented request/response discipline.
//!
//! Every operation is bounded by the configured timeout so an unresponsive
//! daemon surfaces as an error instead of hanging the caller. The transport
//! moves bytes and interprets nothing; dropping it closes the socket, so
//! the connection is released on every exit path.

use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::error::SsspError;

/// An open channel to the daemon.
pub struct Transport {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl Transport {
    /// Connect to the daemon socket.
    ///
    /// An absent socket, refused connection, or permission failure is
    /// reported as `ConnectionFailed`, distinct from mid-exchange faults.
    pub async fn connect(path: &Path, io_timeout: Duration) -> Result<Self, SsspError> {
        let stream = match timeout(io_timeout, UnixStream::connect(path)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(SsspError::ConnectionFailed(e)),
            Err(_) => return Err(SsspError::Timeout),
        };

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout: io_timeout,
        })
    }

    /// Read one response line, with the CRLF or LF terminator stripped.
    ///
    /// EOF means the daemon hung up mid-session and is an I/O error.
    pub async fn read_line(&mut self) -> Result<String, SsspError> {
        let mut line = String::new();
        let n = match timeout(self.timeout, self.reader.read_line(&mut line)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(SsspError::Io(e)),
            Err(_) => return Err(SsspError::Timeout),
        };

        if n == 0 {
            return Err(SsspError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "daemon closed the connection",
            )));
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Write one request line, appending the terminator.
    pub async fn write_line(&mut self, line: &str) -> Result<(), SsspError> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write_all(&buf).await
    }

    /// Write raw bytes (command bodies).
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), SsspError> {
        match timeout(self.timeout, self.writer.write_all(bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SsspError::Io(e)),
            Err(_) => Err(SsspError::Timeout),
        }
    }

    /// Flush buffered writes to the socket.
    pub async fn flush(&mut self) -> Result<(), SsspError> {
        match timeout(self.timeout, self.writer.flush()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SsspError::Io(e)),
            Err(_) => Err(SsspError::Timeout),
        }
    }
}
