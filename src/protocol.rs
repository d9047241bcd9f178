//! SSSP wire codec: command encoding and response decoding.
//!
//! The SSSP exchange is line oriented:
//! 1. Daemon greets with "OK SSSP/1.0"
//! 2. Client announces "SSSP/1.0", daemon accepts with "ACC <ref>"
//! 3. "SCANDATA <length>" is accepted with "ACC <ref>", followed by exactly
//!    `length` raw bytes, then zero or more event lines ("VIRUS <name> ...")
//!    and a terminal "DONE OK <code> <text>" or "DONE FAIL <code> <text>"
//! 4. "QUERY ENGINE" / "QUERY SERVER" are accepted with "ACC <ref>" and
//!    answered with "key: value" lines terminated by one empty line
//! 5. "BYE" is answered with "BYE"
//!
//! The daemon terminates lines with CRLF; decoding accepts CRLF or LF.

use std::collections::HashMap;

/// A request unit sent to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Protocol version announcement sent after the greeting.
    Version,
    /// Submit a byte stream of the given length for scanning.
    ScanData {
        /// Exact number of raw bytes that follow the command line.
        length: u64,
    },
    /// Query engine metadata (versions, loaded virus data).
    QueryEngine,
    /// Query server metadata.
    QueryServer,
    /// End the session.
    Bye,
}

impl Command {
    /// Encode the command as a protocol line, without the terminator.
    pub fn encode(&self) -> String {
        match self {
            Command::Version => "SSSP/1.0".to_string(),
            Command::ScanData { length } => format!("SCANDATA {}", length),
            Command::QueryEngine => "QUERY ENGINE".to_string(),
            Command::QueryServer => "QUERY SERVER".to_string(),
            Command::Bye => "BYE".to_string(),
        }
    }
}

/// Status token leading a daemon response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// General acknowledgment, also leads the connect greeting.
    Ok,
    /// Command accepted.
    Acc,
    /// Protocol version rejected.
    Rej,
    /// Detection event carrying a signature name.
    Virus,
    /// Command rejected or failed outright.
    Fail,
    /// Terminal line closing a scan response sequence.
    Done,
    /// Session end acknowledgment.
    Bye,
    /// Anything not recognized above. Never dropped; reduces to an error.
    Unknown,
}

/// One line of daemon output, split into a status token and the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// Parsed leading token.
    pub status: Status,
    /// The full line as received, terminator stripped.
    pub raw: String,
}

impl ResponseLine {
    /// Parse one line of daemon output.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let status = match line.split_whitespace().next() {
            Some("OK") => Status::Ok,
            Some("ACC") => Status::Acc,
            Some("REJ") => Status::Rej,
            Some("VIRUS") => Status::Virus,
            Some("FAIL") => Status::Fail,
            Some("DONE") => Status::Done,
            Some("BYE") => Status::Bye,
            _ => Status::Unknown,
        };
        Self {
            status,
            raw: line.to_string(),
        }
    }

    /// The free-text remainder after the status token.
    pub fn text(&self) -> &str {
        match self.raw.split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim_start(),
            None => "",
        }
    }

    /// Whether this line closes a response sequence.
    ///
    /// DONE closes a scan, FAIL rejects a command outright, REJ rejects
    /// the protocol version. Unknown tokens are treated as terminal so a
    /// garbled daemon cannot keep the client reading forever.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            Status::Done | Status::Fail | Status::Rej | Status::Unknown
        )
    }
}

/// Key-value metadata returned by a QUERY command.
///
/// Engine and server queries share this shape; the daemon answers both
/// with "key: value" lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonInfo {
    attributes: HashMap<String, String>,
}

impl DaemonInfo {
    /// Build from the body lines of a QUERY response.
    ///
    /// Lines without a colon are ignored; repeated keys keep the last value.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut attributes = HashMap::new();
        for line in lines {
            if let Some((key, value)) = line.as_ref().split_once(':') {
                attributes.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { attributes }
    }

    /// Look up an attribute by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// Reported version, if the daemon sent one.
    pub fn version(&self) -> Option<&str> {
        self.get("version")
    }

    /// Whether the query returned any attributes at all.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
