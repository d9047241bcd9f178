//! Verdict interpretation: reducing a response sequence to a scan result.

use crate::protocol::{ResponseLine, Status};

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// Data is clean.
    Clean,
    /// A threat was detected.
    Infected {
        /// Signature name reported by the daemon.
        signature: String,
    },
    /// The scan could not produce a trustworthy verdict.
    Error {
        /// Raw evidence for logging.
        reason: String,
    },
}

impl ScanResult {
    /// File is clean.
    pub fn is_clean(&self) -> bool {
        matches!(self, ScanResult::Clean)
    }

    /// A threat was detected.
    pub fn is_infected(&self) -> bool {
        matches!(self, ScanResult::Infected { .. })
    }

    /// Build an error result from anything displayable.
    pub fn error(reason: impl std::fmt::Display) -> Self {
        ScanResult::Error {
            reason: reason.to_string(),
        }
    }

    /// Process exit code under the clamscan contract: 0 clean, 1 infected,
    /// 2 scanner or protocol error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScanResult::Clean => 0,
            ScanResult::Infected { .. } => 1,
            ScanResult::Error { .. } => 2,
        }
    }

    /// The single machine-readable result line printed by the CLI.
    pub fn summary_line(&self) -> String {
        match self {
            ScanResult::Clean => "Data: OK".to_string(),
            ScanResult::Infected { signature } => format!("Infected: {} FOUND", signature),
            ScanResult::Error { .. } => "Unknown: ERROR".to_string(),
        }
    }
}

/// Reduce an ordered response sequence to a final verdict.
///
/// The first VIRUS line wins and its last whitespace-delimited token is the
/// signature name. Otherwise a "DONE OK" terminal means clean. Anything
/// else, including an unrecognized terminal or a sequence that never
/// reached one, is an error; uncertainty must never read as clean.
pub fn reduce(responses: &[ResponseLine]) -> ScanResult {
    for line in responses {
        if line.status == Status::Virus {
            return match line.raw.split_whitespace().last() {
                Some(signature) if signature != "VIRUS" => ScanResult::Infected {
                    signature: signature.to_string(),
                },
                _ => ScanResult::error(format!("detection without signature: {:?}", line.raw)),
            };
        }
    }

    match responses.iter().find(|l| l.is_terminal()) {
        Some(line)
            if line.status == Status::Done
                && line.text().split_whitespace().next() == Some("OK") =>
        {
            ScanResult::Clean
        }
        Some(line) => ScanResult::error(format!("scan failed: {}", line.raw)),
        None => ScanResult::error("response sequence ended without a terminal status"),
    }
}

/// All signature names in a response sequence, in order of arrival.
///
/// `reduce` reports only the first; callers log the rest.
pub fn signatures(responses: &[ResponseLine]) -> Vec<&str> {
    responses
        .iter()
        .filter(|l| l.status == Status::Virus)
        .filter_map(|l| l.raw.split_whitespace().last())
        .filter(|s| *s != "VIRUS")
        .collect()
}
