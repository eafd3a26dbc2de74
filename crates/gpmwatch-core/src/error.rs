//! Error types with actionable suggestions.
//!
//! Only startup failures (schedule, signal bank, handshake) ever reach the
//! user. Steady-state anomalies such as torn position reads are absorbed
//! where they happen and have no variant here.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Invalid input or unreachable target for the backoff scheduler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("retry count must be at least 1")]
    InvalidTries,

    #[error("timeout must be a positive, finite number of seconds (got {0})")]
    InvalidTimeout(f64),

    #[error("slack must be a positive, finite number of seconds (got {0})")]
    InvalidSlack(f64),

    #[error("no backoff parameter fits {tries} tries into {timeout}s")]
    Unreachable { tries: usize, timeout: f64 },

    #[error("backoff produced a negative delay ({delay}) at try {index}")]
    NegativeDelay { index: usize, delay: f64 },
}

impl ScheduleError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            ScheduleError::InvalidTries => "Pass --handshake-tries 1 or more",
            ScheduleError::InvalidTimeout(_) | ScheduleError::InvalidSlack(_) => {
                "Use a positive number of seconds"
            }
            ScheduleError::Unreachable { .. } | ScheduleError::NegativeDelay { .. } => {
                "Use at least 3 tries, or a shorter timeout"
            }
        }
    }
}

/// The startup handshake with the producer failed.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Producer exited before creating the shared-memory object.
    #[error("gpm-track crashed during handshake ({status})")]
    Crashed {
        code: Option<i32>,
        status: ExitStatus,
    },

    /// Every retry elapsed without the shared-memory object appearing.
    #[error("gpm-track failed to create shm file: {}", path.display())]
    ChannelNeverCreated { path: PathBuf },

    /// Waiting on the producer itself failed.
    #[error("failed to wait on gpm-track: {0}")]
    Wait(#[source] std::io::Error),
}

impl HandshakeError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            HandshakeError::Crashed { .. } => {
                "Check that gpm is running and the tty is readable; run gpm-track directly to see its error"
            }
            HandshakeError::ChannelNeverCreated { .. } => {
                "Check that /dev/shm is writable, or raise --handshake-timeout"
            }
            HandshakeError::Wait(_) => "This is an internal error. Please report it if it persists.",
        }
    }
}

/// The signal bank cannot be reserved on this platform or process.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("no real-time signal space: have [{rt_min} - {rt_max}], need [{first} - {last}]")]
    OutOfRange {
        rt_min: i32,
        rt_max: i32,
        first: i32,
        last: i32,
    },

    #[error("failed to register signal {signo}: {source}")]
    Register {
        signo: i32,
        #[source]
        source: std::io::Error,
    },
}

impl BankError {
    pub fn suggestion(&self) -> &'static str {
        match self {
            BankError::OutOfRange { .. } => "gpm-track needs a kernel with SIGRTMIN <= 40",
            BankError::Register { .. } => {
                "Another component may own this signal; make sure nothing else handles real-time signals"
            }
        }
    }
}

/// Append the suggestion to an error message, the way it is shown to users.
pub fn with_hint(message: impl std::fmt::Display, suggestion: &str) -> String {
    format!("{} (hint: {})", message, suggestion)
}
