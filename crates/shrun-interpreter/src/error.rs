//! Error types for the interpreter and its hooks

use shrun_ast::Position;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a run.
///
/// `Exit` and `Return` are control-flow sentinels rather than failures:
/// `Return` never leaves the function that raised it, and `Exit(0)` is
/// reported as success by [`crate::Runner::run`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("exit status {0}")]
    Exit(u8),

    #[error("returned")]
    Return(u8),

    #[error("{}", located(.filename, .pos, .text))]
    Runtime {
        filename: String,
        pos: Position,
        text: String,
    },

    #[error("{}", located(.filename, .pos, .text))]
    Unhandled {
        filename: String,
        pos: Position,
        text: String,
    },

    #[error("interpreter cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Exec(anyhow::Error),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("{0}")]
    Config(String),

    #[error("runner has already interpreted a program")]
    AlreadyRun,
}

impl RunError {
    /// Whether this is an internal signalling value rather than a failure
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        matches!(self, Self::Exit(_) | Self::Return(_))
    }

    /// Exit status a process running this program should report
    #[must_use]
    pub const fn exit_status(&self) -> u8 {
        match self {
            Self::Exit(code) | Self::Return(code) => *code,
            _ => 1,
        }
    }
}

fn located(filename: &str, pos: &Position, text: &str) -> String {
    match (filename.is_empty(), pos.is_valid()) {
        (_, false) if filename.is_empty() => text.to_string(),
        (_, false) => format!("{filename}: {text}"),
        (true, true) => format!("{pos}: {text}"),
        (false, true) => format!("{filename}:{pos}: {text}"),
    }
}

/// Failure reported by an [`crate::OpenHook`]
#[derive(Debug, Error)]
pub enum OpenError {
    /// The path could not be opened; reported to stderr and downgraded to exit status 1
    #[error("open {}: {source}", .path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Anything else; fatal for the run
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by an [`crate::ExecHook`]
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command ran and exited with this nonzero status
    #[error("exit status {0}")]
    Status(u8),

    /// The command could not be run at all; fatal for the run
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
