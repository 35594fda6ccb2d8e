use config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while running an external utility as a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Spawning or draining the child failed at the I/O level.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The utility ran but exited non-zero. The exit code and output are
    /// not carried here; they already reached the line sink.
    #[error("{action} exited with an error")]
    Failed { action: String },

    /// An empty argument vector was supplied.
    #[error("no command given for action {action}")]
    EmptyCommand { action: String },
}

/// Failures in the backup/restore/export command layer.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The backup directory must exist before any utility writes into it;
    /// creating it is the caller's responsibility.
    #[error("backup directory does not exist: {0}")]
    MissingBackupDir(PathBuf),

    /// The file's suffix maps to no recognized dump format.
    #[error("unrecognized dump format for file: {0}")]
    UnknownFormat(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}
