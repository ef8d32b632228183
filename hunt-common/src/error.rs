//! Common error types for the hunt services

use thiserror::Error;

/// Common result type for hunt operations
pub type Result<T> = std::result::Result<T, Error>;

/// Membership and uniqueness conflicts
///
/// These are expected outcomes that callers remediate differently, so each
/// one is reported separately rather than folded into a generic failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Caller already belongs to a team
    #[error("user is already in a team")]
    AlreadyInTeam,

    /// Team has reached its member capacity
    #[error("team already has the maximum of {capacity} participants")]
    TeamFull { capacity: u32 },

    /// Caller does not belong to any team
    #[error("user is not part of a team")]
    NotInTeam,

    /// Generated team code clashed with an existing one
    #[error("team code collision")]
    CodeCollision,
}

/// Common error types across hunt services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested user or question group not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No team is registered under the given code
    #[error("Team not found: {0}")]
    TeamNotFound(String),

    /// Membership or uniqueness conflict
    #[error("Conflict: {0}")]
    Conflict(#[from] Conflict),

    /// Credential rejected or caller lacks the required role
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error category, used by transport layers to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    Store,
    InvalidInput,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) | Error::TeamNotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Database(_) => ErrorKind::Store,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Io(_) | Error::Config(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for SQLite lock contention (busy / busy snapshot)
    ///
    /// A transaction that failed this way rolled back cleanly and can be
    /// re-run from the start.
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                if let Some(code) = db_err.as_database_error().and_then(|e| e.code()) {
                    if code == "5" || code == "517" || code == "6" {
                        return true;
                    }
                }
                db_err.to_string().contains("database is locked")
            }
            _ => false,
        }
    }
}
