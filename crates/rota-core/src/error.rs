use std::fmt;

use crate::lock::LockError;
use crate::model::{PersonId, RecordId};

/// Machine-readable error codes for scripted callers and chat front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    EmptyRoster,
    RecordNotFound,
    NoMatchingChore,
    InvalidRecord,
    UnknownPerson,
    SessionNotFound,
    CorruptStore,
    NotificationFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::EmptyRoster => "E2001",
            Self::RecordNotFound => "E2002",
            Self::NoMatchingChore => "E2003",
            Self::InvalidRecord => "E2004",
            Self::UnknownPerson => "E2005",
            Self::SessionNotFound => "E2006",
            Self::CorruptStore => "E3001",
            Self::NotificationFailed => "E4001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Household not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::EmptyRoster => "Roster is empty",
            Self::RecordNotFound => "Assignment record not found",
            Self::NoMatchingChore => "No chore matches the request",
            Self::InvalidRecord => "Assignment record violates an invariant",
            Self::UnknownPerson => "Person is not on the roster",
            Self::SessionNotFound => "No active share session",
            Self::CorruptStore => "Corrupt assignment store",
            Self::NotificationFailed => "Notification delivery failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to the household.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `rota init` to create .rota/config.toml."),
            Self::ConfigParseError => Some("Fix syntax in .rota/config.toml and retry."),
            Self::EmptyRoster => Some("Add at least one [[people]] entry to the config."),
            Self::RecordNotFound => None,
            Self::NoMatchingChore => {
                Some("Name a configured chore title or category (see `rota status`).")
            }
            Self::InvalidRecord => Some("Check the assignees of the record being written."),
            Self::UnknownPerson => Some("Use a person id from the [[people]] config section."),
            Self::SessionNotFound => Some("Start a new selection; sessions expire after a few minutes."),
            Self::CorruptStore => Some("Restore .rota/rota.sqlite3 from a backup."),
            Self::NotificationFailed => Some("The ledger was updated; the message was not sent."),
            Self::LockContention => Some("Retry after the other `rota` process finishes."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the core rota operations.
#[derive(Debug, thiserror::Error)]
pub enum RotaError {
    /// Roster or chore list missing or malformed. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Allocation was requested with nobody to assign chores to.
    #[error("cannot allocate chores: the roster is empty")]
    EmptyRoster,

    #[error("assignment record {0} not found")]
    RecordNotFound(RecordId),

    /// An ad-hoc trigger named a chore that is not configured.
    #[error("no configured chore matches '{0}'")]
    NoMatchingChore(String),

    #[error("invalid assignment record: {0}")]
    InvalidRecord(String),

    #[error("'{0}' is not on the roster")]
    UnknownPerson(PersonId),

    /// A share selection was continued after it expired or was never started.
    #[error("no active share session for '{0}'")]
    NoActiveSession(String),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RotaError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::ConfigParseError,
            Self::EmptyRoster => ErrorCode::EmptyRoster,
            Self::RecordNotFound(_) => ErrorCode::RecordNotFound,
            Self::NoMatchingChore(_) => ErrorCode::NoMatchingChore,
            Self::InvalidRecord(_) => ErrorCode::InvalidRecord,
            Self::UnknownPerson(_) => ErrorCode::UnknownPerson,
            Self::NoActiveSession(_) => ErrorCode::SessionNotFound,
            Self::Store(_) => ErrorCode::CorruptStore,
            Self::Notification(_) => ErrorCode::NotificationFailed,
            Self::Lock(err) => err.code(),
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Stable string form of [`Self::code`].
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        self.code().code()
    }

    /// Remediation text, falling back to the code's summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.code()
            .hint()
            .unwrap_or_else(|| self.code().message())
            .to_string()
    }

    /// Whether the process should stop rather than report and carry on.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Delivery failure from a [`crate::notify::Notifier`]. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to deliver to {target}: {reason}")]
pub struct NotificationError {
    pub target: String,
    pub reason: String,
}

impl NotificationError {
    #[must_use]
    pub fn new(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = RotaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, RotaError};
    use crate::model::RecordId;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::EmptyRoster,
            ErrorCode::RecordNotFound,
            ErrorCode::NoMatchingChore,
            ErrorCode::InvalidRecord,
            ErrorCode::UnknownPerson,
            ErrorCode::SessionNotFound,
            ErrorCode::CorruptStore,
            ErrorCode::NotificationFailed,
            ErrorCode::LockContention,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::NoMatchingChore.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(RotaError::Configuration("no people".into()).is_fatal());
        assert!(!RotaError::EmptyRoster.is_fatal());
        assert!(!RotaError::NoMatchingChore("laundry".into()).is_fatal());
    }

    #[test]
    fn suggestion_falls_back_to_message() {
        let err = RotaError::RecordNotFound(RecordId(7));
        assert_eq!(err.suggestion(), "Assignment record not found");
        assert_eq!(err.error_code(), "E2002");
    }
}
