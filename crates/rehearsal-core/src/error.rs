use std::fmt;

/// Machine-readable error codes shared by the HTTP layer, the CLI, and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingBookingField,
    InvalidDate,
    InvalidRequest,
    ConfigParseError,
    StoreUnavailable,
    StoreLockPoisoned,
    CorruptSchedule,
    CutoverFailed,
    SchedulerLockHeld,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingBookingField => "E1001",
            Self::InvalidDate => "E1002",
            Self::InvalidRequest => "E1003",
            Self::ConfigParseError => "E2001",
            Self::StoreUnavailable => "E3001",
            Self::StoreLockPoisoned => "E3002",
            Self::CorruptSchedule => "E3003",
            Self::CutoverFailed => "E4001",
            Self::SchedulerLockHeld => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingBookingField => "Name, band name, and time slot are required",
            Self::InvalidDate => "Invalid calendar date",
            Self::InvalidRequest => "Malformed request",
            Self::ConfigParseError => "Config file parse error",
            Self::StoreUnavailable => "Schedule store unavailable",
            Self::StoreLockPoisoned => "Schedule store lock poisoned",
            Self::CorruptSchedule => "Corrupt schedule data",
            Self::CutoverFailed => "Cutover failed and was rolled back",
            Self::SchedulerLockHeld => "Weekly scheduler already running",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingBookingField => Some("Fill in your name, band name, and a time slot."),
            Self::InvalidDate => Some("Use a real calendar date in YYYY-MM-DD form."),
            Self::InvalidRequest => None,
            Self::ConfigParseError => Some("Fix syntax in rehearsal.toml and retry."),
            Self::StoreUnavailable => {
                Some("Check that the database file exists and is writable, then retry.")
            }
            Self::StoreLockPoisoned => Some("Restart the server process."),
            Self::CorruptSchedule => {
                Some("Inspect the slot tables; a row holds a value this binary cannot read.")
            }
            Self::CutoverFailed => Some(
                "Staged changes are still pending. Retry with `rehearsal apply-now` or wait for the next weekly cutover.",
            ),
            Self::SchedulerLockHeld => {
                Some("Another `rehearsal serve` process owns the weekly cutover for this database.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the schedule store, the cutover engine, and the booking API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied bad input. Never fatal.
    #[error("{message}")]
    Validation { code: ErrorCode, message: String },

    /// The underlying SQLite database rejected or could not serve a call.
    #[error("{context}: {source}")]
    StoreUnavailable {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to prepare database location {path}: {source}")]
    StoreIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("schedule store lock poisoned")]
    LockPoisoned,

    #[error("corrupt schedule data: {0}")]
    Corrupt(String),

    /// A cutover transition aborted; nothing it did was committed.
    #[error("cutover rolled back: {source}")]
    CutoverFailure {
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn cutover(source: Self) -> Self {
        match source {
            already @ Self::CutoverFailure { .. } => already,
            other => Self::CutoverFailure {
                source: Box::new(other),
            },
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::StoreUnavailable { .. } | Self::StoreIo { .. } => ErrorCode::StoreUnavailable,
            Self::LockPoisoned => ErrorCode::StoreLockPoisoned,
            Self::Corrupt(_) => ErrorCode::CorruptSchedule,
            Self::CutoverFailure { .. } => ErrorCode::CutoverFailed,
        }
    }

    /// True for errors caused by the caller's input rather than the system.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Attach context to raw `rusqlite` results, turning them into
/// [`Error::StoreUnavailable`].
pub(crate) trait StoreContext<T> {
    fn store_context(self, context: &str) -> Result<T>;
}

impl<T> StoreContext<T> for rusqlite::Result<T> {
    fn store_context(self, context: &str) -> Result<T> {
        self.map_err(|source| Error::StoreUnavailable {
            context: context.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode};
    use std::collections::HashSet;

    const ALL: [ErrorCode; 10] = [
        ErrorCode::MissingBookingField,
        ErrorCode::InvalidDate,
        ErrorCode::InvalidRequest,
        ErrorCode::ConfigParseError,
        ErrorCode::StoreUnavailable,
        ErrorCode::StoreLockPoisoned,
        ErrorCode::CorruptSchedule,
        ErrorCode::CutoverFailed,
        ErrorCode::SchedulerLockHeld,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let text = code.code();
            assert_eq!(text.len(), 5);
            assert!(text.starts_with('E'));
            assert!(text.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn cutover_wrapping_does_not_nest() {
        let inner = Error::Corrupt("bad action".into());
        let once = Error::cutover(inner);
        let twice = Error::cutover(once);
        assert_eq!(twice.code(), ErrorCode::CutoverFailed);
        match twice {
            Error::CutoverFailure { source } => {
                assert_eq!(source.code(), ErrorCode::CorruptSchedule);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn validation_errors_display_their_message() {
        let err = Error::validation(ErrorCode::InvalidDate, "2024-2-30 is not a date");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "2024-2-30 is not a date");
    }
}
