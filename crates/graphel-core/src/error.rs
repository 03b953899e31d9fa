//! Error types for graphel operations.

use std::fmt;

/// The primary error type for all graphel operations.
#[derive(Debug)]
pub enum Error {
    /// API misuse (wrong phase, wrong state, unsupported mutation)
    Usage(UsageError),
    /// Dependency cycle among new objects
    Dependency(DependencyError),
    /// Value/pointer type mismatch
    Type(TypeError),
    /// Identifier parse errors
    IdParse(ParseIdError),
    /// Custom error with message
    Custom(String),
}

/// Raised when the caller drives the save machinery incorrectly.
#[derive(Debug)]
pub struct UsageError {
    pub kind: UsageErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageErrorKind {
    /// Attempted to compile an insert for an already-persisted object
    InsertPersisted,
    /// `feed_ids` called with no insert batch outstanding
    FeedOutOfPhase,
    /// `feed_ids` called with the wrong number of identifiers
    FeedCountMismatch,
    /// `commit` called before the plan was fully consumed
    CommitBeforeDone,
    /// An object was assigned a second, different identifier
    IdentifierReassigned,
    /// An identifier was needed before the server supplied it
    UnresolvedIdentifier,
    /// Attempted to remove a change-tracked field
    FieldRemoval,
    /// Attempted to mutate a computed or readonly pointer
    ImmutablePointer,
    /// Named pointer is not declared on the object type
    UnknownPointer,
    /// An update statement compiled to zero assignments
    EmptyUpdate,
}

/// Raised when topological batching cannot make progress.
#[derive(Debug)]
pub struct DependencyError {
    /// Human-readable descriptions of the objects stuck in the cycle
    pub stuck: Vec<String>,
    pub message: String,
}

/// Raised when a value does not conform to a declared pointer.
#[derive(Debug)]
pub struct TypeError {
    pub expected: String,
    pub actual: String,
    /// Pointer name, when the mismatch is tied to one
    pub pointer: Option<String>,
}

/// Raised when identifier text cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub input: String,
}

impl Error {
    pub fn usage(kind: UsageErrorKind, message: impl Into<String>) -> Self {
        Error::Usage(UsageError {
            kind,
            message: message.into(),
        })
    }

    pub fn type_mismatch(
        expected: impl Into<String>,
        actual: impl Into<String>,
        pointer: Option<&str>,
    ) -> Self {
        Error::Type(TypeError {
            expected: expected.into(),
            actual: actual.into(),
            pointer: pointer.map(str::to_owned),
        })
    }

    /// The usage-error kind, if this is a usage error.
    pub fn usage_kind(&self) -> Option<UsageErrorKind> {
        match self {
            Error::Usage(u) => Some(u.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Usage(e) => write!(f, "Usage error: {}", e.message),
            Error::Dependency(e) => write!(f, "Dependency error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::IdParse(e) => write!(f, "Identifier parse error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.stuck.join(", "))
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ptr) = &self.pointer {
            write!(
                f,
                "expected {} for pointer '{}', found {}",
                self.expected, ptr, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid object identifier: '{}'", self.input)
    }
}

impl std::error::Error for ParseIdError {}

impl From<UsageError> for Error {
    fn from(err: UsageError) -> Self {
        Error::Usage(err)
    }
}

impl From<DependencyError> for Error {
    fn from(err: DependencyError) -> Self {
        Error::Dependency(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ParseIdError> for Error {
    fn from(err: ParseIdError) -> Self {
        Error::IdParse(err)
    }
}

/// Result type alias for graphel operations.
pub type Result<T> = std::result::Result<T, Error>;
