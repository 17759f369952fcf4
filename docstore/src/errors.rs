use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for docstore operations.
///
/// The kinds describe *what went wrong* from the caller's point of view, not
/// which component raised the error. Optimistic-concurrency races
/// (`AlreadyExists`, `NotFound`, `FailedPrecondition`) are kept apart from
/// infrastructure failures (`Unknown`) so callers can retry the former.
///
/// # Examples
///
/// ```rust
/// use docstore::errors::{DocStoreError, ErrorKind, DocResult};
///
/// fn example() -> DocResult<()> {
///     Err(DocStoreError::new("field path is empty", ErrorKind::InvalidArgument))
/// }
/// assert!(example().is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum ErrorKind {
    /// Malformed field path, schema mismatch on typed decode or set, an
    /// impossible query, or a missing key on a write.
    InvalidArgument,
    /// A create precondition failed because the row exists.
    AlreadyExists,
    /// The row, or the revision a write expected, is absent.
    NotFound,
    /// A revision mismatch on a conditional write.
    FailedPrecondition,
    /// The backing store refused the caller.
    Unauthorized,
    /// The driver does not support the requested capability.
    Unimplemented,
    /// Any failure without a more specific classification.
    Unknown,
    /// A bug inside the core, e.g. a worker thread panicked.
    Internal,
}

impl ErrorKind {
    /// Returns `true` for kinds that are already part of the domain taxonomy
    /// and must pass through the core unchanged.
    pub fn is_domain(&self) -> bool {
        !matches!(self, ErrorKind::Unknown | ErrorKind::Internal)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::AlreadyExists => write!(f, "Already exists"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::FailedPrecondition => write!(f, "Failed precondition"),
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::Unimplemented => write!(f, "Unimplemented"),
            ErrorKind::Unknown => write!(f, "Unknown"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

/// Custom docstore error type.
///
/// `DocStoreError` carries a message, an [ErrorKind], an optional cause and
/// the backtrace captured where it was created.
///
/// # Examples
///
/// ```rust
/// use docstore::errors::{DocStoreError, ErrorKind};
///
/// let cause = DocStoreError::new("connection reset", ErrorKind::Unknown);
/// let err = DocStoreError::new_with_cause("put failed", ErrorKind::Unknown, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct DocStoreError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocStoreError>>,
    backtrace: Arc<Backtrace>,
}

impl DocStoreError {
    /// Creates a new `DocStoreError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocStoreError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `DocStoreError` that keeps `cause` in its chain.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocStoreError) -> Self {
        DocStoreError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Applies the propagation policy to an error coming back from a driver
    /// or a worker: domain kinds pass through unchanged, everything else is
    /// wrapped as [ErrorKind::Unknown] with the original kept as cause.
    pub fn wrap(err: DocStoreError) -> DocStoreError {
        if err.error_kind.is_domain() || err.error_kind == ErrorKind::Unknown {
            err
        } else {
            let message = err.message.clone();
            DocStoreError::new_with_cause(&message, ErrorKind::Unknown, err)
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocStoreError> {
        self.cause.as_deref()
    }
}

impl Display for DocStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})\nCaused by: {:?}", self.message, self.error_kind, cause),
            None => write!(f, "{} ({})\n{:?}", self.message, self.error_kind, self.backtrace),
        }
    }
}

impl Error for DocStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for docstore operations.
pub type DocResult<T> = Result<T, DocStoreError>;

#[cfg(feature = "serde")]
impl serde::de::Error for DocStoreError {
    fn custom<T: Display>(msg: T) -> Self {
        DocStoreError::new(&msg.to_string(), ErrorKind::InvalidArgument)
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for DocStoreError {
    fn custom<T: Display>(msg: T) -> Self {
        DocStoreError::new(&msg.to_string(), ErrorKind::InvalidArgument)
    }
}

impl From<std::num::TryFromIntError> for DocStoreError {
    fn from(err: std::num::TryFromIntError) -> Self {
        DocStoreError::new(
            &format!("Integer does not fit the target type: {}", err),
            ErrorKind::InvalidArgument,
        )
    }
}

impl From<std::string::FromUtf8Error> for DocStoreError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DocStoreError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::InvalidArgument,
        )
    }
}

impl From<std::num::ParseIntError> for DocStoreError {
    fn from(err: std::num::ParseIntError) -> Self {
        DocStoreError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidArgument,
        )
    }
}

/// One failed action of an [crate::action::ActionList] run.
#[derive(Clone, Debug)]
pub struct ActionFailure {
    /// Position of the action in the list as it was built.
    pub index: usize,
    /// What went wrong.
    pub error: DocStoreError,
}

/// The error returned by [crate::action::ActionList::run]: every failed
/// action, ordered by submission index. Actions not listed here succeeded.
#[derive(Clone, Debug)]
pub struct ActionListError {
    failures: Vec<ActionFailure>,
}

impl ActionListError {
    pub(crate) fn new(mut failures: Vec<ActionFailure>) -> Self {
        failures.sort_by_key(|f| f.index);
        ActionListError { failures }
    }

    pub fn failures(&self) -> &[ActionFailure] {
        &self.failures
    }

    /// Returns the error recorded for the action at `index`, if it failed.
    pub fn error_at(&self, index: usize) -> Option<&DocStoreError> {
        self.failures
            .iter()
            .find(|f| f.index == index)
            .map(|f| &f.error)
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapses the list into its first error. Used by the one-shot
    /// collection methods, which only ever carry a single action.
    pub fn into_first(self) -> DocStoreError {
        match self.failures.into_iter().next() {
            Some(failure) => failure.error,
            None => DocStoreError::new("Action list failed without errors", ErrorKind::Internal),
        }
    }
}

impl Display for ActionListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} action(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; [{}] {}: {}", failure.index, failure.error.kind(), failure.error)?;
        }
        Ok(())
    }
}

impl Error for ActionListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.failures.first().map(|f| &f.error as &(dyn Error + 'static))
    }
}
