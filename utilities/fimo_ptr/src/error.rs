//! Error type of the handle layer.

/// Result type for handle operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type Payload = Box<dyn std::error::Error + Send + Sync>;

/// Error type for handle operations.
pub struct Error {
    repr: ErrorRepr,
}

impl Error {
    /// Creates a new error from a known kind of error as well as an arbitrary payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use fimo_ptr::{Error, ErrorKind};
    ///
    /// // errors can be created from strings
    /// let custom_error = Error::new(ErrorKind::QueryFailed, "transport closed");
    /// assert_eq!(custom_error.kind(), ErrorKind::QueryFailed);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Payload>,
    {
        Error {
            repr: ErrorRepr::Custom(Box::new(CustomError {
                kind,
                error: error.into(),
            })),
        }
    }

    /// Consumes the `Error`, returning its inner error (if any).
    ///
    /// If this [`Error`] was constructed via [`new`] then this function will
    /// return [`Some`], otherwise it will return [`None`].
    ///
    /// [`new`]: Error::new
    ///
    /// # Examples
    ///
    /// ```
    /// use fimo_ptr::{Error, ErrorKind};
    ///
    /// let simple: Error = ErrorKind::MissingCapability.into();
    /// assert!(simple.into_inner().is_none());
    ///
    /// let custom = Error::new(ErrorKind::QueryFailed, "oh no!");
    /// assert_eq!(custom.into_inner().unwrap().to_string(), "oh no!");
    /// ```
    pub fn into_inner(self) -> Option<Payload> {
        match self.repr {
            ErrorRepr::Simple(_) => None,
            ErrorRepr::Custom(c) => Some(c.error),
        }
    }

    /// Returns the corresponding [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Simple(kind) => kind,
            ErrorRepr::Custom(ref c) => c.kind,
        }
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self {
            repr: ErrorRepr::Simple(kind),
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.repr, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.repr {
            ErrorRepr::Simple(kind) => write!(f, "{}", kind.as_str()),
            ErrorRepr::Custom(ref c) => write!(f, "{}: {}", c.kind.as_str(), c.error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.repr {
            ErrorRepr::Simple(_) => None,
            ErrorRepr::Custom(ref c) => Some(&*c.error),
        }
    }
}

/// Kinds of errors raised by handles and cast requests.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// A null handle was dereferenced or used as a cast source, or a null literal
    /// other than zero was supplied.
    NullPointerAccess,
    /// The object does not support the requested capability.
    MissingCapability,
    /// Malformed input to a checked value conversion.
    InvalidArgument,
    /// The capability query itself failed.
    QueryFailed,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NullPointerAccess => "null pointer access",
            ErrorKind::MissingCapability => "capability not supported",
            ErrorKind::InvalidArgument => "invalid argument specified",
            ErrorKind::QueryFailed => "capability query failed",
        }
    }
}

enum ErrorRepr {
    Simple(ErrorKind),
    Custom(Box<CustomError>),
}

impl std::fmt::Debug for ErrorRepr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorRepr::Simple(kind) => f.debug_tuple("Kind").field(&kind).finish(),
            ErrorRepr::Custom(ref c) => std::fmt::Debug::fmt(&c, f),
        }
    }
}

#[derive(Debug)]
struct CustomError {
    kind: ErrorKind,
    error: Payload,
}
