use thiserror::Error;

/// Status codes carried in `ResponseHeader::error`.
///
/// The numeric values are part of the wire contract and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Success = 0,
    InvalidArgument = 1,
    NotFound = 2,
    AlreadyExists = 3,
    Unavailable = 4,
    Internal = 5,
}

impl StatusCode {
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::InvalidArgument),
            2 => Some(Self::NotFound),
            3 => Some(Self::AlreadyExists),
            4 => Some(Self::Unavailable),
            5 => Some(Self::Internal),
            _ => None,
        }
    }

    /// Transient failures may be retried by the caller without side effects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    #[error("Table '{0}' already exists")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MetaError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyExists(_) => StatusCode::AlreadyExists,
            Self::NotFound(_) => StatusCode::NotFound,
            Self::InvalidArgument(_) => StatusCode::InvalidArgument,
            Self::Unavailable(_) => StatusCode::Unavailable,
            Self::Internal(_) => StatusCode::Internal,
        }
    }

    /// Rebuilds an error from a status channel entry.
    ///
    /// Unknown codes and `Success` are reported as `Internal`.
    pub fn from_status(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match StatusCode::from_i32(code) {
            Some(StatusCode::AlreadyExists) => Self::AlreadyExists(message),
            Some(StatusCode::NotFound) => Self::NotFound(message),
            Some(StatusCode::InvalidArgument) => Self::InvalidArgument(message),
            Some(StatusCode::Unavailable) => Self::Unavailable(message),
            _ => Self::Internal(message),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.status_code().is_retryable()
    }

    /// The message without the variant prefix, as sent in `HeaderError::err_msg`.
    pub fn message(&self) -> &str {
        match self {
            Self::AlreadyExists(msg)
            | Self::NotFound(msg)
            | Self::InvalidArgument(msg)
            | Self::Unavailable(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetaError>;

impl<T> From<std::sync::PoisonError<T>> for MetaError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Unavailable(format!("lock poisoned: {}", err))
    }
}

impl From<std::io::Error> for MetaError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(format!("I/O error: {}", err))
    }
}
