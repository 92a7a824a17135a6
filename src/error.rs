use std::path::PathBuf;

/// Error categories surfaced to callers of the engine and of the service layer.
///
/// Each kind has a stable code string, used in logs and by the transport
/// layer to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    PreconditionFailed,
    NotValid,
    NoRoute,
    DeadlineExceeded,
    Internal,
}

string_enum!(ErrorKind {
    InvalidArgument => "invalid-argument",
    NotFound => "not-found",
    AlreadyExists => "already-exists",
    PermissionDenied => "permission-denied",
    PreconditionFailed => "precondition-failed",
    NotValid => "not-valid",
    NoRoute => "no-route",
    DeadlineExceeded => "deadline-exceeded",
    Internal => "internal",
});

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("{what} already exists: {id}")]
    AlreadyExists { what: &'static str, id: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("invalid state: {0}")]
    NotValid(String),

    #[error("no route from {src} to {dst} on map '{map}'")]
    NoRoute { map: String, src: u64, dst: u64 },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::Json { .. } => ErrorKind::InvalidArgument,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Error::NotValid(_) => ErrorKind::NotValid,
            Error::NoRoute { .. } => ErrorKind::NoRoute,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Internal(_) | Error::Io { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(what: &'static str, id: impl ToString) -> Self {
        Error::AlreadyExists {
            what,
            id: id.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}
