use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    InvalidInput,
    /// Buffer handed to the frame decoder is shorter than the frame it describes.
    ShortRead,
    /// Storage returned fewer bytes than a frame needs.
    ReadError,
    /// Payload bytes passed their checksum but do not decode into a record.
    MalformedPayload,
    /// An inverted substore refused a read or write.
    IndexError,
    /// A record broke a model invariant; raised before any write happens.
    InvariantViolation,
    /// Another handle already owns the data files.
    Locked,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn short_read(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::ShortRead, context.into())
    }

    pub fn read_error(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::ReadError, context.into())
    }

    pub fn malformed(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::MalformedPayload, context.into())
    }

    pub fn index_error(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::IndexError, context.into())
    }

    pub fn invariant(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvariantViolation, context.into())
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::MalformedPayload,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::IndexError,
            context: format!("substore entry: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
