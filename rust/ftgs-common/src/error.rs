use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns `true` if this error originates from the underlying storage/reader.
    pub fn is_data_access(&self) -> bool {
        matches!(self.kind(), ErrorKind::DataAccess { .. } | ErrorKind::Io { .. })
    }

    /// Returns `true` if this error reports an operation on a closed or exhausted
    /// object.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidState { .. })
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_state(operation: impl Into<String>, state: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidState {
                operation: operation.into(),
                state: state.into(),
            }
            .into(),
        )
    }

    pub fn data_access<E>(context: impl Into<String>, source: E) -> Error
    where
        E: Into<StdErrorBoxed>,
    {
        Error(
            ErrorKind::DataAccess {
                context: context.into(),
                source: source.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {operation} in state {state}")]
    InvalidState { operation: String, state: String },

    #[error("data access failure in '{context}': {source}")]
    DataAccess {
        context: String,
        source: StdErrorBoxed,
    },

    #[error("IO error for '{context}': {source}'")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}
