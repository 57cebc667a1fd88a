use thiserror::Error;

/// Coarse classification of a storage or queue failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    NotFound,
    AccessDenied,
    Other,
}

/// Failure reported by an object store or message queue adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdapterError {
    kind: AdapterErrorKind,
    message: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Other, message)
    }

    pub fn kind(&self) -> AdapterErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The step of a stage that failed, carrying the original error.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("reading object failed: {0}")]
    Read(#[source] AdapterError),
    #[error("writing object failed: {0}")]
    Write(#[source] AdapterError),
    #[error("enqueueing message failed: {0}")]
    Enqueue(#[source] AdapterError),
    #[error("listing objects failed: {0}")]
    List(#[source] AdapterError),
    #[error("deleting objects failed: {0}")]
    Delete(#[source] AdapterError),
    #[error("custom object is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("custom object could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

impl FailureCause {
    /// Adapter error behind this cause, if the failing step was an I/O call.
    pub fn adapter_error(&self) -> Option<&AdapterError> {
        match self {
            Self::Read(error)
            | Self::Write(error)
            | Self::Enqueue(error)
            | Self::List(error)
            | Self::Delete(error) => Some(error),
            Self::Decode(_) | Self::Encode(_) => None,
        }
    }
}

/// Error returned by the observed-operation envelope.
///
/// The display form only names the operation; the original failure stays
/// reachable through [`OperationError::cause`] and `Error::source`.
#[derive(Debug, Error)]
#[error("{operation} is failed")]
pub struct OperationError {
    operation: String,
    #[source]
    cause: FailureCause,
}

impl OperationError {
    pub fn new(operation: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            operation: operation.into(),
            cause,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn cause(&self) -> &FailureCause {
        &self.cause
    }
}

/// Inbound event could not be interpreted.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event payload must include a Records array")]
    MissingRecords,
    #[error("record {index} is missing {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("record {index} has a malformed message body: {source}")]
    MalformedBody {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}
