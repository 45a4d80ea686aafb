use thiserror::Error;

/// The main result type for embuddy-core operations.
pub type BuddyResult<T> = Result<T, BuddyError>;

/// Enum representing possible errors within the embuddy-core library.
#[derive(Error, Debug)]
pub enum BuddyError {
    /// Input is not well-formed structured text. `line` is 1-based.
    #[error("Format error on line {line}: {message}")]
    Format { line: usize, message: String },

    /// Well-formed input with missing required fields or wrong value shapes.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A caller violated the preconditions of combine/split.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No valid documents after transformation")]
    MappingExhausted,

    /// Reduced coordinates were computed from an older state of the session.
    #[error("Session changed since the reduction input was taken (input generation {given}, current {current})")]
    StaleGeneration { given: u64, current: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// An external collaborator (index client, reducer) reported a failure
    /// or returned output of the wrong shape.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuddyError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BuddyError::Format { .. } => "format",
            BuddyError::Schema(_) => "schema",
            BuddyError::Encoding(_) => "encoding",
            BuddyError::InvalidInput(_) => "invalid_input",
            BuddyError::MappingExhausted => "mapping_exhausted",
            BuddyError::StaleGeneration { .. } => "stale_generation",
            BuddyError::Configuration(_) => "configuration",
            BuddyError::PayloadTooLarge { .. } => "payload_too_large",
            BuddyError::Collaborator(_) => "collaborator",
            BuddyError::Internal(_) => "internal",
        }
    }
}

impl From<std::str::Utf8Error> for BuddyError {
    fn from(err: std::str::Utf8Error) -> Self {
        BuddyError::Encoding(format!(
            "input is not valid UTF-8 (invalid byte sequence at offset {})",
            err.valid_up_to()
        ))
    }
}

impl From<base64::DecodeError> for BuddyError {
    fn from(err: base64::DecodeError) -> Self {
        BuddyError::Encoding(format!("invalid base64 payload: {}", err))
    }
}
