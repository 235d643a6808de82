use thiserror::Error;

use crate::config::ConfigError;

/// Core error types for the schema generator
#[derive(Debug, Error)]
pub enum Error {
    /// A raw ABI type string is outside the supported grammar
    #[error("Unsupported type '{type_name}' at {path}: {reason}")]
    UnsupportedType {
        /// Dotted path of the offending field, starting at the event name
        path: String,
        /// The raw type string as it appeared in the ABI
        type_name: String,
        /// Why the type was rejected
        reason: String,
    },

    /// Two structurally different entities synthesized the same name
    #[error("Name collision on '{name}': {detail}")]
    NameCollision {
        /// The colliding table, column or fingerprint
        name: String,
        /// What collided with what
        detail: String,
    },

    /// Nested tuples exceed the configured recursion ceiling
    #[error("Nesting at {path} exceeds the maximum depth of {limit}")]
    NestingTooDeep {
        /// Path of the field where the ceiling was hit
        path: String,
        /// Configured ceiling
        limit: usize,
    },

    /// The disposable schema engine could not start or apply DDL
    #[error("Schema engine error: {0}")]
    EngineInitialization(String),

    /// An operation ran before its setup step
    #[error("{0} is not initialized")]
    NotInitialized(String),

    /// Error when parsing input documents
    #[error("Failed to parse data: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure while reading inputs or writing outputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any failure raised while processing one contract
    #[error("contract '{contract}': {source}")]
    InContract {
        /// Contract being processed
        contract: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new engine error
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        Error::EngineInitialization(msg.into())
    }

    /// Create a new name collision error
    pub fn collision<N: Into<String>, D: Into<String>>(name: N, detail: D) -> Self {
        Error::NameCollision {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Attach the contract being processed to this error
    pub fn in_contract<S: Into<String>>(self, contract: S) -> Self {
        Error::InContract {
            contract: contract.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping contract context
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::InContract { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(format!("JSON parsing error: {}", err))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type used throughout the generator
pub type Result<T> = std::result::Result<T, Error>;
