use thiserror::Error;

/// Errors produced while compiling records into engine objects
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown server type: {0}")]
    UnknownType(String),

    #[error("no server is enabled")]
    NoActiveServer,

    #[error("invalid {kind} server data: {source}")]
    InvalidData {
        kind: &'static str,
        #[source]
        source: HydrateError,
    },
}

/// Errors produced while merging a stored record over its default shape
#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("stored {0} is not a JSON object")]
    NotAnObject(&'static str),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced while decoding a single share line
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("expected prefix {0}")]
    BadPrefix(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record has no hash field")]
    MissingHash,

    #[error("share link has no {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Server(#[from] CompileError),

    #[error(transparent)]
    Hydrate(#[from] HydrateError),
}

/// Errors raised when an edited record is rejected on save
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("domain rule needs at least one domain")]
    EmptyDomain,

    #[error("ip rule needs at least one ip")]
    EmptyIp,

    #[error("multi rule needs at least one condition")]
    EmptyConditions,
}

/// Errors from the save-then-restart sequence
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to save engine config")]
    SaveFailed,

    #[error("engine restart failed")]
    RestartFailed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
