use thiserror::Error;

pub type OrreryResult<T> = Result<T, OrreryError>;

#[derive(Debug, Error)]
pub enum OrreryError {
    #[error("body '{body}' is missing required field '{field}'")]
    MissingField { body: String, field: &'static str },

    #[error("more than one body is named '{0}'")]
    DuplicateName(String),

    #[error("bodies '{first}' and '{second}' occupy the same position")]
    DegenerateConfiguration { first: String, second: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("integration produced a non-finite state for body '{body}'")]
    NonFiniteState { body: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
}

impl OrreryError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        OrreryError::InvalidConfiguration(reason.into())
    }
}
