use thiserror::Error;

/// Unified error type for Portico.
#[derive(Error, Debug)]
pub enum PorticoError {
    #[error("Unknown filter kind: {0}")]
    UnknownFilter(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Access log writer already started")]
    WriterStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config load error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Internal: {0}")]
    Internal(String),
}

impl From<figment::Error> for PorticoError {
    fn from(e: figment::Error) -> Self {
        PorticoError::Figment(Box::new(e))
    }
}

impl PorticoError {
    /// Whether the error comes from bad operator input (config, unknown kinds)
    /// rather than from the runtime environment.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PorticoError::UnknownFilter(_)
                | PorticoError::Config(_)
                | PorticoError::Serde(_)
                | PorticoError::Figment(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PorticoError>;
