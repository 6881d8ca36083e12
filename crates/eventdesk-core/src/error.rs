use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown item kind: {0}")]
    UnknownKind(String),
}

impl CoreError {
    /// Short error code string, used as the process exit reason in the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::UnknownKind(_) => "UNKNOWN_KIND",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
