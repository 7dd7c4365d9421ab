use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Rescan interval must be greater than zero")]
    ZeroInterval,

    #[error("No command file extensions configured (languages: {0})")]
    NoExtensions(String),

    #[error("Invalid language setup '{0}': expected name=ext[,ext...]")]
    InvalidLanguage(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
