//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Environment '{name}' not found")]
    EnvironmentNotFound { name: String },

    #[error("Invalid environment: {message}")]
    InvalidEnvironment { message: String },

    #[error("Failed to parse environment file: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
