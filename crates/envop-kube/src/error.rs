//! Error types for envop-kube

use thiserror::Error;

/// Result type for envop-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while mapping services or talking to the cluster
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Volume is missing its name or mount path
    #[error("service '{service}': volume must have both name and path set (name: '{name}', path: '{path}')")]
    InvalidVolume {
        service: String,
        name: String,
        path: String,
    },

    /// Options contain a value with no wire representation
    #[error("service '{service}': option '{path}' cannot be serialized: {message}")]
    InvalidOptions {
        service: String,
        path: String,
        message: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Object handed to a client has no name
    #[error("{kind} object has no name")]
    MissingName { kind: String },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment model error
    #[error("environment error: {0}")]
    Core(#[from] envop_core::CoreError),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this error comes from an invalid service definition
    pub fn is_validation(&self) -> bool {
        matches!(self, KubeError::InvalidVolume { .. })
    }

    /// Check if a payload could not be encoded or decoded
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            KubeError::InvalidOptions { .. } | KubeError::Serialization(_)
        )
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }
}
