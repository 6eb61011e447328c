//! Operator configuration
//!
//! Configuration is read from a YAML file and then overridden by the
//! `NAMESPACE`, `PROJECT` and `DOCKER_REGISTRY` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{KubeError, Result};

/// Default field manager for server-side apply
pub const DEFAULT_FIELD_MANAGER: &str = "environment-operator";

/// Operator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    /// Namespace the operator manages
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Project name, passed through to the mapper
    #[serde(default)]
    pub project: String,

    /// Docker registry, passed through to the mapper
    #[serde(default)]
    pub docker_registry: String,

    /// Field manager name for server-side apply
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_field_manager() -> String {
    DEFAULT_FIELD_MANAGER.to_string()
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            project: String::new(),
            docker_registry: String::new(),
            field_manager: default_field_manager(),
        }
    }
}

impl OperatorConfig {
    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from an optional path, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) if p.exists() => Self::load_from(p)?,
            _ => Self::default(),
        };
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup("NAMESPACE").filter(|v| !v.is_empty()) {
            self.namespace = namespace;
        }
        if let Some(project) = lookup("PROJECT") {
            self.project = project;
        }
        if let Some(registry) = lookup("DOCKER_REGISTRY") {
            self.docker_registry = registry;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(KubeError::InvalidConfig("namespace must not be empty".to_string()));
        }
        if self.field_manager.is_empty() {
            return Err(KubeError::InvalidConfig(
                "fieldManager must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Pass-through settings for the resource mapper
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            project: self.project.clone(),
            docker_registry: self.docker_registry.clone(),
        }
    }
}

/// Settings handed to the mapper unchanged
///
/// The mapper does not interpret these; they are available to image
/// resolvers working on its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperConfig {
    pub project: String,
    pub docker_registry: String,
}
