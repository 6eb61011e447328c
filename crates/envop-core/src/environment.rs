//! Environment definition and loading
//!
//! An environment description is a YAML document listing named services. All
//! types here are plain values: they are built once per snapshot by the loader
//! and then only read by the differ and the resource mapper.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::options::Options;

/// A file holding every environment of a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentsFile {
    /// Project the environments belong to
    #[serde(default)]
    pub project: String,

    /// Environment definitions
    #[serde(default)]
    pub environments: Vec<Environment>,
}

impl EnvironmentsFile {
    /// Load an environments file from disk
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse an environments file and validate every environment in it
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: Self = serde_yaml::from_str(yaml)?;
        for env in &file.environments {
            env.validate()?;
        }
        Ok(file)
    }

    /// Get an environment by name
    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.environments
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| CoreError::EnvironmentNotFound {
                name: name.to_string(),
            })
    }
}

/// A named collection of services forming one deployable application stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,

    /// Target namespace
    #[serde(default)]
    pub namespace: String,

    /// Rollout strategy, not part of the desired state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentSettings>,

    #[serde(default)]
    pub services: Vec<Service>,

    /// Test definitions, not part of the desired state
    #[serde(default)]
    pub tests: Vec<Test>,
}

impl Environment {
    /// Parse a single environment from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let env: Self = serde_yaml::from_str(yaml)?;
        env.validate()?;
        Ok(env)
    }

    /// Get a service by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Check that every service is identifiable by name
    ///
    /// Environment variable names are not checked: duplicates are passed
    /// through to the workload untouched.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.services.len());
        for service in &self.services {
            if service.name.is_empty() {
                return Err(CoreError::InvalidEnvironment {
                    message: format!("environment '{}' has a service without a name", self.name),
                });
            }
            if !seen.insert(service.name.as_str()) {
                return Err(CoreError::InvalidEnvironment {
                    message: format!(
                        "environment '{}' defines service '{}' more than once",
                        self.name, service.name
                    ),
                });
            }
        }
        Ok(())
    }
}

/// One deployable unit within an environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,

    /// Application label
    #[serde(default)]
    pub application: String,

    #[serde(default)]
    pub version: String,

    /// Container and service port
    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub replicas: i32,

    /// Public host name routed to this service
    #[serde(default)]
    pub external_url: String,

    #[serde(default, rename = "env")]
    pub env_vars: Vec<EnvVar>,

    #[serde(default)]
    pub volumes: Vec<Volume>,

    /// Custom resource kind backing this service, if any
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Pass-through payload for the custom resource
    #[serde(default)]
    pub options: Options,

    /// Horizontal autoscaling bounds; when set the autoscaler owns `replicas`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpa: Option<Autoscaling>,

    /// Per-service rollout override, not part of the desired state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentSettings>,
}

impl Service {
    /// Whether the replica count is managed by an autoscaler
    pub fn is_autoscaled(&self) -> bool {
        self.hpa.is_some()
    }
}

/// Environment variable passed to the service container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Persistent volume mounted into the service container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(default)]
    pub name: String,

    /// Mount path inside the container
    #[serde(default)]
    pub path: String,

    /// Access mode (defaults to ReadWriteOnce)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<String>,

    /// Storage request (defaults to 1Gi)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl Volume {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Autoscaling bounds for a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autoscaling {
    #[serde(default)]
    pub min_replicas: i32,

    #[serde(default)]
    pub max_replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpu_utilization_percentage: Option<i32>,
}

/// Orchestration strategy metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Rollout method (e.g. "rolling-upgrade", "bluegreen")
    #[serde(default)]
    pub method: String,

    /// Active colour for blue/green rollouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

/// Named test descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub name: String,

    #[serde(default)]
    pub repository: String,

    #[serde(default)]
    pub branch: String,

    #[serde(default)]
    pub commands: Vec<String>,
}
