//! Envop Core - Environment model and change detection
//!
//! This crate provides the platform-neutral side of the environment operator:
//! - `Environment`: Named collection of services with deployment metadata
//! - `Service`: One deployable unit (workload + network identity)
//! - `Options`: Ordered, semi-structured pass-through payload for custom resources
//! - `DiffEngine`: Structural diff restricted to fields that affect desired cluster state

pub mod diff;
pub mod environment;
pub mod error;
pub mod options;

pub use diff::{
    AUTOSCALED_SERVICE_IGNORED_FIELDS, ChangeType, DiffEngine, ENVIRONMENT_IGNORED_FIELDS,
    EnvironmentDiff, FieldChange, SERVICE_IGNORED_FIELDS, compare, comparison_view,
};
pub use environment::{
    Autoscaling, DeploymentSettings, EnvVar, Environment, EnvironmentsFile, Service, Test, Volume,
};
pub use error::{CoreError, Result};
pub use options::{OptionValue, Options};
