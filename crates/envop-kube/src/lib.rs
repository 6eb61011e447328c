//! Envop Kube - Kubernetes integration for the environment operator
//!
//! This crate provides:
//! - **Resource Mapper**: Project one service into Service, Deployment, Ingress,
//!   PersistentVolumeClaim, HorizontalPodAutoscaler and custom resource objects
//! - **Labels**: The creator tag and fixed placement policy shared by all objects
//! - **Custom Resources**: Payload encoding and `prsn.io/v1` routing
//! - **Image Resolution**: Filling in the container image left unset by the mapper
//! - **Clients**: Per-kind CRUD handles bound to one namespace
//! - **Configuration**: Operator settings from YAML and the process environment

pub mod client;
pub mod config;
pub mod custom_resource;
pub mod error;
pub mod image;
pub mod labels;
pub mod mapper;

pub use client::{
    EnvironmentClient, KubeResourceClient, ResourceClient, SecretClient, ServiceResourceClient,
};
pub use config::{DEFAULT_FIELD_MANAGER, MapperConfig, OperatorConfig};
pub use custom_resource::{ServiceResourceData, ServiceResourceSpec, api_resource};
pub use error::{KubeError, Result};
pub use image::{ImageResolver, apply_image, resolve_image};
pub use labels::{CREATOR, CREATOR_LABEL, creator_selector};
pub use mapper::{KubeMapper, ServiceResources};
