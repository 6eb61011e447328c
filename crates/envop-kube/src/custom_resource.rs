//! Custom resources backing typed services
//!
//! A service with a `type` (e.g. `mysql`) is also represented by a namespaced
//! custom resource in the `prsn.io/v1` group. The mapper produces the payload as
//! opaque JSON bytes; this module holds the routing needed to submit it.

use envop_core::Options;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ApiResource, DynamicObject};
use serde::{Deserialize, Serialize};

use crate::error::{KubeError, Result};

/// API group of service custom resources
pub const GROUP: &str = "prsn.io";

/// API version of service custom resources
pub const VERSION: &str = "v1";

/// API path prefix for grouped resources
pub const API_PATH: &str = "/apis";

/// Content type used to submit payloads
pub const CONTENT_TYPE: &str = "application/json";

/// Decoded form of the payload `spec`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResourceSpec {
    pub version: String,
    #[serde(default)]
    pub options: Options,
}

#[derive(Serialize, Deserialize)]
struct Payload<S> {
    spec: S,
}

/// A named, namespaced custom resource with an opaque JSON payload
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResourceData {
    pub metadata: ObjectMeta,

    /// JSON encoded `{"spec": {"version": ..., "options": ...}}`
    pub data: Vec<u8>,
}

impl ServiceResourceData {
    /// Encode a spec into a payload attached to `metadata`
    pub fn encode(metadata: ObjectMeta, spec: &ServiceResourceSpec) -> Result<Self> {
        let data = serde_json::to_vec(&Payload { spec })?;
        Ok(Self { metadata, data })
    }

    /// Decode the payload back into its spec
    pub fn spec(&self) -> Result<ServiceResourceSpec> {
        let payload: Payload<ServiceResourceSpec> = serde_json::from_slice(&self.data)?;
        Ok(payload.spec)
    }

    /// Build a dynamic object ready to be submitted as `kind`
    pub fn to_dynamic_object(&self, kind: &str) -> Result<DynamicObject> {
        let name = self
            .metadata
            .name
            .clone()
            .ok_or_else(|| KubeError::MissingName {
                kind: kind.to_string(),
            })?;

        let mut obj = DynamicObject::new(&name, &api_resource(kind));
        obj.metadata = self.metadata.clone();
        obj.data = serde_json::from_slice(&self.data)?;
        Ok(obj)
    }

    /// Recover the payload from an object read back from the cluster
    pub fn from_dynamic_object(obj: &DynamicObject) -> Result<Self> {
        let data = serde_json::to_vec(&obj.data)?;
        Ok(Self {
            metadata: obj.metadata.clone(),
            data,
        })
    }
}

/// API resource for a service custom resource kind
///
/// The plural is the lowercased kind with an `s` appended (`MySQL` -> `mysqls`).
pub fn api_resource(kind: &str) -> ApiResource {
    ApiResource {
        group: GROUP.to_string(),
        version: VERSION.to_string(),
        api_version: format!("{}/{}", GROUP, VERSION),
        kind: kind.to_string(),
        plural: format!("{}s", kind.to_lowercase()),
    }
}

/// Request path for a kind in a namespace
pub fn collection_path(kind: &str, namespace: &str) -> String {
    format!(
        "{}/{}/{}/namespaces/{}/{}",
        API_PATH,
        GROUP,
        VERSION,
        namespace,
        api_resource(kind).plural
    )
}
