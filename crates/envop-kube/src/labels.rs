//! Labels and fixed placement policy shared by every produced resource
//!
//! All objects created by the operator carry `creator=pipeline`, which is also
//! the selector used when listing objects the operator owns.

use std::collections::BTreeMap;

use envop_core::Service;

/// Label key identifying the tool that created a resource
pub const CREATOR_LABEL: &str = "creator";

/// Creator tag applied to all produced resources
pub const CREATOR: &str = "pipeline";

pub const NAME_LABEL: &str = "name";
pub const APPLICATION_LABEL: &str = "application";
pub const VERSION_LABEL: &str = "version";

/// Name of the single port exposed by a service and its container
pub const PORT_NAME: &str = "tcp-port";

/// Node selector applied to every pod
pub const NODE_ROLE_LABEL: &str = "role";
pub const NODE_ROLE: &str = "minion";

/// Label selector matching every resource owned by the operator
pub fn creator_selector() -> String {
    format!("{}={}", CREATOR_LABEL, CREATOR)
}

/// Labels matching a service's pods to their workload
pub fn selector_labels(service: &Service) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CREATOR_LABEL.to_string(), CREATOR.to_string()),
        (NAME_LABEL.to_string(), service.name.clone()),
    ])
}

/// Selector labels plus the application label
pub fn service_labels(service: &Service) -> BTreeMap<String, String> {
    let mut labels = selector_labels(service);
    labels.insert(APPLICATION_LABEL.to_string(), service.application.clone());
    labels
}

/// Service labels plus the version label
pub fn workload_labels(service: &Service) -> BTreeMap<String, String> {
    let mut labels = service_labels(service);
    labels.insert(VERSION_LABEL.to_string(), service.version.clone());
    labels
}

/// Fixed node placement constraint
pub fn node_selector() -> BTreeMap<String, String> {
    BTreeMap::from([(NODE_ROLE_LABEL.to_string(), NODE_ROLE.to_string())])
}
