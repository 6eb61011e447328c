//! Diff engine for comparing environment snapshots
//!
//! Key features:
//! - Compare a previously applied environment with the desired one
//! - Ignore fields that do not affect cluster state (tests, rollout strategy,
//!   replica counts owned by an autoscaler)
//! - Report field-level changes with their old and new values

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use similar::TextDiff;
use tracing::debug;

use crate::environment::{
    Autoscaling, DeploymentSettings, EnvVar, Environment, Service, Test, Volume,
};

/// Environment fields that never take part in comparison
pub const ENVIRONMENT_IGNORED_FIELDS: &[&str] = &["tests", "deployment"];

/// Service fields that never take part in comparison
pub const SERVICE_IGNORED_FIELDS: &[&str] = &["deployment"];

/// Service fields additionally ignored when the service has an autoscaler
pub const AUTOSCALED_SERVICE_IGNORED_FIELDS: &[&str] = &["replicas"];

/// Diff engine for environment comparison
pub struct DiffEngine {
    /// Context lines around changes in unified diffs
    pub context_lines: usize,
}

impl DiffEngine {
    /// Create a new diff engine
    pub fn new() -> Self {
        Self { context_lines: 3 }
    }

    /// Set the number of context lines
    pub fn with_context(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Compare two environments, keeping only operationally relevant changes
    pub fn compare(&self, current: &Environment, desired: &Environment) -> EnvironmentDiff {
        let old = comparison_view(current);
        let new = comparison_view(desired);

        let mut changes = Vec::new();
        diff_values("", &old, &new, &mut changes);

        debug!(
            environment = %desired.name,
            changes = changes.len(),
            "compared environments"
        );

        EnvironmentDiff { changes }
    }

    /// Render a unified text diff of the two comparison views
    pub fn unified_diff(&self, current: &Environment, desired: &Environment) -> String {
        let old = format!("{:#}\n", comparison_view(current));
        let new = format!("{:#}\n", comparison_view(desired));

        TextDiff::from_lines(&old, &new)
            .unified_diff()
            .context_radius(self.context_lines)
            .header("current", "desired")
            .to_string()
    }

    /// Generate a human-readable summary
    pub fn summary(&self, diff: &EnvironmentDiff) -> String {
        let added = diff.changes_by_type(ChangeType::Added).len();
        let modified = diff.changes_by_type(ChangeType::Modified).len();
        let removed = diff.changes_by_type(ChangeType::Removed).len();

        let mut parts = Vec::with_capacity(3);
        if added > 0 {
            parts.push(format!("{} added", added));
        }
        if modified > 0 {
            parts.push(format!("{} modified", modified));
        }
        if removed > 0 {
            parts.push(format!("{} removed", removed));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two environments
///
/// Returns an empty string when there is no operationally relevant difference,
/// otherwise one line per changed field.
pub fn compare(current: &Environment, desired: &Environment) -> String {
    DiffEngine::new().compare(current, desired).to_string()
}

/// Result of comparing two environments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDiff {
    pub changes: Vec<FieldChange>,
}

impl EnvironmentDiff {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Get changes by type
    pub fn changes_by_type(&self, change_type: ChangeType) -> Vec<&FieldChange> {
        self.changes
            .iter()
            .filter(|c| c.change_type == change_type)
            .collect()
    }
}

impl std::fmt::Display for EnvironmentDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", change)?;
        }
        Ok(())
    }
}

/// A change to a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field path, e.g. `services[0].port`
    pub path: String,

    pub change_type: ChangeType,

    /// Value in the current environment
    pub old: Option<Value>,

    /// Value in the desired environment
    pub new: Option<Value>,
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let render = |v: &Option<Value>| v.as_ref().unwrap_or(&Value::Null).to_string();
        match self.change_type {
            ChangeType::Added => write!(f, "+ {}: {}", self.path, render(&self.new)),
            ChangeType::Removed => write!(f, "- {}: {}", self.path, render(&self.old)),
            ChangeType::Modified => write!(
                f,
                "~ {}: {} -> {}",
                self.path,
                render(&self.old),
                render(&self.new)
            ),
        }
    }
}

/// Type of field change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Added => write!(f, "added"),
            ChangeType::Modified => write!(f, "modified"),
            ChangeType::Removed => write!(f, "removed"),
        }
    }
}

/// Build the comparison view of an environment
///
/// This is the full environment as a JSON tree with the ignored fields
/// removed at each level.
pub fn comparison_view(env: &Environment) -> Value {
    let mut root = Map::new();
    root.insert("name".into(), json!(env.name));
    root.insert("namespace".into(), json!(env.namespace));
    root.insert(
        "deployment".into(),
        env.deployment.as_ref().map_or(Value::Null, deployment_tree),
    );
    root.insert(
        "services".into(),
        Value::Array(env.services.iter().map(service_view).collect()),
    );
    root.insert(
        "tests".into(),
        Value::Array(env.tests.iter().map(test_tree).collect()),
    );

    strip_fields(&mut root, ENVIRONMENT_IGNORED_FIELDS);
    Value::Object(root)
}

fn service_view(service: &Service) -> Value {
    let mut map = Map::new();
    map.insert("name".into(), json!(service.name));
    map.insert("application".into(), json!(service.application));
    map.insert("version".into(), json!(service.version));
    map.insert("port".into(), json!(service.port));
    map.insert("replicas".into(), json!(service.replicas));
    map.insert("external_url".into(), json!(service.external_url));
    map.insert(
        "env".into(),
        Value::Array(service.env_vars.iter().map(env_var_tree).collect()),
    );
    map.insert(
        "volumes".into(),
        Value::Array(service.volumes.iter().map(volume_tree).collect()),
    );
    map.insert("type".into(), json!(service.type_));
    map.insert("options".into(), service.options.to_json());
    map.insert(
        "hpa".into(),
        service.hpa.as_ref().map_or(Value::Null, autoscaling_tree),
    );
    map.insert(
        "deployment".into(),
        service.deployment.as_ref().map_or(Value::Null, deployment_tree),
    );

    strip_fields(&mut map, SERVICE_IGNORED_FIELDS);
    if service.is_autoscaled() {
        strip_fields(&mut map, AUTOSCALED_SERVICE_IGNORED_FIELDS);
    }
    Value::Object(map)
}

fn env_var_tree(var: &EnvVar) -> Value {
    json!({ "name": var.name, "value": var.value })
}

fn volume_tree(volume: &Volume) -> Value {
    json!({
        "name": volume.name,
        "path": volume.path,
        "modes": volume.modes,
        "size": volume.size,
    })
}

fn autoscaling_tree(hpa: &Autoscaling) -> Value {
    json!({
        "min_replicas": hpa.min_replicas,
        "max_replicas": hpa.max_replicas,
        "target_cpu_utilization_percentage": hpa.target_cpu_utilization_percentage,
    })
}

fn deployment_tree(settings: &DeploymentSettings) -> Value {
    json!({ "method": settings.method, "active": settings.active })
}

fn test_tree(test: &Test) -> Value {
    json!({
        "name": test.name,
        "repository": test.repository,
        "branch": test.branch,
        "commands": test.commands,
    })
}

fn strip_fields(map: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        map.remove(*field);
    }
}

/// Append `key` to `parent`
///
/// Keys that would make the path ambiguous (empty, or containing `.`, `[`, `]`
/// or `"`) are written in bracketed JSON string form: `options["a.b"]`.
fn child_path(parent: &str, key: &str) -> String {
    let needs_quoting = key.is_empty() || key.contains(['.', '[', ']', '"']);
    match (parent.is_empty(), needs_quoting) {
        (_, true) => format!("{}[{}]", parent, Value::String(key.to_string())),
        (true, false) => key.to_string(),
        (false, false) => format!("{}.{}", parent, key),
    }
}

/// Walk two JSON trees and record every differing leaf
fn diff_values(path: &str, old: &Value, new: &Value, out: &mut Vec<FieldChange>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            // map iteration order is fixed for identical inputs
            for (key, old_child) in a {
                let child = child_path(path, key);
                match b.get(key) {
                    Some(new_child) => diff_values(&child, old_child, new_child, out),
                    None => out.push(FieldChange {
                        path: child,
                        change_type: ChangeType::Removed,
                        old: Some(old_child.clone()),
                        new: None,
                    }),
                }
            }
            for (key, new_child) in b {
                if !a.contains_key(key) {
                    out.push(FieldChange {
                        path: child_path(path, key),
                        change_type: ChangeType::Added,
                        old: None,
                        new: Some(new_child.clone()),
                    });
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for i in 0..a.len().max(b.len()) {
                let child = format!("{}[{}]", path, i);
                match (a.get(i), b.get(i)) {
                    (Some(x), Some(y)) => diff_values(&child, x, y, out),
                    (Some(x), None) => out.push(FieldChange {
                        path: child,
                        change_type: ChangeType::Removed,
                        old: Some(x.clone()),
                        new: None,
                    }),
                    (None, Some(y)) => out.push(FieldChange {
                        path: child,
                        change_type: ChangeType::Added,
                        old: None,
                        new: Some(y.clone()),
                    }),
                    (None, None) => {}
                }
            }
        }
        _ if old != new => out.push(FieldChange {
            path: path.to_string(),
            change_type: ChangeType::Modified,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }),
        _ => {}
    }
}
