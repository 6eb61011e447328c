//! Mapping services to Kubernetes objects
//!
//! `KubeMapper` projects a single service into the objects the cluster needs:
//! - **Service**: one port, selecting the workload's pods
//! - **Deployment**: one container, env vars and volume mounts from the service
//! - **Ingress**: one host rule routing `/` to the service
//! - **PersistentVolumeClaims**: one claim per volume
//! - **HorizontalPodAutoscaler**: when the service defines autoscaling bounds
//! - **Custom resource**: version and options as an opaque payload
//!
//! Every object is named after the service and carries the creator label, so
//! objects of different kinds agree on names, labels and ports.

use std::collections::BTreeMap;

use envop_core::Service;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::autoscaling::v1::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Service as KubeService,
    ServicePort, ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::debug;

use crate::config::MapperConfig;
use crate::custom_resource::{ServiceResourceData, ServiceResourceSpec};
use crate::error::{KubeError, Result};
use crate::labels;

/// Access mode used when a volume does not set one
pub const DEFAULT_ACCESS_MODE: &str = "ReadWriteOnce";

/// Storage request used when a volume does not set a size
pub const DEFAULT_VOLUME_SIZE: &str = "1Gi";

/// Path routed by the ingress rule
pub const INGRESS_PATH: &str = "/";

const INGRESS_PATH_TYPE: &str = "ImplementationSpecific";

/// Maps one service into Kubernetes objects
#[derive(Debug, Clone)]
pub struct KubeMapper<'a> {
    /// Service being mapped
    pub service: &'a Service,

    /// Namespace of every produced object
    pub namespace: String,

    /// Pass-through settings, not interpreted here
    pub config: MapperConfig,
}

/// All objects produced for one service
#[derive(Debug, Clone)]
pub struct ServiceResources {
    pub service: KubeService,
    pub deployment: Deployment,
    pub ingress: Ingress,
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
    pub horizontal_pod_autoscaler: Option<HorizontalPodAutoscaler>,
    pub service_resource: ServiceResourceData,
}

impl<'a> KubeMapper<'a> {
    /// Create a mapper for a service in a namespace
    pub fn new(service: &'a Service, namespace: impl Into<String>) -> Self {
        Self {
            service,
            namespace: namespace.into(),
            config: MapperConfig::default(),
        }
    }

    /// Attach pass-through settings
    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Map every object kind at once
    pub fn resources(&self) -> Result<ServiceResources> {
        Ok(ServiceResources {
            service: self.service(),
            deployment: self.deployment()?,
            ingress: self.ingress(),
            persistent_volume_claims: self.persistent_volume_claims()?,
            horizontal_pod_autoscaler: self.horizontal_pod_autoscaler(),
            service_resource: self.service_resource()?,
        })
    }

    fn metadata(&self, labels: BTreeMap<String, String>) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.service.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(labels),
            ..Default::default()
        }
    }

    fn port(&self) -> i32 {
        i32::from(self.service.port)
    }

    /// Network service exposing the service port
    pub fn service(&self) -> KubeService {
        debug!(service = %self.service.name, "mapping service");

        KubeService {
            metadata: self.metadata(labels::service_labels(self.service)),
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    name: Some(labels::PORT_NAME.to_string()),
                    port: self.port(),
                    target_port: Some(IntOrString::Int(self.port())),
                    ..Default::default()
                }]),
                selector: Some(labels::selector_labels(self.service)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Workload running the service container
    ///
    /// Fails if any volume is missing its name or mount path. The container
    /// image is left unset for an image resolver to fill in.
    pub fn deployment(&self) -> Result<Deployment> {
        debug!(service = %self.service.name, "mapping deployment");

        let container = self.container()?;
        let workload_labels = labels::workload_labels(self.service);

        Ok(Deployment {
            metadata: self.metadata(workload_labels.clone()),
            spec: Some(DeploymentSpec {
                replicas: Some(self.service.replicas),
                selector: LabelSelector {
                    match_labels: Some(labels::selector_labels(self.service)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(self.metadata(workload_labels)),
                    spec: Some(PodSpec {
                        node_selector: Some(labels::node_selector()),
                        containers: vec![container],
                        volumes: Some(self.volumes()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn container(&self) -> Result<Container> {
        Ok(Container {
            name: self.service.name.clone(),
            image: None,
            env: Some(self.env_vars()),
            ports: Some(vec![ContainerPort {
                name: Some(labels::PORT_NAME.to_string()),
                container_port: self.port(),
                ..Default::default()
            }]),
            volume_mounts: Some(self.volume_mounts()?),
            ..Default::default()
        })
    }

    fn env_vars(&self) -> Vec<EnvVar> {
        self.service
            .env_vars
            .iter()
            .map(|e| EnvVar {
                name: e.name.clone(),
                value: Some(e.value.clone()),
                ..Default::default()
            })
            .collect()
    }

    fn validate_volumes(&self) -> Result<()> {
        match self
            .service
            .volumes
            .iter()
            .find(|v| v.name.is_empty() || v.path.is_empty())
        {
            Some(v) => Err(KubeError::InvalidVolume {
                service: self.service.name.clone(),
                name: v.name.clone(),
                path: v.path.clone(),
            }),
            None => Ok(()),
        }
    }

    fn volume_mounts(&self) -> Result<Vec<VolumeMount>> {
        self.validate_volumes()?;

        Ok(self
            .service
            .volumes
            .iter()
            .map(|v| VolumeMount {
                name: v.name.clone(),
                mount_path: v.path.clone(),
                ..Default::default()
            })
            .collect())
    }

    fn volumes(&self) -> Vec<Volume> {
        self.service
            .volumes
            .iter()
            .map(|v| Volume {
                name: v.name.clone(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: v.name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect()
    }

    /// Ingress routing the external URL to the network service
    pub fn ingress(&self) -> Ingress {
        debug!(service = %self.service.name, host = %self.service.external_url, "mapping ingress");

        Ingress {
            metadata: self.metadata(labels::service_labels(self.service)),
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(self.service.external_url.clone()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some(INGRESS_PATH.to_string()),
                            path_type: INGRESS_PATH_TYPE.to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: self.service.name.clone(),
                                    port: Some(ServiceBackendPort {
                                        number: Some(self.port()),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Claims backing the workload's volumes, one per volume
    pub fn persistent_volume_claims(&self) -> Result<Vec<PersistentVolumeClaim>> {
        self.validate_volumes()?;

        Ok(self
            .service
            .volumes
            .iter()
            .map(|v| {
                let size = v.size.as_deref().unwrap_or(DEFAULT_VOLUME_SIZE);
                let mode = v.modes.as_deref().unwrap_or(DEFAULT_ACCESS_MODE);

                PersistentVolumeClaim {
                    metadata: ObjectMeta {
                        name: Some(v.name.clone()),
                        ..self.metadata(labels::service_labels(self.service))
                    },
                    spec: Some(PersistentVolumeClaimSpec {
                        access_modes: Some(vec![mode.to_string()]),
                        resources: Some(VolumeResourceRequirements {
                            requests: Some(BTreeMap::from([(
                                "storage".to_string(),
                                Quantity(size.to_string()),
                            )])),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }
            })
            .collect())
    }

    /// Autoscaler for the workload, if the service defines one
    pub fn horizontal_pod_autoscaler(&self) -> Option<HorizontalPodAutoscaler> {
        let hpa = self.service.hpa.as_ref()?;

        Some(HorizontalPodAutoscaler {
            metadata: self.metadata(labels::service_labels(self.service)),
            spec: Some(HorizontalPodAutoscalerSpec {
                min_replicas: Some(hpa.min_replicas),
                max_replicas: hpa.max_replicas,
                target_cpu_utilization_percentage: hpa.target_cpu_utilization_percentage,
                scale_target_ref: CrossVersionObjectReference {
                    api_version: Some("apps/v1".to_string()),
                    kind: "Deployment".to_string(),
                    name: self.service.name.clone(),
                },
            }),
            ..Default::default()
        })
    }

    /// Custom resource carrying the service version and options
    ///
    /// Fails if an option value has no JSON representation.
    pub fn service_resource(&self) -> Result<ServiceResourceData> {
        debug!(service = %self.service.name, "mapping custom resource");

        if let Some(path) = self.service.options.non_representable() {
            return Err(KubeError::InvalidOptions {
                service: self.service.name.clone(),
                path,
                message: "non-finite numbers cannot be encoded".to_string(),
            });
        }

        let spec = ServiceResourceSpec {
            version: self.service.version.clone(),
            options: self.service.options.clone(),
        };
        ServiceResourceData::encode(
            self.metadata(labels::selector_labels(self.service)),
            &spec,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envop_core::{Autoscaling, EnvVar as ServiceEnvVar, OptionValue, Volume as ServiceVolume};

    fn web() -> Service {
        Service {
            name: "web".to_string(),
            application: "storefront".to_string(),
            version: "1.2.3".to_string(),
            port: 8080,
            replicas: 3,
            external_url: "web.example.com".to_string(),
            ..Default::default()
        }
    }

    fn with_volume(name: &str, path: &str) -> Service {
        Service {
            volumes: vec![ServiceVolume::new(name, path)],
            ..web()
        }
    }

    #[test]
    fn test_service_mapping() {
        let service = web();
        let svc = KubeMapper::new(&service, "shop-prd").service();

        assert_eq!(svc.metadata.name.as_deref(), Some("web"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some("shop-prd"));

        let spec = svc.spec.unwrap();
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8080);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(8080)));
        assert_eq!(ports[0].name.as_deref(), Some(labels::PORT_NAME));

        let labels = svc.metadata.labels.unwrap();
        assert_eq!(labels.get("creator").map(String::as_str), Some("pipeline"));
        assert_eq!(labels.get("name").map(String::as_str), Some("web"));
        assert_eq!(labels.get("application").map(String::as_str), Some("storefront"));
        assert_eq!(spec.selector, Some(labels::selector_labels(&service)));
    }

    #[test]
    fn test_deployment_mapping() {
        let service = Service {
            env_vars: vec![
                ServiceEnvVar {
                    name: "B".to_string(),
                    value: "2".to_string(),
                },
                ServiceEnvVar {
                    name: "A".to_string(),
                    value: "1".to_string(),
                },
            ],
            ..web()
        };
        let deployment = KubeMapper::new(&service, "shop-prd").deployment().unwrap();

        let labels = deployment.metadata.labels.clone().unwrap();
        assert_eq!(labels.get("version").map(String::as_str), Some("1.2.3"));

        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(
            spec.selector.match_labels,
            Some(BTreeMap::from([
                ("creator".to_string(), "pipeline".to_string()),
                ("name".to_string(), "web".to_string()),
            ]))
        );

        let template_labels = spec.template.metadata.unwrap().labels.unwrap();
        assert_eq!(template_labels, labels);

        let pod = spec.template.spec.unwrap();
        assert_eq!(
            pod.node_selector,
            Some(BTreeMap::from([("role".to_string(), "minion".to_string())]))
        );
        assert_eq!(pod.containers.len(), 1);

        let container = &pod.containers[0];
        assert_eq!(container.name, "web");
        assert!(container.image.is_none());
        let env: Vec<(&str, Option<&str>)> = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| (e.name.as_str(), e.value.as_deref()))
            .collect();
        assert_eq!(env, vec![("B", Some("2")), ("A", Some("1"))]);
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 8080);
    }

    #[test]
    fn test_duplicate_env_vars_are_kept() {
        let var = ServiceEnvVar {
            name: "MODE".to_string(),
            value: "a".to_string(),
        };
        let service = Service {
            env_vars: vec![var.clone(), var],
            ..web()
        };
        let deployment = KubeMapper::new(&service, "ns").deployment().unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.containers[0].env.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_volume_without_name_fails() {
        let service = with_volume("", "/data");
        let err = KubeMapper::new(&service, "ns").deployment().unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(err, KubeError::InvalidVolume { .. }));
    }

    #[test]
    fn test_volume_without_path_fails() {
        let service = with_volume("data", "");
        let err = KubeMapper::new(&service, "ns").deployment().unwrap_err();
        assert!(matches!(err, KubeError::InvalidVolume { ref name, .. } if name == "data"));
    }

    #[test]
    fn test_volume_mount() {
        let service = with_volume("data", "/data");
        let deployment = KubeMapper::new(&service, "ns").deployment().unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();

        let mounts = pod.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, "data");
        assert_eq!(mounts[0].mount_path, "/data");

        let volumes = pod.volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(
            volumes[0].persistent_volume_claim.as_ref().unwrap().claim_name,
            "data"
        );
    }

    #[test]
    fn test_ingress_mapping() {
        let service = web();
        let ingress = KubeMapper::new(&service, "ns").ingress();

        let rules = ingress.spec.unwrap().rules.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].host.as_deref(), Some("web.example.com"));

        let paths = &rules[0].http.as_ref().unwrap().paths;
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path.as_deref(), Some("/"));

        let backend = paths[0].backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "web");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(8080));
    }

    #[test]
    fn test_persistent_volume_claims() {
        let mut service = with_volume("data", "/data");
        service.volumes.push(ServiceVolume {
            name: "cache".to_string(),
            path: "/cache".to_string(),
            modes: Some("ReadWriteMany".to_string()),
            size: Some("10Gi".to_string()),
        });

        let claims = KubeMapper::new(&service, "ns")
            .persistent_volume_claims()
            .unwrap();
        assert_eq!(claims.len(), 2);

        assert_eq!(claims[0].metadata.name.as_deref(), Some("data"));
        assert_eq!(claims[0].metadata.namespace.as_deref(), Some("ns"));
        let spec = claims[0].spec.as_ref().unwrap();
        assert_eq!(spec.access_modes, Some(vec![DEFAULT_ACCESS_MODE.to_string()]));
        let requests = spec.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests["storage"], Quantity(DEFAULT_VOLUME_SIZE.to_string()));

        let spec = claims[1].spec.as_ref().unwrap();
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteMany".to_string()]));
        let requests = spec.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests["storage"], Quantity("10Gi".to_string()));
    }

    #[test]
    fn test_claims_validate_volumes() {
        let service = with_volume("", "/data");
        assert!(
            KubeMapper::new(&service, "ns")
                .persistent_volume_claims()
                .is_err()
        );
    }

    #[test]
    fn test_horizontal_pod_autoscaler() {
        let service = web();
        assert!(KubeMapper::new(&service, "ns").horizontal_pod_autoscaler().is_none());

        let service = Service {
            hpa: Some(Autoscaling {
                min_replicas: 2,
                max_replicas: 8,
                target_cpu_utilization_percentage: Some(70),
            }),
            ..web()
        };
        let hpa = KubeMapper::new(&service, "ns")
            .horizontal_pod_autoscaler()
            .unwrap();
        let spec = hpa.spec.unwrap();
        assert_eq!(spec.min_replicas, Some(2));
        assert_eq!(spec.max_replicas, 8);
        assert_eq!(spec.target_cpu_utilization_percentage, Some(70));
        assert_eq!(spec.scale_target_ref.kind, "Deployment");
        assert_eq!(spec.scale_target_ref.name, "web");
    }

    #[test]
    fn test_service_resource_payload() {
        let service = Service {
            options: [("x", "y")].into_iter().collect(),
            ..web()
        };
        let data = KubeMapper::new(&service, "ns").service_resource().unwrap();

        assert_eq!(data.metadata.name.as_deref(), Some("web"));
        assert_eq!(data.metadata.namespace.as_deref(), Some("ns"));
        let spec = data.spec().unwrap();
        assert_eq!(spec.version, "1.2.3");
        assert_eq!(spec.options.get("x"), Some(&OptionValue::from("y")));
    }

    #[test]
    fn test_service_resource_is_deterministic() {
        let service = Service {
            options: [("b", 1i64), ("a", 2i64)].into_iter().collect(),
            ..web()
        };
        let mapper = KubeMapper::new(&service, "ns");
        assert_eq!(
            mapper.service_resource().unwrap().data,
            mapper.service_resource().unwrap().data
        );
    }

    #[test]
    fn test_service_resource_rejects_non_finite() {
        let service = Service {
            options: [("ratio", f64::NAN)].into_iter().collect(),
            ..web()
        };
        let err = KubeMapper::new(&service, "ns").service_resource().unwrap_err();
        assert!(matches!(err, KubeError::InvalidOptions { ref path, .. } if path == "ratio"));
        assert!(err.is_serialization());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_resources_bundle() {
        let service = with_volume("data", "/data");
        let resources = KubeMapper::new(&service, "ns").resources().unwrap();
        assert_eq!(resources.persistent_volume_claims.len(), 1);
        assert!(resources.horizontal_pod_autoscaler.is_none());

        let bad = with_volume("data", "");
        assert!(KubeMapper::new(&bad, "ns").resources().is_err());
    }
}
