//! Container image resolution
//!
//! The mapper leaves the container image unset. Before a deployment is applied,
//! a resolver decides which image the service runs.

use envop_core::Service;
use k8s_openapi::api::apps::v1::Deployment;

use crate::config::MapperConfig;

/// Decides the container image for a service
pub trait ImageResolver {
    /// Image reference for the service, or `None` if it cannot be resolved yet
    fn resolve(&self, service: &Service, config: &MapperConfig) -> Option<String>;
}

impl<F> ImageResolver for F
where
    F: Fn(&Service, &MapperConfig) -> Option<String>,
{
    fn resolve(&self, service: &Service, config: &MapperConfig) -> Option<String> {
        self(service, config)
    }
}

/// Set the image of every container in a mapped deployment
///
/// Returns false if the deployment has no pod spec to update.
pub fn apply_image(deployment: &mut Deployment, image: &str) -> bool {
    let Some(pod) = deployment
        .spec
        .as_mut()
        .and_then(|spec| spec.template.spec.as_mut())
    else {
        return false;
    };

    for container in &mut pod.containers {
        container.image = Some(image.to_string());
    }
    true
}

/// Resolve and apply the image for a deployment mapped from `service`
///
/// Returns the image that was applied, if any.
pub fn resolve_image<R: ImageResolver + ?Sized>(
    resolver: &R,
    service: &Service,
    config: &MapperConfig,
    deployment: &mut Deployment,
) -> Option<String> {
    let image = resolver.resolve(service, config)?;
    apply_image(deployment, &image).then_some(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::KubeMapper;

    fn registry_resolver(service: &Service, config: &MapperConfig) -> Option<String> {
        if service.version.is_empty() {
            return None;
        }
        Some(format!(
            "{}/{}/{}:{}",
            config.docker_registry, config.project, service.application, service.version
        ))
    }

    fn service() -> Service {
        Service {
            name: "web".to_string(),
            application: "storefront".to_string(),
            version: "1.2.3".to_string(),
            port: 80,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_image() {
        let service = service();
        let config = MapperConfig {
            project: "shop".to_string(),
            docker_registry: "registry.example.com".to_string(),
        };
        let mut deployment = KubeMapper::new(&service, "ns")
            .with_config(config.clone())
            .deployment()
            .unwrap();

        let image = resolve_image(&registry_resolver, &service, &config, &mut deployment);
        assert_eq!(
            image.as_deref(),
            Some("registry.example.com/shop/storefront:1.2.3")
        );

        let pod = deployment.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.containers[0].image, image);
    }

    #[test]
    fn test_unresolved_image_left_unset() {
        let service = Service {
            version: String::new(),
            ..service()
        };
        let mut deployment = KubeMapper::new(&service, "ns").deployment().unwrap();

        let image = resolve_image(
            &registry_resolver,
            &service,
            &MapperConfig::default(),
            &mut deployment,
        );
        assert!(image.is_none());
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        assert!(pod.containers[0].image.is_none());
    }

    #[test]
    fn test_apply_image_without_spec() {
        let mut deployment = Deployment::default();
        assert!(!apply_image(&mut deployment, "nginx:1.27"));
    }
}
