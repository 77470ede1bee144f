//! Generates the Windows section of a container-creation request

use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::host::{HostInfo, SystemHost};
use crate::models::{determine_effective_security_context, Container, Pod};
use crate::resources::{self, IsolationMode, ResourceRequest, WindowsResourceControl};
use crate::security::{self, SecurityContextInput, WindowsSecurityIdentity};
use crate::Result;

/// Windows-specific container configuration handed to the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsContainerConfig {
    pub resources: WindowsResourceControl,
    pub security_context: WindowsSecurityIdentity,
}

/// Builds [`WindowsContainerConfig`]s from pod specs
pub struct ConfigGenerator<H: HostInfo = SystemHost> {
    config: GeneratorConfig,
    host: H,
}

impl ConfigGenerator<SystemHost> {
    /// Create a generator for this machine with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(GeneratorConfig::default())
    }

    /// Create a generator for this machine with custom config
    pub fn with_config(config: GeneratorConfig) -> Result<Self> {
        Self::with_host(config, SystemHost)
    }
}

impl<H: HostInfo> ConfigGenerator<H> {
    pub fn with_host(config: GeneratorConfig, host: H) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, host })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Configured CPU count, or the host's when not overridden
    pub fn host_cpu_count(&self) -> u32 {
        self.config
            .host_cpu_count
            .unwrap_or_else(|| self.host.num_cpu())
    }

    pub fn isolation_for(&self, pod: &Pod) -> IsolationMode {
        IsolationMode::from_annotations(pod.annotations(), self.config.feature_gates.hyperv_container)
    }

    /// Generate the Windows config for one container of `pod`.
    ///
    /// `username` is the user name the caller resolved for the image, if any.
    pub fn generate(&self, pod: &Pod, container: &Container, username: &str) -> Result<WindowsContainerConfig> {
        let isolation = self.isolation_for(pod);
        let request = resource_request(container);
        let resources = resources::translate(&request, isolation, self.host_cpu_count());

        let effective = determine_effective_security_context(pod, container);
        let input = SecurityContextInput::from_effective(&effective, self.config.feature_gates.windows_gmsa);
        let security_context = match security::resolve(&input, username) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!(pod = %pod.name(), container = %container.name, error = %e, "Invalid security context");
                return Err(e);
            }
        };

        tracing::info!(
            pod = %pod.name(),
            container = %container.name,
            isolation = %isolation,
            "Generated Windows container config"
        );

        Ok(WindowsContainerConfig {
            resources,
            security_context,
        })
    }

    /// Generate the Windows config for the container named `container_name`.
    pub fn generate_for(&self, pod: &Pod, container_name: &str, username: &str) -> Result<WindowsContainerConfig> {
        let container = pod.container(container_name)?;
        self.generate(pod, container, username)
    }
}

/// CPU request, CPU limit and memory limit of a container. Absent quantities are zero.
pub fn resource_request(container: &Container) -> ResourceRequest {
    let resources = &container.resources;
    ResourceRequest {
        cpu_request_milli: resources.requests.cpu().map_or(0, |q| q.milli_value()),
        cpu_limit_milli: resources.limits.cpu().map_or(0, |q| q.milli_value()),
        memory_limit_bytes: resources.limits.memory().map_or(0, |q| q.value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockHostInfo;
    use crate::models::{PodSecurityContext, SecurityContext, WindowsSecurityContextOptions};
    use crate::quantity::Quantity;
    use crate::resources::{ISOLATION_ANNOTATION_KEY, ISOLATION_HYPERV};
    use crate::Error;

    fn host_with(cpus: u32) -> MockHostInfo {
        let mut host = MockHostInfo::new();
        host.expect_num_cpu().return_const(cpus);
        host
    }

    fn hyperv_pod(container: Container) -> Pod {
        Pod::new("web")
            .with_annotation(ISOLATION_ANNOTATION_KEY, ISOLATION_HYPERV)
            .with_container(container)
    }

    #[test]
    fn test_resource_request_from_container() {
        let container = Container::new("app")
            .cpu_request(Quantity::parse("250m").unwrap())
            .cpu_limit(Quantity::parse("1.5").unwrap())
            .memory_limit(Quantity::parse("1Gi").unwrap());

        assert_eq!(
            resource_request(&container),
            ResourceRequest {
                cpu_request_milli: 250,
                cpu_limit_milli: 1500,
                memory_limit_bytes: 1 << 30,
            }
        );
        assert_eq!(resource_request(&Container::new("bare")), ResourceRequest::default());
    }

    #[test]
    fn test_generate_process_isolated() {
        let container = Container::new("app")
            .cpu_limit(Quantity::parse("2500m").unwrap())
            .memory_limit(Quantity::parse("512Mi").unwrap());
        let pod = Pod::new("web").with_container(container.clone());

        let generator = ConfigGenerator::with_host(GeneratorConfig::default(), host_with(4)).unwrap();
        let wc = generator.generate(&pod, &container, "").unwrap();

        assert_eq!(wc.resources.cpu_shares, 5000);
        assert_eq!(wc.resources.cpu_count, 0);
        assert_eq!(wc.resources.cpu_maximum, 0);
        assert_eq!(wc.resources.memory_limit_bytes, 512 << 20);
        assert_eq!(wc.security_context, WindowsSecurityIdentity::default());
    }

    #[test]
    fn test_hyperv_annotation_requires_feature_gate() {
        let container = Container::new("app").cpu_limit(Quantity::parse("2500m").unwrap());
        let pod = hyperv_pod(container.clone());

        let disabled = ConfigGenerator::with_host(GeneratorConfig::default(), host_with(4)).unwrap();
        assert_eq!(disabled.isolation_for(&pod), IsolationMode::Default);
        assert_eq!(disabled.generate(&pod, &container, "").unwrap().resources.cpu_count, 0);

        let config = GeneratorConfig::builder().hyperv_container(true).build();
        let enabled = ConfigGenerator::with_host(config, host_with(4)).unwrap();
        assert_eq!(enabled.isolation_for(&pod), IsolationMode::HyperV);

        let wc = enabled.generate(&pod, &container, "").unwrap();
        assert_eq!(wc.resources.cpu_count, 3);
        assert_eq!(wc.resources.cpu_maximum, 8333);
        assert_eq!(wc.resources.cpu_shares, 6243);
    }

    #[test]
    fn test_configured_cpu_count_skips_host_query() {
        let mut host = MockHostInfo::new();
        host.expect_num_cpu().never();

        let config = GeneratorConfig::builder().host_cpu_count(2).build();
        let generator = ConfigGenerator::with_host(config, host).unwrap();
        assert_eq!(generator.host_cpu_count(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GeneratorConfig::builder().host_cpu_count(0).build();
        assert!(matches!(
            ConfigGenerator::with_host(config, MockHostInfo::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_pod_run_as_user_fails() {
        let container = Container::new("app");
        let pod = Pod::new("web")
            .with_security_context(PodSecurityContext {
                run_as_user: Some(1000),
                windows_options: None,
            })
            .with_container(container.clone());

        let generator = ConfigGenerator::with_host(GeneratorConfig::default(), host_with(4)).unwrap();
        let err = generator.generate(&pod, &container, "alice").unwrap_err();
        assert!(err.is_unsupported_option());
    }

    #[test]
    fn test_security_identity_layering() {
        let container = Container::new("app").security_context(
            SecurityContext::default()
                .run_as_user_name("ContainerAdministrator")
                .gmsa_credential_spec("{}"),
        );
        let pod = Pod::new("web")
            .with_security_context(PodSecurityContext {
                run_as_user: None,
                windows_options: Some(WindowsSecurityContextOptions {
                    run_as_user_name: Some("ContainerUser".into()),
                    ..Default::default()
                }),
            })
            .with_container(container.clone());

        let without_gmsa = ConfigGenerator::with_host(GeneratorConfig::default(), host_with(4)).unwrap();
        let wc = without_gmsa.generate(&pod, &container, "alice").unwrap();
        assert_eq!(wc.security_context.run_as_username, "ContainerAdministrator");
        assert_eq!(wc.security_context.credential_spec, "");

        let config = GeneratorConfig::builder().windows_gmsa(true).build();
        let with_gmsa = ConfigGenerator::with_host(config, host_with(4)).unwrap();
        let wc = with_gmsa.generate(&pod, &container, "alice").unwrap();
        assert_eq!(wc.security_context.credential_spec, "{}");
    }

    #[test]
    fn test_generate_for_unknown_container() {
        let pod = Pod::new("web").with_container(Container::new("app"));
        let generator = ConfigGenerator::with_host(GeneratorConfig::default(), host_with(4)).unwrap();
        assert!(matches!(
            generator.generate_for(&pod, "sidecar", ""),
            Err(Error::ContainerNotFound(_))
        ));
    }

    #[test]
    fn test_config_serializes_cri_shape() {
        let container = Container::new("app").cpu_request(Quantity::from_milli(100));
        let pod = Pod::new("web").with_container(container);
        let generator = ConfigGenerator::with_host(GeneratorConfig::default(), host_with(1)).unwrap();

        let wc = generator.generate_for(&pod, "app", "ContainerUser").unwrap();
        let json = serde_json::to_value(&wc).unwrap();
        assert_eq!(json["resources"]["cpuShares"], 5000);
        assert_eq!(json["securityContext"]["runAsUsername"], "ContainerUser");
    }
}
