//! Windows container configuration
//!
//! Computes the Windows-specific part of a container-creation request from a
//! Kubernetes-style pod: processor and memory controls for Windows Server and
//! Hyper-V isolated containers, and the run-as user name and GMSA credential
//! spec the container runs under.
//!
//! # Example
//!
//! ```
//! use kube_wincfg::models::{Container, Pod};
//! use kube_wincfg::{ConfigGenerator, FixedHost, GeneratorConfig, Quantity};
//!
//! let container = Container::new("app")
//!     .cpu_limit(Quantity::parse("2500m")?)
//!     .memory_limit(Quantity::parse("1Gi")?);
//! let pod = Pod::new("web").with_container(container);
//!
//! let generator = ConfigGenerator::with_host(GeneratorConfig::default(), FixedHost(4))?;
//! let config = generator.generate_for(&pod, "app", "")?;
//!
//! // Windows Server Containers take a single processor control.
//! assert_eq!(config.resources.cpu_shares, 5000);
//! assert_eq!(config.resources.cpu_maximum, 0);
//! # Ok::<(), kube_wincfg::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod hcs;
pub mod host;
pub mod models;
pub mod quantity;
pub mod resources;
pub mod security;

pub use config::{FeatureGates, GeneratorConfig};
pub use error::{Error, Result};
pub use generator::{ConfigGenerator, WindowsContainerConfig};
pub use host::{FixedHost, HostInfo, SystemHost};
pub use quantity::Quantity;
pub use resources::{translate, CpuControl, IsolationMode, ResourceRequest, WindowsResourceControl};
pub use security::{resolve, SecurityContextInput, WindowsSecurityIdentity};
