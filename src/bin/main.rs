//! wincfg CLI - Windows container config generation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use kube_wincfg::hcs::ComputeSystemConfig;
use kube_wincfg::models::Pod;
use kube_wincfg::resources::{self, IsolationMode, ResourceRequest};
use kube_wincfg::{ConfigGenerator, GeneratorConfig, HostInfo, Quantity, SystemHost};

const HCS_OWNER: &str = "kube-wincfg";

#[derive(Parser)]
#[command(name = "wincfg")]
#[command(about = "Compute Windows container resource and security config", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Runtime WindowsContainerConfig JSON
    Cri,
    /// HCS compute system document
    Hcs,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the Windows config for a container in a pod JSON file
    Generate {
        /// Path to pod JSON
        #[arg(short, long)]
        pod: PathBuf,
        /// Container name (default: first container)
        #[arg(short, long)]
        container: Option<String>,
        /// User name resolved for the image
        #[arg(short, long, default_value = "")]
        username: String,
        /// Feature gates, e.g. WindowsGMSA=true,HyperVContainer=true
        #[arg(long)]
        feature_gates: Option<String>,
        /// Override the host logical CPU count
        #[arg(long)]
        host_cpus: Option<u32>,
        /// Path to generator config JSON
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Cri)]
        format: OutputFormat,
    },
    /// Translate raw CPU/memory quantities into resource controls
    Translate {
        /// CPU request, e.g. 500m
        #[arg(long, value_parser = Quantity::parse)]
        cpu_request: Option<Quantity>,
        /// CPU limit, e.g. 2
        #[arg(long, value_parser = Quantity::parse)]
        cpu_limit: Option<Quantity>,
        /// Memory limit, e.g. 1Gi
        #[arg(long, value_parser = Quantity::parse)]
        memory_limit: Option<Quantity>,
        /// Use Hyper-V isolation
        #[arg(long)]
        hyperv: bool,
        /// Override the host logical CPU count
        #[arg(long)]
        host_cpus: Option<u32>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Cri)]
        format: OutputFormat,
    },
    /// Show host CPU count and feature gates
    Info {
        /// Feature gates, e.g. WindowsGMSA=true
        #[arg(long)]
        feature_gates: Option<String>,
        /// Path to generator config JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kube_wincfg=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Generate {
            pod,
            container,
            username,
            feature_gates,
            host_cpus,
            config,
            format,
        }) => {
            let config = load_config(config.as_deref(), feature_gates.as_deref(), host_cpus)?;
            cmd_generate(&pod, container.as_deref(), &username, config, format)?;
        }
        Some(Commands::Translate {
            cpu_request,
            cpu_limit,
            memory_limit,
            hyperv,
            host_cpus,
            format,
        }) => {
            let request = ResourceRequest {
                cpu_request_milli: cpu_request.map_or(0, |q| q.milli_value()),
                cpu_limit_milli: cpu_limit.map_or(0, |q| q.milli_value()),
                memory_limit_bytes: memory_limit.map_or(0, |q| q.value()),
            };
            let isolation = if hyperv {
                IsolationMode::HyperV
            } else {
                IsolationMode::Default
            };
            cmd_translate(&request, isolation, host_cpus, format)?;
        }
        Some(Commands::Info { feature_gates, config }) => {
            let config = load_config(config.as_deref(), feature_gates.as_deref(), None)?;
            cmd_info(&config)?;
        }
        None => {
            cmd_info(&GeneratorConfig::default())?;
        }
    }

    Ok(())
}

/// Config file first, then command-line overrides
fn load_config(
    path: Option<&Path>,
    feature_gates: Option<&str>,
    host_cpus: Option<u32>,
) -> kube_wincfg::Result<GeneratorConfig> {
    let mut config = match path {
        Some(path) => GeneratorConfig::from_file(path)?,
        None => GeneratorConfig::default(),
    };
    if let Some(gates) = feature_gates {
        config.feature_gates.apply(gates)?;
    }
    if host_cpus.is_some() {
        config.host_cpu_count = host_cpus;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_generate(
    pod_path: &Path,
    container: Option<&str>,
    username: &str,
    config: GeneratorConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let pod = Pod::from_file(pod_path)?;
    let container = match container {
        Some(name) => pod.container(name)?,
        None => pod
            .spec
            .containers
            .first()
            .ok_or_else(|| format!("pod '{}' has no containers", pod.name()))?,
    };

    let generator = ConfigGenerator::with_config(config)?;
    let windows_config = generator.generate(&pod, container, username)?;

    let json = match format {
        OutputFormat::Cri => serde_json::to_string_pretty(&windows_config)?,
        OutputFormat::Hcs => serde_json::to_string_pretty(&ComputeSystemConfig::for_container(
            HCS_OWNER,
            &windows_config.resources,
        ))?,
    };
    println!("{}", json);

    Ok(())
}

fn cmd_translate(
    request: &ResourceRequest,
    isolation: IsolationMode,
    host_cpus: Option<u32>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let host_cpus = host_cpus.unwrap_or_else(|| SystemHost.num_cpu());
    let controls = resources::translate(request, isolation, host_cpus);

    let json = match format {
        OutputFormat::Cri => serde_json::to_string_pretty(&controls)?,
        OutputFormat::Hcs => {
            serde_json::to_string_pretty(&ComputeSystemConfig::for_container(HCS_OWNER, &controls))?
        }
    };
    println!("{}", json);

    Ok(())
}

fn cmd_info(config: &GeneratorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let generator = ConfigGenerator::with_config(config.clone())?;

    println!("=== wincfg ===\n");
    println!("[*] Host:");
    println!("    Logical CPUs: {}", generator.host_cpu_count());
    if config.host_cpu_count.is_some() {
        println!("    (overridden by config)");
    }

    println!("\n[*] Feature gates:");
    println!("    {}", config.feature_gates);

    println!("\n[*] Usage:");
    println!("    wincfg generate --pod <pod.json> [--container <name>] [--format cri|hcs]");
    println!("    wincfg translate --cpu-limit 2500m [--hyperv] [--host-cpus <n>]");

    Ok(())
}
