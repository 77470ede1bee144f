//! CPU and memory resource controls for Windows containers
//!
//! Windows containers expose three processor controls: a CPU count, a relative
//! CPU weight (shares) and a CPU maximum expressed in ten-thousandths of host
//! capacity. Windows Server Containers accept only one of them at a time, with
//! precedence Count > Shares > Maximum. Hyper-V isolated containers accept all
//! three together.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Pod annotation selecting the isolation type
pub const ISOLATION_ANNOTATION_KEY: &str = "experimental.windows.kubernetes.io/isolation-type";
/// Annotation value requesting Hyper-V isolation
pub const ISOLATION_HYPERV: &str = "hyperv";

/// 100% of the reference capacity for CPU maximum and the CPU weight ceiling
pub const MAX_CPU_MAXIMUM: u64 = 10_000;
pub const MIN_CPU_MAXIMUM: u64 = 1;

pub const MAX_SHARES: u64 = 10_000;
/// Lowest CPU weight accepted for process-isolated containers
pub const MIN_SHARES_PROCESS: u64 = 5_000;
/// Lowest CPU weight accepted for Hyper-V isolated containers
pub const MIN_SHARES_HYPERV: u64 = 10;

const MILLI_CPU_TO_CPU: u64 = 1_000;

/// How a container is isolated from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsolationMode {
    /// Windows Server Container, shares the host kernel
    #[default]
    Default,
    /// Runs inside a utility VM
    HyperV,
}

impl IsolationMode {
    /// Hyper-V isolation is used only when the feature is enabled and the pod asks for it.
    pub fn from_annotations(annotations: &BTreeMap<String, String>, hyperv_enabled: bool) -> Self {
        if !hyperv_enabled {
            return IsolationMode::Default;
        }
        match annotations.get(ISOLATION_ANNOTATION_KEY) {
            Some(value) if value == ISOLATION_HYPERV => IsolationMode::HyperV,
            _ => IsolationMode::Default,
        }
    }

    pub fn is_hyperv(self) -> bool {
        self == IsolationMode::HyperV
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationMode::Default => write!(f, "Default"),
            IsolationMode::HyperV => write!(f, "HyperV"),
        }
    }
}

/// CPU and memory asks for one container. Zero means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cpu_request_milli: u64,
    pub cpu_limit_milli: u64,
    pub memory_limit_bytes: u64,
}

/// Resource controls handed to the runtime. Zero means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsResourceControl {
    pub cpu_shares: u64,
    pub cpu_count: u64,
    pub cpu_maximum: u64,
    #[serde(rename = "memoryLimitInBytes")]
    pub memory_limit_bytes: u64,
}

impl WindowsResourceControl {
    /// The single CPU control in effect, by precedence.
    pub fn cpu_control(&self) -> CpuControl {
        CpuControl::select(self.cpu_count, self.cpu_shares, self.cpu_maximum).control
    }
}

/// The processor control kinds, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpuControlKind {
    Count,
    Shares,
    Maximum,
}

impl fmt::Display for CpuControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuControlKind::Count => write!(f, "CPUCount"),
            CpuControlKind::Shares => write!(f, "CPUShares"),
            CpuControlKind::Maximum => write!(f, "CPUMaximum"),
        }
    }
}

/// The one processor control a Windows Server Container gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuControl {
    Count(u64),
    Shares(u64),
    Maximum(u64),
    Unset,
}

/// Outcome of precedence resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuSelection {
    pub control: CpuControl,
    /// Non-zero controls dropped in favor of `control`
    pub suppressed: Vec<CpuControlKind>,
}

impl CpuControl {
    /// Pick the highest-precedence non-zero control.
    pub fn select(count: u64, shares: u64, maximum: u64) -> CpuSelection {
        let candidates = [
            (CpuControlKind::Count, count),
            (CpuControlKind::Shares, shares),
            (CpuControlKind::Maximum, maximum),
        ];

        let winner = candidates.iter().find(|(_, value)| *value > 0).copied();
        let Some((winning_kind, value)) = winner else {
            return CpuSelection {
                control: CpuControl::Unset,
                suppressed: Vec::new(),
            };
        };

        let suppressed = candidates
            .iter()
            .filter(|(kind, value)| *kind > winning_kind && *value > 0)
            .map(|(kind, _)| *kind)
            .collect();

        let control = match winning_kind {
            CpuControlKind::Count => CpuControl::Count(value),
            CpuControlKind::Shares => CpuControl::Shares(value),
            CpuControlKind::Maximum => CpuControl::Maximum(value),
        };

        CpuSelection { control, suppressed }
    }

    pub fn kind(&self) -> Option<CpuControlKind> {
        match self {
            CpuControl::Count(_) => Some(CpuControlKind::Count),
            CpuControl::Shares(_) => Some(CpuControlKind::Shares),
            CpuControl::Maximum(_) => Some(CpuControlKind::Maximum),
            CpuControl::Unset => None,
        }
    }

    /// Returns (count, shares, maximum) with only the selected field set.
    fn into_fields(self) -> (u64, u64, u64) {
        match self {
            CpuControl::Count(n) => (n, 0, 0),
            CpuControl::Shares(n) => (0, n, 0),
            CpuControl::Maximum(n) => (0, 0, n),
            CpuControl::Unset => (0, 0, 0),
        }
    }
}

/// Convert millicores to a Windows CPU weight.
///
/// Zero millicores yields zero (no weight requested). Otherwise the weight is
/// scaled to the host CPU count and clamped to `[min, MAX_SHARES]`, where the
/// minimum depends on the isolation mode.
pub fn milli_cpu_to_shares(milli_cpu: u64, isolation: IsolationMode, host_cpu_count: u32) -> u64 {
    if milli_cpu == 0 {
        return 0;
    }
    let min_shares = if isolation.is_hyperv() {
        MIN_SHARES_HYPERV
    } else {
        MIN_SHARES_PROCESS
    };
    let host_cpus = u64::from(host_cpu_count.max(1));

    let shares = milli_cpu.saturating_mul(MAX_SHARES - min_shares) / host_cpus / MILLI_CPU_TO_CPU;
    shares.clamp(min_shares, MAX_SHARES)
}

/// Count and maximum derived from the CPU limit, before precedence.
fn limit_controls(cpu_limit_milli: u64, isolation: IsolationMode, host_cpus: u64) -> (u64, u64) {
    if cpu_limit_milli == 0 {
        return (0, 0);
    }

    // Share of the whole host, in ten-thousandths.
    let mut maximum = MAX_CPU_MAXIMUM.saturating_mul(cpu_limit_milli) / host_cpus / MILLI_CPU_TO_CPU;
    let mut count = 0;

    if isolation.is_hyperv() {
        // Partial cores round up to whole virtual processors.
        count = cpu_limit_milli.div_ceil(MILLI_CPU_TO_CPU);
        if count != 0 {
            // Relative to the utility VM's processors rather than the host's.
            maximum = cpu_limit_milli.saturating_mul(MAX_CPU_MAXIMUM) / count.saturating_mul(MILLI_CPU_TO_CPU);
        }
    }

    (count, maximum.clamp(MIN_CPU_MAXIMUM, MAX_CPU_MAXIMUM))
}

/// Translate CPU and memory asks into Windows resource controls.
///
/// Never fails: unset inputs produce unset controls, and a host CPU count of
/// zero is treated as one.
pub fn translate(req: &ResourceRequest, isolation: IsolationMode, host_cpu_count: u32) -> WindowsResourceControl {
    let host_cpus = u64::from(host_cpu_count.max(1));
    let (count, maximum) = limit_controls(req.cpu_limit_milli, isolation, host_cpus);

    let mut shares = milli_cpu_to_shares(req.cpu_limit_milli, isolation, host_cpu_count);
    if shares == 0 {
        shares = milli_cpu_to_shares(req.cpu_request_milli, isolation, host_cpu_count);
    }

    let (cpu_count, cpu_shares, cpu_maximum) = match isolation {
        IsolationMode::HyperV => (count, shares, maximum),
        IsolationMode::Default => {
            let selection = CpuControl::select(count, shares, maximum);
            if let Some(winner) = selection.control.kind() {
                for suppressed in &selection.suppressed {
                    tracing::warn!(
                        winner = %winner,
                        suppressed = %suppressed,
                        "Mutually exclusive options on Windows Server Containers: {} priority > {} priority, {} ignored",
                        winner,
                        suppressed,
                        suppressed
                    );
                }
            }
            selection.control.into_fields()
        }
    };

    tracing::debug!(
        isolation = %isolation,
        cpu_count,
        cpu_shares,
        cpu_maximum,
        memory_limit_bytes = req.memory_limit_bytes,
        "Translated resource controls"
    );

    WindowsResourceControl {
        cpu_shares,
        cpu_count,
        cpu_maximum,
        memory_limit_bytes: req.memory_limit_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(milli: u64) -> ResourceRequest {
        ResourceRequest {
            cpu_limit_milli: milli,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_limit_shares_win_over_maximum() {
        // Raw maximum is 10000 * 2500 / 4 / 1000 = 6250; shares take precedence.
        let (count, maximum) = limit_controls(2500, IsolationMode::Default, 4);
        assert_eq!(count, 0);
        assert_eq!(maximum, 6250);

        let rc = translate(&limit(2500), IsolationMode::Default, 4);
        assert_eq!(rc.cpu_count, 0);
        assert_eq!(rc.cpu_shares, MIN_SHARES_PROCESS);
        assert_eq!(rc.cpu_maximum, 0);
        assert_eq!(rc.cpu_control(), CpuControl::Shares(MIN_SHARES_PROCESS));
    }

    #[test]
    fn test_hyperv_limit() {
        let rc = translate(&limit(2500), IsolationMode::HyperV, 4);
        assert_eq!(rc.cpu_count, 3);
        assert_eq!(rc.cpu_maximum, 8333);
        // 2500 * 9990 / 4 / 1000
        assert_eq!(rc.cpu_shares, 6243);
    }

    #[test]
    fn test_hyperv_whole_cores_get_full_maximum() {
        let rc = translate(&limit(2000), IsolationMode::HyperV, 8);
        assert_eq!(rc.cpu_count, 2);
        assert_eq!(rc.cpu_maximum, MAX_CPU_MAXIMUM);
    }

    #[test]
    fn test_hyperv_count_is_ceil_of_limit() {
        for milli in [1u64, 999, 1000, 1001, 2500, 64_000, 64_001] {
            let (count, maximum) = limit_controls(milli, IsolationMode::HyperV, 4);
            assert_eq!(count, (milli + 999) / 1000);
            let raw = milli * 10_000 / (count * 1000);
            assert_eq!(maximum, raw.clamp(MIN_CPU_MAXIMUM, MAX_CPU_MAXIMUM));
        }
    }

    #[test]
    fn test_maximum_is_clamped() {
        // 1m on a 64 core host is below one ten-thousandth.
        assert_eq!(limit_controls(1, IsolationMode::Default, 64).1, MIN_CPU_MAXIMUM);
        // Limit above host capacity caps at 100%.
        assert_eq!(limit_controls(16_000, IsolationMode::Default, 4).1, MAX_CPU_MAXIMUM);
    }

    #[test]
    fn test_maximum_in_range_for_default_isolation() {
        for host in [1u32, 2, 3, 4, 7, 16, 64] {
            for milli in [1u64, 10, 250, 999, 1000, 2500, 10_000, 1_000_000, u64::MAX] {
                let (_, maximum) = limit_controls(milli, IsolationMode::Default, u64::from(host));
                assert!((MIN_CPU_MAXIMUM..=MAX_CPU_MAXIMUM).contains(&maximum));
            }
        }
    }

    #[test]
    fn test_at_most_one_cpu_control_for_default_isolation() {
        for host in [1u32, 2, 4, 64] {
            for request in [0u64, 100, 1500] {
                for cpu_limit in [0u64, 1, 500, 2500, 128_000] {
                    let req = ResourceRequest {
                        cpu_request_milli: request,
                        cpu_limit_milli: cpu_limit,
                        memory_limit_bytes: 0,
                    };
                    let rc = translate(&req, IsolationMode::Default, host);
                    let set = [rc.cpu_count, rc.cpu_shares, rc.cpu_maximum]
                        .iter()
                        .filter(|v| **v > 0)
                        .count();
                    assert!(set <= 1, "{:?} on {} cpus gave {:?}", req, host, rc);
                }
            }
        }
    }

    #[test]
    fn test_no_cpu_asks_means_no_shares() {
        let rc = translate(&ResourceRequest::default(), IsolationMode::Default, 4);
        assert_eq!(rc, WindowsResourceControl::default());
        assert_eq!(rc.cpu_control(), CpuControl::Unset);

        let rc = translate(&ResourceRequest::default(), IsolationMode::HyperV, 4);
        assert_eq!(rc, WindowsResourceControl::default());
    }

    #[test]
    fn test_shares_fall_back_to_request() {
        let req = ResourceRequest {
            cpu_request_milli: 500,
            ..Default::default()
        };
        let rc = translate(&req, IsolationMode::HyperV, 2);
        // 500 * 9990 / 2 / 1000
        assert_eq!(rc.cpu_shares, 2497);
        assert_eq!(rc.cpu_count, 0);
        assert_eq!(rc.cpu_maximum, 0);
    }

    #[test]
    fn test_shares_prefer_limit_over_request() {
        let req = ResourceRequest {
            cpu_request_milli: 100,
            cpu_limit_milli: 4000,
            memory_limit_bytes: 0,
        };
        let rc = translate(&req, IsolationMode::HyperV, 4);
        assert_eq!(rc.cpu_shares, 9990);
    }

    #[test]
    fn test_milli_cpu_to_shares_bounds() {
        assert_eq!(milli_cpu_to_shares(0, IsolationMode::Default, 4), 0);
        assert_eq!(milli_cpu_to_shares(0, IsolationMode::HyperV, 4), 0);
        assert_eq!(milli_cpu_to_shares(1, IsolationMode::Default, 4), MIN_SHARES_PROCESS);
        assert_eq!(milli_cpu_to_shares(1, IsolationMode::HyperV, 4), MIN_SHARES_HYPERV);
        assert_eq!(milli_cpu_to_shares(8000, IsolationMode::Default, 4), MAX_SHARES);
        assert_eq!(milli_cpu_to_shares(u64::MAX, IsolationMode::HyperV, 1), MAX_SHARES);
        // 2000 * 5000 / 1 / 1000 = 10000
        assert_eq!(milli_cpu_to_shares(2000, IsolationMode::Default, 1), MAX_SHARES);
        assert_eq!(milli_cpu_to_shares(1200, IsolationMode::Default, 1), 6000);
    }

    #[test]
    fn test_zero_host_cpus_treated_as_one() {
        assert_eq!(
            translate(&limit(500), IsolationMode::HyperV, 0),
            translate(&limit(500), IsolationMode::HyperV, 1)
        );
    }

    #[test]
    fn test_memory_passthrough() {
        let req = ResourceRequest {
            memory_limit_bytes: 512 << 20,
            ..Default::default()
        };
        let rc = translate(&req, IsolationMode::Default, 4);
        assert_eq!(rc.memory_limit_bytes, 512 << 20);
        assert_eq!(rc.cpu_control(), CpuControl::Unset);
    }

    #[test]
    fn test_select_precedence() {
        let selection = CpuControl::select(2, 5000, 8000);
        assert_eq!(selection.control, CpuControl::Count(2));
        assert_eq!(
            selection.suppressed,
            vec![CpuControlKind::Shares, CpuControlKind::Maximum]
        );

        let selection = CpuControl::select(0, 5000, 8000);
        assert_eq!(selection.control, CpuControl::Shares(5000));
        assert_eq!(selection.suppressed, vec![CpuControlKind::Maximum]);

        let selection = CpuControl::select(2, 0, 8000);
        assert_eq!(selection.control, CpuControl::Count(2));
        assert_eq!(selection.suppressed, vec![CpuControlKind::Maximum]);

        let selection = CpuControl::select(0, 0, 8000);
        assert_eq!(selection.control, CpuControl::Maximum(8000));
        assert!(selection.suppressed.is_empty());

        assert_eq!(CpuControl::select(0, 0, 0).control, CpuControl::Unset);
    }

    #[test]
    fn test_isolation_from_annotations() {
        let mut annotations = BTreeMap::new();
        assert_eq!(IsolationMode::from_annotations(&annotations, true), IsolationMode::Default);

        annotations.insert(ISOLATION_ANNOTATION_KEY.to_string(), "process".to_string());
        assert_eq!(IsolationMode::from_annotations(&annotations, true), IsolationMode::Default);

        annotations.insert(ISOLATION_ANNOTATION_KEY.to_string(), ISOLATION_HYPERV.to_string());
        assert_eq!(IsolationMode::from_annotations(&annotations, true), IsolationMode::HyperV);
        assert_eq!(IsolationMode::from_annotations(&annotations, false), IsolationMode::Default);
    }

    #[test]
    fn test_resource_control_serializes_cri_names() {
        let rc = WindowsResourceControl {
            cpu_shares: 5000,
            cpu_count: 0,
            cpu_maximum: 0,
            memory_limit_bytes: 1024,
        };
        let json = serde_json::to_value(rc).unwrap();
        assert_eq!(json["cpuShares"], 5000);
        assert_eq!(json["cpuCount"], 0);
        assert_eq!(json["memoryLimitInBytes"], 1024);
    }
}
