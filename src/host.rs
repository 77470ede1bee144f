//! Host facts needed to size CPU controls

/// Processors visible to a single process on Windows (one processor group)
pub const MAX_PROCESSOR_GROUP_SIZE: u32 = 64;

/// Source of host facts
#[cfg_attr(test, mockall::automock)]
pub trait HostInfo {
    /// Logical CPUs available for containers, always at least 1
    fn num_cpu(&self) -> u32;
}

/// Queries the machine this process runs on
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    fn num_cpu(&self) -> u32 {
        let count = match std::thread::available_parallelism() {
            Ok(n) => u32::try_from(n.get()).unwrap_or(u32::MAX),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to query host CPU count, assuming 1");
                1
            }
        };
        count.clamp(1, MAX_PROCESSOR_GROUP_SIZE)
    }
}

/// A host with a fixed CPU count
#[derive(Debug, Clone, Copy)]
pub struct FixedHost(pub u32);

impl HostInfo for FixedHost {
    fn num_cpu(&self) -> u32 {
        self.0.max(1)
    }
}
