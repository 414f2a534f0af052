//! Rate/resource advisor: bounds computed from host signals.
//!
//! Startup-time probes turn host resources into operating bounds — the
//! response-cache capacity comes from total memory, the tokio worker count
//! from the cgroup CPU quota, and the per-tier throughput ceilings are
//! fixed multipliers. Probe failures never crash the gateway: every path
//! falls back to a safe fixed default and logs a warning.

use sysinfo::System;

use crate::core::config::{RateLimitConfig, Tier};

/// Cache capacity for hosts with more than 7 GiB of memory.
pub const CACHE_CAPACITY_LARGE: usize = 1024;
/// Cache capacity for hosts with more than 3.5 GiB of memory.
pub const CACHE_CAPACITY_MEDIUM: usize = 512;
/// Cache capacity fallback tier.
pub const CACHE_CAPACITY_SMALL: usize = 128;

/// Compute the response-cache capacity from total host memory.
///
/// Three-tier step function over total memory in GiB; an unreadable
/// measurement falls back to the smallest tier.
pub fn cache_capacity() -> usize {
    let mut sys = System::new();
    sys.refresh_memory();
    let total_bytes = sys.total_memory();

    if total_bytes == 0 {
        tracing::warn!("Could not read host memory size; using smallest cache tier");
        return CACHE_CAPACITY_SMALL;
    }

    capacity_for_memory_gib(total_bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

fn capacity_for_memory_gib(gib: f64) -> usize {
    if gib > 7.0 {
        CACHE_CAPACITY_LARGE
    } else if gib > 3.5 {
        CACHE_CAPACITY_MEDIUM
    } else {
        CACHE_CAPACITY_SMALL
    }
}

/// Throughput ceiling for a caller tier.
///
/// Business callers get a higher ceiling than customers; explicit
/// per-credential limits in the configuration override these.
pub fn tier_rate_limit(tier: Tier) -> RateLimitConfig {
    match tier {
        Tier::Customer => RateLimitConfig {
            requests_per_second: 10,
            burst_size: 20,
        },
        Tier::Business => RateLimitConfig {
            requests_per_second: 50,
            burst_size: 100,
        },
    }
}

/// Resolve the tokio worker thread count.
///
/// Order of precedence: `TOKIO_WORKER_THREADS` env var, cgroup CPU quota
/// (for containerized deployments), then 1.
pub fn worker_threads() -> usize {
    std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| detect_cpu_limit().unwrap_or(1))
}

/// Detect CPU limit from cgroup (for containerized environments).
fn detect_cpu_limit() -> Option<usize> {
    // Try cgroup v2 first
    if let Ok(max) = std::fs::read_to_string("/sys/fs/cgroup/cpu.max") {
        let parts: Vec<&str> = max.split_whitespace().collect();
        if parts.len() == 2 {
            if let (Ok(quota), Ok(period)) = (parts[0].parse::<i64>(), parts[1].parse::<i64>()) {
                if quota > 0 {
                    let cores = ((quota as f64 / period as f64).ceil() as usize).max(1);
                    tracing::debug!(cores, "Detected CPU limit from cgroup v2");
                    return Some(cores);
                }
            }
        }
    }

    // Fallback to cgroup v1
    let quota = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_quota_us")
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;

    let period = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_period_us")
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;

    if quota > 0 {
        let cores = ((quota as f64 / period as f64).ceil() as usize).max(1);
        tracing::debug!(cores, "Detected CPU limit from cgroup v1");
        Some(cores)
    } else {
        None
    }
}
