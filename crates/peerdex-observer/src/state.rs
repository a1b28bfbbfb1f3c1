//! Three-level classification of resource readings.
//!
//! Every axis has a steady-state target and a hard limit. Free space and
//! free memory are lower bounds, the size of the data directory is an upper
//! bound.

use std::fmt;

use peerdex_config::components::{ResourceConfig, BYTES_PER_MIB};

/// Health of one resource axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Beyond the hard limit
    Exhausted,
    /// Between the steady-state target and the hard limit
    Nominal,
    /// Better than the steady-state target
    Ample,
}

impl ResourceState {
    pub fn is_ample(&self) -> bool {
        matches!(self, ResourceState::Ample)
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceState::Exhausted => "EXHAUSTED",
            ResourceState::Nominal => "NOMINAL",
            ResourceState::Ample => "AMPLE",
        };
        f.write_str(name)
    }
}

/// An observed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    DiskFree,
    DiskUsed,
    Memory,
}

impl Axis {
    /// Upper-bound axes are healthy while small.
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Axis::DiskUsed)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::DiskFree => "disk free",
            Axis::DiskUsed => "disk used",
            Axis::Memory => "memory free",
        };
        f.write_str(name)
    }
}

/// Steady-state target and hard limit of one axis, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub steady_state: u64,
    pub hard_limit: u64,
}

impl Thresholds {
    pub fn new(steady_state: u64, hard_limit: u64) -> Self {
        Self {
            steady_state,
            hard_limit,
        }
    }

    /// Thresholds for `axis` from the MiB values in `config`.
    pub fn for_axis(axis: Axis, config: &ResourceConfig) -> Self {
        let (steady, hard) = match axis {
            Axis::DiskFree => (
                config.disk_free.min_steadystate_mib,
                config.disk_free.min_undershot_mib,
            ),
            Axis::DiskUsed => (
                config.disk_used.max_steadystate_mib,
                config.disk_used.max_overshot_mib,
            ),
            Axis::Memory => (
                config.memory.min_steadystate_mib,
                config.memory.min_undershot_mib,
            ),
        };
        Self::new(
            steady.saturating_mul(BYTES_PER_MIB),
            hard.saturating_mul(BYTES_PER_MIB),
        )
    }
}

/// Classify a lower-bound reading such as free disk space.
pub fn classify_free(value: u64, thresholds: Thresholds) -> ResourceState {
    if value < thresholds.hard_limit {
        ResourceState::Exhausted
    } else if value < thresholds.steady_state {
        ResourceState::Nominal
    } else {
        ResourceState::Ample
    }
}

/// Classify an upper-bound reading such as the data directory size.
pub fn classify_used(value: u64, thresholds: Thresholds) -> ResourceState {
    if value > thresholds.hard_limit {
        ResourceState::Exhausted
    } else if value > thresholds.steady_state {
        ResourceState::Nominal
    } else {
        ResourceState::Ample
    }
}

/// One classified reading. A failed probe leaves `value` empty and counts
/// as AMPLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisReading {
    pub axis: Axis,
    pub value: Option<u64>,
    pub thresholds: Thresholds,
    pub state: ResourceState,
}

impl AxisReading {
    pub fn classify(axis: Axis, value: Option<u64>, thresholds: Thresholds) -> Self {
        let state = match value {
            None => ResourceState::Ample,
            Some(v) if axis.is_upper_bound() => classify_used(v, thresholds),
            Some(v) => classify_free(v, thresholds),
        };
        Self {
            axis,
            value,
            thresholds,
            state,
        }
    }

    /// The threshold this reading has crossed, if any.
    pub fn crossed_threshold(&self) -> Option<u64> {
        match self.state {
            ResourceState::Exhausted => Some(self.thresholds.hard_limit),
            ResourceState::Nominal => Some(self.thresholds.steady_state),
            ResourceState::Ample => None,
        }
    }

    /// Human readable cause, e.g. `disk free 900 MiB below 1024 MiB (EXHAUSTED)`.
    pub fn describe(&self) -> String {
        let value = self.value.map(mib).unwrap_or(0);
        match self.crossed_threshold() {
            Some(threshold) => {
                let relation = if self.axis.is_upper_bound() {
                    "above"
                } else {
                    "below"
                };
                format!(
                    "{} {} MiB {} {} MiB ({})",
                    self.axis,
                    value,
                    relation,
                    mib(threshold),
                    self.state
                )
            }
            None => format!("{} {} MiB ({})", self.axis, value, self.state),
        }
    }
}

fn mib(bytes: u64) -> u64 {
    bytes / BYTES_PER_MIB
}

/// Readings of all three axes taken in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub disk_free: AxisReading,
    pub disk_used: AxisReading,
    pub memory: AxisReading,
}

impl ResourceSnapshot {
    pub fn readings(&self) -> [AxisReading; 3] {
        [self.disk_free, self.disk_used, self.memory]
    }

    pub fn all_ample(&self) -> bool {
        self.readings().iter().all(|r| r.state.is_ample())
    }

    pub fn disk_ample(&self) -> bool {
        self.disk_free.state.is_ample() && self.disk_used.state.is_ample()
    }

    /// Causes of every non-AMPLE axis joined into one line.
    pub fn pressure_cause(&self) -> Option<String> {
        let causes: Vec<String> = self
            .readings()
            .iter()
            .filter(|r| !r.state.is_ample())
            .map(AxisReading::describe)
            .collect();
        if causes.is_empty() {
            None
        } else {
            Some(causes.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = BYTES_PER_MIB;

    fn free_limits() -> Thresholds {
        Thresholds::new(2048 * MIB, 1024 * MIB)
    }

    fn used_limits() -> Thresholds {
        Thresholds::new(512 * MIB, 1024 * MIB)
    }

    #[test]
    fn test_free_classification_at_boundaries() {
        let limits = free_limits();
        assert_eq!(
            classify_free(limits.hard_limit - 1, limits),
            ResourceState::Exhausted
        );
        assert_eq!(
            classify_free(limits.steady_state - 1, limits),
            ResourceState::Nominal
        );
        assert_eq!(
            classify_free(limits.steady_state + 1, limits),
            ResourceState::Ample
        );
    }

    #[test]
    fn test_free_values_on_a_threshold() {
        let limits = free_limits();
        assert_eq!(classify_free(limits.hard_limit, limits), ResourceState::Nominal);
        assert_eq!(classify_free(limits.steady_state, limits), ResourceState::Ample);
    }

    #[test]
    fn test_used_classification_at_boundaries() {
        let limits = used_limits();
        assert_eq!(
            classify_used(limits.hard_limit + 1, limits),
            ResourceState::Exhausted
        );
        assert_eq!(classify_used(limits.hard_limit, limits), ResourceState::Nominal);
        assert_eq!(
            classify_used(limits.steady_state + 1, limits),
            ResourceState::Nominal
        );
        assert_eq!(classify_used(limits.steady_state, limits), ResourceState::Ample);
    }

    #[test]
    fn test_failed_probe_counts_as_ample() {
        let reading = AxisReading::classify(Axis::DiskFree, None, free_limits());
        assert_eq!(reading.state, ResourceState::Ample);
        assert_eq!(reading.crossed_threshold(), None);
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = ResourceConfig::default();
        let limits = Thresholds::for_axis(Axis::DiskFree, &config);
        assert_eq!(limits.steady_state, 2048 * MIB);
        assert_eq!(limits.hard_limit, 1024 * MIB);

        let memory = Thresholds::for_axis(Axis::Memory, &config);
        assert_eq!(memory.hard_limit, 20 * MIB);
    }

    #[test]
    fn test_describe_names_axis_value_and_threshold() {
        let reading = AxisReading::classify(Axis::DiskFree, Some(900 * MIB), free_limits());
        assert_eq!(
            reading.describe(),
            "disk free 900 MiB below 1024 MiB (EXHAUSTED)"
        );

        let used = AxisReading::classify(Axis::DiskUsed, Some(600 * MIB), used_limits());
        assert_eq!(used.describe(), "disk used 600 MiB above 512 MiB (NOMINAL)");
    }

    #[test]
    fn test_snapshot_pressure_cause() {
        let config = ResourceConfig::default();
        let snapshot = ResourceSnapshot {
            disk_free: AxisReading::classify(
                Axis::DiskFree,
                Some(u64::MAX),
                Thresholds::for_axis(Axis::DiskFree, &config),
            ),
            disk_used: AxisReading::classify(
                Axis::DiskUsed,
                Some(0),
                Thresholds::for_axis(Axis::DiskUsed, &config),
            ),
            memory: AxisReading::classify(
                Axis::Memory,
                Some(10 * MIB),
                Thresholds::for_axis(Axis::Memory, &config),
            ),
        };
        assert!(snapshot.disk_ample());
        assert!(!snapshot.all_ample());
        assert_eq!(
            snapshot.pressure_cause().as_deref(),
            Some("memory free 10 MiB below 20 MiB (EXHAUSTED)")
        );
    }
}
