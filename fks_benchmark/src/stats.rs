use std::fmt::{Display, Formatter};

use fks::stats::BuildCounters;

/// Represents average (per key) lookup time (seconds) and its outcomes.
pub struct SearchStats {
    /// average lookup time
    pub avg_lookup_time: f64,
    /// proportion of keys found
    pub found: f64
}

impl SearchStats {
    pub fn nan() -> Self {
        Self { avg_lookup_time: f64::NAN, found: f64::NAN }
    }
}

/// Building statistics
pub struct BuildStats {
    /// Construction time in seconds
    pub time: f64,
    /// Events of the construction
    pub counters: BuildCounters
}

impl Display for BuildStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "build time [ms]: {:.0}\tattempts: {}\tsecondary draws per bucket: {:.2} (max {})",
            self.time * 1_000.0, self.counters.attempts,
            self.counters.mean_secondary_draws(), self.counters.max_secondary_draws)
    }
}

/// All statistics/results.
pub struct BenchmarkResult {
    pub included: SearchStats,
    pub absent: SearchStats,
    pub size_bytes: usize,
    pub bits_per_key: f64,
    /// Number of buckets plus slots, relative to number of buckets
    pub relative_total_size: f64,
    pub build: BuildStats
}

impl Display for BenchmarkResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "size [bytes]: {}\tsize [bits/key]: {:.2}\ttotal size [N]: {:.2}",
            self.size_bytes, self.bits_per_key, self.relative_total_size)?;
        if !self.included.avg_lookup_time.is_nan() {
            write!(f, "\tlookup time [ns]: {:.0} ({:.0}% found)",
                self.included.avg_lookup_time * 1_000_000_000.0, self.included.found * 100.0)?;
        }
        if !self.absent.avg_lookup_time.is_nan() {
            write!(f, "\tabsent lookup time [ns]: {:.0} ({:.0}% found)",
                self.absent.avg_lookup_time * 1_000_000_000.0, self.absent.found * 100.0)?;
        }
        write!(f, "\t{}", self.build)
    }
}
