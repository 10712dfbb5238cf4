//! Collecting statistics of construction and lookups.

use std::io::Write;

/// Receives events of [`PerfectHashTable`](crate::PerfectHashTable) construction.
pub trait BuildStatsCollector {
    /// Called at the beginning of each construction attempt (counting from 0),
    /// just before drawing the primary function.
    #[inline(always)] fn attempt(&mut self, _attempt_nr: u32) {}

    /// Called when the total size of the attempt (number of buckets plus squared bucket sizes)
    /// exceeds the allowed `bound`; the attempt is dropped.
    #[inline(always)] fn space_exceeded(&mut self, _total_size: usize, _bound: usize) {}

    /// Called when a collision-free secondary function for `bucket` of `bucket_len` keys was found in `draws` draws.
    #[inline(always)] fn secondary(&mut self, _bucket: usize, _bucket_len: usize, _draws: u32) {}

    /// Called when no collision-free secondary function for `bucket` was found in `draws` draws;
    /// the attempt is dropped.
    #[inline(always)] fn secondary_exhausted(&mut self, _bucket: usize, _bucket_len: usize, _draws: u32) {}

    /// Called once, after successful construction of the table of the given total size.
    #[inline(always)] fn end(&mut self, _total_size: usize) {}
}

impl BuildStatsCollector for () {}

impl<T: BuildStatsCollector + ?Sized> BuildStatsCollector for &mut T {
    #[inline(always)] fn attempt(&mut self, attempt_nr: u32) { (**self).attempt(attempt_nr) }
    #[inline(always)] fn space_exceeded(&mut self, total_size: usize, bound: usize) { (**self).space_exceeded(total_size, bound) }
    #[inline(always)] fn secondary(&mut self, bucket: usize, bucket_len: usize, draws: u32) { (**self).secondary(bucket, bucket_len, draws) }
    #[inline(always)] fn secondary_exhausted(&mut self, bucket: usize, bucket_len: usize, draws: u32) { (**self).secondary_exhausted(bucket, bucket_len, draws) }
    #[inline(always)] fn end(&mut self, total_size: usize) { (**self).end(total_size) }
}

/// Passes each event to both collectors.
impl<A: BuildStatsCollector, B: BuildStatsCollector> BuildStatsCollector for (A, B) {
    fn attempt(&mut self, attempt_nr: u32) { self.0.attempt(attempt_nr); self.1.attempt(attempt_nr); }
    fn space_exceeded(&mut self, total_size: usize, bound: usize) {
        self.0.space_exceeded(total_size, bound); self.1.space_exceeded(total_size, bound);
    }
    fn secondary(&mut self, bucket: usize, bucket_len: usize, draws: u32) {
        self.0.secondary(bucket, bucket_len, draws); self.1.secondary(bucket, bucket_len, draws);
    }
    fn secondary_exhausted(&mut self, bucket: usize, bucket_len: usize, draws: u32) {
        self.0.secondary_exhausted(bucket, bucket_len, draws); self.1.secondary_exhausted(bucket, bucket_len, draws);
    }
    fn end(&mut self, total_size: usize) { self.0.end(total_size); self.1.end(total_size); }
}

/// Prints construction events to the wrapped writer.
/// Secondary searches are reported only if they needed more than one draw.
pub struct BuildStatsPrinter<W: Write = std::io::Stdout> {
    writer: W,
}

impl BuildStatsPrinter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self { writer: std::io::stdout() }
    }
}

impl<W: Write> BuildStatsPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W { self.writer }
}

impl<W: Write> BuildStatsCollector for BuildStatsPrinter<W> {
    fn attempt(&mut self, attempt_nr: u32) {
        let _ = writeln!(self.writer, "attempt {}", attempt_nr);
    }

    fn space_exceeded(&mut self, total_size: usize, bound: usize) {
        let _ = writeln!(self.writer, "  total size {} exceeds {}", total_size, bound);
    }

    fn secondary(&mut self, bucket: usize, bucket_len: usize, draws: u32) {
        if draws > 1 {
            let _ = writeln!(self.writer, "  bucket {} of {} keys: {} draws", bucket, bucket_len, draws);
        }
    }

    fn secondary_exhausted(&mut self, bucket: usize, bucket_len: usize, draws: u32) {
        let _ = writeln!(self.writer, "  bucket {} of {} keys: no perfect function in {} draws", bucket, bucket_len, draws);
    }

    fn end(&mut self, total_size: usize) {
        let _ = writeln!(self.writer, "done, total size {}", total_size);
    }
}

/// Accumulates construction statistics over all attempts.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct BuildCounters {
    /// Number of construction attempts started.
    pub attempts: u32,
    /// Number of attempts dropped because of exceeding the space bound.
    pub space_exceeded: u32,
    /// Number of attempts dropped because some bucket exhausted its secondary draws.
    pub secondary_exhausted: u32,
    /// Total number of secondary functions drawn.
    pub secondary_draws: u64,
    /// Number of buckets that obtained their secondary function.
    pub buckets: u64,
    /// The largest number of draws needed by a single bucket.
    pub max_secondary_draws: u32,
    /// Draws after the first one made for buckets with a single key.
    pub single_key_redraws: u32,
    /// Total size of the constructed table, `0` if the construction did not finish.
    pub total_size: usize,
}

impl BuildCounters {
    /// Returns the number of attempts beyond the first one.
    #[inline] pub fn restarts(&self) -> u32 { self.attempts.saturating_sub(1) }

    /// Returns the mean number of draws per bucket that obtained its secondary function.
    pub fn mean_secondary_draws(&self) -> f64 {
        if self.buckets == 0 { 0.0 } else { self.secondary_draws as f64 / self.buckets as f64 }
    }
}

impl BuildStatsCollector for BuildCounters {
    fn attempt(&mut self, _attempt_nr: u32) { self.attempts += 1; }

    fn space_exceeded(&mut self, _total_size: usize, _bound: usize) { self.space_exceeded += 1; }

    fn secondary(&mut self, _bucket: usize, bucket_len: usize, draws: u32) {
        self.secondary_draws += draws as u64;
        self.buckets += 1;
        self.max_secondary_draws = self.max_secondary_draws.max(draws);
        if bucket_len == 1 { self.single_key_redraws += draws - 1; }
    }

    fn secondary_exhausted(&mut self, _bucket: usize, _bucket_len: usize, draws: u32) {
        self.secondary_draws += draws as u64;
        self.secondary_exhausted += 1;
    }

    fn end(&mut self, total_size: usize) { self.total_size = total_size; }
}

/// Receives outcomes of lookups.
pub trait AccessStatsCollector {
    /// Lookup found the key.
    #[inline(always)] fn found(&mut self) {}

    /// Lookup ended at a bucket without keys.
    #[inline(always)] fn empty_bucket(&mut self) {}

    /// Lookup reached a slot that is empty or holds another key.
    #[inline(always)] fn mismatch(&mut self) {}

    /// Lookup was given a key not below the modulus, which cannot be in the table.
    #[inline(always)] fn out_of_domain(&mut self) {}
}

impl AccessStatsCollector for () {}

/// Counts outcomes of lookups.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct AccessCounters {
    pub found: u64,
    pub empty_bucket: u64,
    pub mismatch: u64,
    pub out_of_domain: u64,
}

impl AccessCounters {
    /// Returns the total number of lookups counted.
    #[inline] pub fn lookups(&self) -> u64 {
        self.found + self.empty_bucket + self.mismatch + self.out_of_domain
    }
}

impl AccessStatsCollector for AccessCounters {
    #[inline(always)] fn found(&mut self) { self.found += 1; }
    #[inline(always)] fn empty_bucket(&mut self) { self.empty_bucket += 1; }
    #[inline(always)] fn mismatch(&mut self) { self.mismatch += 1; }
    #[inline(always)] fn out_of_domain(&mut self) { self.out_of_domain += 1; }
}
