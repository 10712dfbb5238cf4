/// Build configuration that is accepted by [`PerfectHashTable`](crate::PerfectHashTable) constructors.
///
/// See field descriptions for details.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildConf {
    /// Number of buckets of the primary level, *N*.
    ///
    /// Must be positive and not smaller than the number of keys.
    /// The table occupies at most *4N* slots and buckets in total.
    pub table_size: usize,

    /// Prime modulus *P* of the hash family, which must be greater than all keys. (default: [`None`])
    ///
    /// If [`None`], the smallest prime greater than the largest key is used.
    pub modulus: Option<u64>,

    /// Maximum number of construction attempts (primary function draws). (default: [`BuildConf::DEFAULT_MAX_ATTEMPTS`])
    ///
    /// Each attempt succeeds with probability above 1/3, so the default makes the failure practically impossible.
    pub max_attempts: u32,

    /// Maximum number of secondary function draws for a single bucket within one attempt.
    /// (default: [`BuildConf::DEFAULT_MAX_SECONDARY_DRAWS`])
    ///
    /// Each draw succeeds with probability at least 1/2.
    /// If all fail, the attempt is dropped and construction starts over.
    pub max_secondary_draws: u32,
}

impl BuildConf {
    /// The default value for [`max_attempts`](BuildConf::max_attempts).
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

    /// The default value for [`max_secondary_draws`](BuildConf::max_secondary_draws).
    pub const DEFAULT_MAX_SECONDARY_DRAWS: u32 = 64;

    /// Returns configuration that uses `table_size` buckets and derives the modulus from the keys.
    pub fn size(table_size: usize) -> Self {
        Self {
            table_size,
            modulus: None,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            max_secondary_draws: Self::DEFAULT_MAX_SECONDARY_DRAWS
        }
    }

    /// Returns configuration that uses `table_size` buckets and the given prime `modulus`.
    pub fn size_modulus(table_size: usize, modulus: u64) -> Self {
        Self { modulus: Some(modulus), ..Self::size(table_size) }
    }

    /// Returns configuration that uses `table_size` buckets and at most `max_attempts` attempts.
    pub fn size_attempts(table_size: usize, max_attempts: u32) -> Self {
        Self { max_attempts, ..Self::size(table_size) }
    }

    /// Returns configuration that uses `table_size` buckets, the given prime `modulus`
    /// and at most `max_attempts` attempts.
    pub fn size_modulus_attempts(table_size: usize, modulus: u64, max_attempts: u32) -> Self {
        Self { modulus: Some(modulus), max_attempts, ..Self::size(table_size) }
    }
}
