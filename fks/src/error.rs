use thiserror::Error;

/// Reasons of [`PerfectHashTable`](crate::PerfectHashTable) construction failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("table size must be positive")]
    ZeroTableSize,

    #[error("{keys} keys do not fit in the table of size {table_size}")]
    TooManyKeys { keys: usize, table_size: usize },

    #[error("modulus {modulus} is not a prime")]
    NotPrime { modulus: u64 },

    #[error("key {key} is not below the modulus {modulus}")]
    KeyOutOfRange { key: u64, modulus: u64 },

    #[error("there is no 64-bit prime greater than key {key}")]
    NoModulus { key: u64 },

    #[error("key {key} occurs more than once in the input")]
    DuplicateKey { key: u64 },

    /// Practically impossible for the default configuration and valid input.
    #[error("construction failed in all {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}
