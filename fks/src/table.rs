use dyn_size_of::GetSize;
use rand::{CryptoRng, Rng};
use tracing::{debug, warn};

use crate::prime::{is_prime, next_prime_above};
use crate::{stats, BuildConf, BuildError, UniversalHash};

/// Content of unoccupied slots. It is never a key, as all keys are below a prime that fits in `u64`.
const EMPTY: u64 = u64::MAX;

/// Upper bound of the total size of the table (number of buckets plus number of slots),
/// given as a multiple of the number of buckets.
pub const SPACE_FACTOR: usize = 4;

/// Validates `keys` against `conf` and returns the modulus of the hash family to use.
fn validate(keys: &[u64], conf: &BuildConf) -> Result<u64, BuildError> {
    if conf.table_size == 0 { return Err(BuildError::ZeroTableSize); }
    if keys.len() > conf.table_size {
        return Err(BuildError::TooManyKeys { keys: keys.len(), table_size: conf.table_size });
    }
    if let Some(modulus) = conf.modulus {
        if !is_prime(modulus) { return Err(BuildError::NotPrime { modulus }); }
    }
    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(BuildError::DuplicateKey { key: pair[0] });
    }
    let max_key = sorted.last().copied();
    match conf.modulus {
        Some(modulus) => match max_key {
            Some(key) if key >= modulus => Err(BuildError::KeyOutOfRange { key, modulus }),
            _ => Ok(modulus)
        },
        None => {
            let key = max_key.unwrap_or(0);
            next_prime_above(key).ok_or(BuildError::NoModulus { key })
        }
    }
}

/// Replaces each element of `counts` with the sum of the preceding ones. Returns the total sum.
#[inline(always)]
fn accumulative_sum<'a>(counts: impl Iterator<Item = &'a mut usize>) -> usize {
    let mut sum = 0;
    for c in counts {
        let inc = *c; *c = sum; sum += inc;
    }
    sum
}

/// Draws secondary functions until one of them places all `keys` in distinct `slots`.
///
/// Returns the function found together with the number of draws,
/// or the number of draws made if none was found within `max_draws`.
/// On success, `slots` hold the keys at their final positions.
fn find_secondary<R>(keys: &[u64], slots: &mut [u64], modulus: u64, max_draws: u32, rng: &mut R) -> Result<(UniversalHash, u32), u32>
    where R: Rng + CryptoRng
{
    for draw in 1..=max_draws {
        let hash = UniversalHash::new(rng, modulus, slots.len());
        slots.fill(EMPTY);
        let collision_free = keys.iter().all(|key| {
            let slot = &mut slots[hash.get(*key)];
            let free = *slot == EMPTY;
            if free { *slot = *key; }
            free
        });
        if collision_free { return Ok((hash, draw)); }
    }
    Err(max_draws)
}

/// Static perfect hash table for integer keys, built with the two-level
/// Fredman-Komlós-Szemerédi (FKS) scheme.
///
/// The primary [`UniversalHash`] spreads the keys over *N* buckets.
/// Each bucket with *c > 0* keys gets its own array of *c²* slots and a secondary function
/// that maps these keys to distinct slots. Thus [`find`](PerfectHashTable::find) needs two hash evaluations
/// and one comparison in the worst case.
/// The construction repeats random draws until the total size *N + Σc²* is at most *4N*.
///
/// See:
/// - M. L. Fredman, J. Komlós, E. Szemerédi, *Storing a Sparse Table with O(1) Worst Case Access Time*,
///   Journal of the ACM, 1984, <https://doi.org/10.1145/828.1884>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerfectHashTable {
    primary: UniversalHash,
    /// Secondary function of each bucket, [`None`] for buckets without keys.
    secondary: Box<[Option<UniversalHash>]>,
    /// Slots of bucket `i` are `slots[slot_begin[i]..slot_begin[i+1]]`.
    slot_begin: Box<[usize]>,
    slots: Box<[u64]>,
    len: usize,
}

impl GetSize for PerfectHashTable {
    fn size_bytes_dyn(&self) -> usize {
        std::mem::size_of_val(&*self.secondary) + self.slot_begin.size_bytes_dyn() + self.slots.size_bytes_dyn()
    }
    fn size_bytes_content_dyn(&self) -> usize {
        std::mem::size_of_val(&*self.secondary) + self.slot_begin.size_bytes_content_dyn() + self.slots.size_bytes_content_dyn()
    }
    const USES_DYN_MEM: bool = true;
}

impl PerfectHashTable {
    /// Makes a single construction attempt with a fresh primary function.
    /// Returns [`None`] if the attempt violates the space bound or some bucket exhausts its secondary draws.
    fn try_attempt<R, BS>(keys: &[u64], conf: &BuildConf, modulus: u64, rng: &mut R, stats: &mut BS) -> Option<Self>
        where R: Rng + CryptoRng, BS: stats::BuildStatsCollector
    {
        let buckets_num = conf.table_size;
        let primary = UniversalHash::new(rng, modulus, buckets_num);
        let primary_values: Box<[usize]> = keys.iter().map(|key| primary.get(*key)).collect();

        let mut key_begin = vec![0usize; buckets_num + 1].into_boxed_slice();
        for bucket in primary_values.iter() { key_begin[*bucket] += 1; }

        let slots_len = key_begin.iter().fold(0usize, |sum, c| sum.saturating_add(c.saturating_mul(*c)));
        let total_size = buckets_num.saturating_add(slots_len);
        let bound = buckets_num.saturating_mul(SPACE_FACTOR);
        if total_size > bound {
            stats.space_exceeded(total_size, bound);
            debug!(total_size, bound, "space bound exceeded");
            return None;
        }

        let mut slot_begin = Vec::with_capacity(buckets_num + 1);
        let mut slots_sum = 0;
        for c in key_begin.iter() {
            slot_begin.push(slots_sum);
            slots_sum += c * c;
        }
        let keys_num = accumulative_sum(key_begin.iter_mut());
        debug_assert_eq!(keys_num, keys.len());

        // group the keys by buckets
        let mut grouped = vec![0u64; keys.len()].into_boxed_slice();
        let mut next = key_begin.clone();
        for (key, bucket) in keys.iter().zip(primary_values.iter()) {
            grouped[next[*bucket]] = *key;
            next[*bucket] += 1;
        }

        let mut slots = vec![EMPTY; slots_len].into_boxed_slice();
        let mut secondary = vec![None; buckets_num].into_boxed_slice();
        for bucket in 0..buckets_num {
            let bucket_keys = &grouped[key_begin[bucket]..key_begin[bucket + 1]];
            if bucket_keys.is_empty() { continue; }
            let bucket_slots = &mut slots[slot_begin[bucket]..slot_begin[bucket + 1]];
            match find_secondary(bucket_keys, bucket_slots, modulus, conf.max_secondary_draws, rng) {
                Ok((hash, draws)) => {
                    stats.secondary(bucket, bucket_keys.len(), draws);
                    secondary[bucket] = Some(hash);
                }
                Err(draws) => {
                    stats.secondary_exhausted(bucket, bucket_keys.len(), draws);
                    debug!(bucket, bucket_len = bucket_keys.len(), draws, "no perfect secondary function found");
                    return None;
                }
            }
        }

        Some(Self {
            primary,
            secondary,
            slot_begin: slot_begin.into_boxed_slice(),
            slots,
            len: keys.len()
        })
    }

    /// Constructs [`PerfectHashTable`] for given distinct `keys`, using the build configuration `conf`,
    /// random numbers from `rng` and reporting statistics with `stats`.
    ///
    /// `rng` should be a cryptographically secure generator;
    /// seeded generators make the construction reproducible.
    ///
    /// Returns an error if the input is invalid (see [`BuildError`])
    /// or all [`max_attempts`](BuildConf::max_attempts) construction attempts fail.
    pub fn try_with_conf_rng_stats<R, BS>(keys: &[u64], conf: BuildConf, rng: &mut R, stats: &mut BS) -> Result<Self, BuildError>
        where R: Rng + CryptoRng, BS: stats::BuildStatsCollector
    {
        let modulus = validate(keys, &conf)?;
        for attempt_nr in 0..conf.max_attempts {
            stats.attempt(attempt_nr);
            if let Some(table) = Self::try_attempt(keys, &conf, modulus, rng, stats) {
                stats.end(table.total_size());
                return Ok(table);
            }
            debug!(attempt_nr, "construction attempt dropped");
        }
        warn!(attempts = conf.max_attempts, keys = keys.len(), table_size = conf.table_size,
            "perfect hash table construction failed");
        Err(BuildError::AttemptsExhausted { attempts: conf.max_attempts })
    }

    /// Constructs [`PerfectHashTable`] for given distinct `keys`, using the build configuration `conf`
    /// and reporting statistics with `stats`. Random numbers are taken from [`rand::thread_rng`].
    pub fn try_with_conf_stats<BS>(keys: &[u64], conf: BuildConf, stats: &mut BS) -> Result<Self, BuildError>
        where BS: stats::BuildStatsCollector
    {
        Self::try_with_conf_rng_stats(keys, conf, &mut rand::thread_rng(), stats)
    }

    /// Constructs [`PerfectHashTable`] for given distinct `keys`, using the build configuration `conf`.
    #[inline] pub fn try_with_conf(keys: &[u64], conf: BuildConf) -> Result<Self, BuildError> {
        Self::try_with_conf_stats(keys, conf, &mut ())
    }

    /// Constructs [`PerfectHashTable`] with `table_size` buckets for given distinct `keys`.
    /// The modulus of the hash family is the smallest prime greater than the largest key.
    #[inline] pub fn try_new(keys: &[u64], table_size: usize) -> Result<Self, BuildError> {
        Self::try_with_conf(keys, BuildConf::size(table_size))
    }

    /// Returns `key` if it is in the table, [`None`] otherwise, and reports the outcome to `access_stats`.
    pub fn find_stats<A: stats::AccessStatsCollector>(&self, key: u64, access_stats: &mut A) -> Option<u64> {
        if key >= self.modulus() {
            access_stats.out_of_domain();
            return None;
        }
        let bucket = self.primary.get(key);
        let Some(secondary) = &self.secondary[bucket] else {
            access_stats.empty_bucket();
            return None;
        };
        if self.slots[self.slot_begin[bucket] + secondary.get(key)] == key {
            access_stats.found();
            Some(key)
        } else {
            access_stats.mismatch();
            None
        }
    }

    /// Returns `key` if it is in the table, [`None`] otherwise.
    #[inline] pub fn find(&self, key: u64) -> Option<u64> {
        self.find_stats(key, &mut ())
    }

    /// Returns whether `key` is in the table.
    #[inline] pub fn contains(&self, key: u64) -> bool {
        self.find(key).is_some()
    }

    /// Returns the number of keys in the table.
    #[inline] pub fn len(&self) -> usize { self.len }

    /// Returns whether the table has no keys.
    #[inline] pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Returns the number of buckets, *N*.
    #[inline] pub fn table_size(&self) -> usize { self.secondary.len() }

    /// Returns the prime modulus of the hash family. All keys are below it.
    #[inline] pub fn modulus(&self) -> u64 { self.primary.modulus() }

    /// Returns the number of buckets plus the total number of slots, *N + Σc²*,
    /// which never exceeds [`SPACE_FACTOR`]` * N`.
    #[inline] pub fn total_size(&self) -> usize { self.table_size() + self.slots.len() }

    /// Returns the primary function.
    #[inline] pub fn primary(&self) -> &UniversalHash { &self.primary }

    /// Returns the secondary function of `bucket`, or [`None`] if the bucket has no keys or does not exist.
    pub fn secondary(&self, bucket: usize) -> Option<&UniversalHash> {
        self.secondary.get(bucket)?.as_ref()
    }

    /// Returns the slots of `bucket` (empty for buckets without keys and for non-existent buckets).
    fn slots_of(&self, bucket: usize) -> &[u64] {
        match (self.slot_begin.get(bucket), self.slot_begin.get(bucket + 1)) {
            (Some(begin), Some(end)) => &self.slots[*begin..*end],
            _ => &[]
        }
    }

    /// Returns the number of slots of `bucket`, which is the square of [`bucket_len`](PerfectHashTable::bucket_len).
    pub fn bucket_slots(&self, bucket: usize) -> usize {
        self.slots_of(bucket).len()
    }

    /// Returns the number of keys in `bucket`.
    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.slots_of(bucket).iter().filter(|slot| **slot != EMPTY).count()
    }

    /// Returns an iterator over the keys in the table, in the order of their slots.
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots.iter().copied().filter(|slot| *slot != EMPTY)
    }
}

impl TryFrom<&[u64]> for PerfectHashTable {
    type Error = BuildError;

    /// Constructs [`PerfectHashTable`] with as many buckets as there are keys (at least one).
    fn try_from(keys: &[u64]) -> Result<Self, Self::Error> {
        Self::try_new(keys, keys.len().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{AccessCounters, BuildCounters};
    use rand::{rngs::StdRng, CryptoRng, RngCore, SeedableRng};

    /// Source that always returns zeros, which makes every drawn function constant.
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 { 0 }
        fn next_u64(&mut self) -> u64 { 0 }
        fn fill_bytes(&mut self, dest: &mut [u8]) { dest.fill(0) }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> { dest.fill(0); Ok(()) }
    }

    impl CryptoRng for ZeroRng {}

    fn check_structure(table: &PerfectHashTable) {
        assert!(table.total_size() <= SPACE_FACTOR * table.table_size(),
            "total size {} exceeds {}*{}", table.total_size(), SPACE_FACTOR, table.table_size());
        let mut keys_in_buckets = 0;
        for bucket in 0..table.table_size() {
            let len = table.bucket_len(bucket);
            assert_eq!(table.bucket_slots(bucket), len * len, "bucket {} of {} keys", bucket, len);
            assert_eq!(table.secondary(bucket).is_some(), len > 0, "bucket {} of {} keys", bucket, len);
            if let Some(secondary) = table.secondary(bucket) {
                assert_eq!(secondary.output_range(), len * len);
            }
            keys_in_buckets += len;
        }
        assert_eq!(keys_in_buckets, table.len());
        assert_eq!(table.total_size(), table.table_size() + (0..table.table_size()).map(|b| table.bucket_slots(b)).sum::<usize>());
    }

    fn check_keys(table: &PerfectHashTable, keys: &[u64]) {
        assert_eq!(table.len(), keys.len());
        for key in keys {
            assert_eq!(table.find(*key), Some(*key), "key {} is not found", key);
        }
        let mut stored: Vec<u64> = table.keys().collect();
        stored.sort_unstable();
        let mut expected = keys.to_vec();
        expected.sort_unstable();
        assert_eq!(stored, expected);
    }

    /// Checks all keys below the modulus, which must be small.
    fn check_absent(table: &PerfectHashTable, keys: &[u64]) {
        for key in 0..table.modulus() {
            if !keys.contains(&key) {
                assert_eq!(table.find(key), None, "key {} is found, but is absent", key);
            }
        }
    }

    #[test]
    fn test_example() {
        let keys = [3, 17, 42, 1000];
        let table = PerfectHashTable::try_new(&keys, 8).unwrap();
        assert_eq!(table.find(42), Some(42));
        assert_eq!(table.find(41), None);
        assert_eq!(table.modulus(), 1009);
        assert_eq!(table.table_size(), 8);
        check_structure(&table);
        check_keys(&table, &keys);
        check_absent(&table, &keys);
    }

    #[test]
    fn test_find_is_repeatable() {
        let keys = [3, 17, 42, 1000];
        let table = PerfectHashTable::try_with_conf_rng_stats(&keys, BuildConf::size(8), &mut StdRng::seed_from_u64(7), &mut ()).unwrap();
        for key in 0..1100 {
            let first = table.find(key);
            assert_eq!(table.find(key), first);
            assert_eq!(table.contains(key), first.is_some());
        }
    }

    #[test]
    fn test_empty() {
        let table = PerfectHashTable::try_new(&[], 1).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.table_size(), 1);
        assert_eq!(table.total_size(), 1);
        assert_eq!(table.modulus(), 2);
        assert_eq!(table.find(0), None);
        assert_eq!(table.find(1), None);
        assert_eq!(table.secondary(0), None);
        check_structure(&table);
    }

    #[test]
    fn test_single_key() {
        let table = PerfectHashTable::try_new(&[12345], 1).unwrap();
        assert_eq!(table.total_size(), 2);
        assert_eq!(table.find(12345), Some(12345));
        assert_eq!(table.find(12344), None);
        assert_eq!(table.find(u64::MAX), None);
        check_structure(&table);
    }

    #[test]
    fn test_full_load() {
        let keys: Vec<u64> = (0..500).map(|k| k * 7 + 1).collect();
        let table = PerfectHashTable::try_from(&keys[..]).unwrap();
        assert_eq!(table.table_size(), keys.len());
        check_structure(&table);
        check_keys(&table, &keys);
        check_absent(&table, &keys);
    }

    #[test]
    fn test_stress() {
        const MODULUS: u64 = 10007;
        const KEYS: usize = 4000;
        let mut rng = StdRng::seed_from_u64(1234);
        let keys: Vec<u64> = rand::seq::index::sample(&mut rng, MODULUS as usize, KEYS)
            .into_iter().map(|k| k as u64).collect();
        let mut counters = BuildCounters::default();
        let conf = BuildConf::size_modulus_attempts(KEYS, MODULUS, 11);
        let table = PerfectHashTable::try_with_conf_rng_stats(&keys, conf, &mut rng, &mut counters).unwrap();
        assert!(counters.restarts() <= 10);
        assert_eq!(counters.total_size, table.total_size());
        assert_eq!(counters.single_key_redraws, 0);
        assert_eq!(table.modulus(), MODULUS);
        check_structure(&table);
        check_keys(&table, &keys);
        check_absent(&table, &keys);
    }

    #[test]
    fn test_single_key_buckets_need_one_draw() {
        let keys: Vec<u64> = (0..2000).map(|k| k * 3).collect();
        let mut counters = BuildCounters::default();
        let table = PerfectHashTable::try_with_conf_stats(&keys, BuildConf::size(4000), &mut counters).unwrap();
        assert_eq!(counters.single_key_redraws, 0);
        let occupied = (0..table.table_size()).filter(|b| table.secondary(*b).is_some()).count() as u64;
        assert!(counters.buckets >= occupied);
        for bucket in 0..table.table_size() {
            if table.bucket_len(bucket) == 0 {
                assert_eq!(table.bucket_slots(bucket), 0);
                assert_eq!(table.secondary(bucket), None);
            }
        }
        check_keys(&table, &keys);
    }

    #[test]
    fn test_seeded_construction_is_reproducible() {
        let keys: Vec<u64> = (0..300).map(|k| k * k).collect();
        let conf = BuildConf::size(400);
        let t1 = PerfectHashTable::try_with_conf_rng_stats(&keys, conf, &mut StdRng::seed_from_u64(99), &mut ()).unwrap();
        let t2 = PerfectHashTable::try_with_conf_rng_stats(&keys, conf, &mut StdRng::seed_from_u64(99), &mut ()).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(t1.primary(), t2.primary());
    }

    #[test]
    fn test_access_stats() {
        let keys = [3, 17, 42, 1000];
        let table = PerfectHashTable::try_new(&keys, 8).unwrap();
        let mut counters = AccessCounters::default();
        for key in 0..table.modulus() + 10 {
            table.find_stats(key, &mut counters);
        }
        assert_eq!(counters.found, 4);
        assert_eq!(counters.out_of_domain, 10);
        assert_eq!(counters.empty_bucket + counters.mismatch, table.modulus() - 4);
        assert_eq!(counters.lookups(), table.modulus() + 10);
    }

    #[test]
    fn test_size_bytes() {
        let keys: Vec<u64> = (0..1000).collect();
        let table = PerfectHashTable::try_from(&keys[..]).unwrap();
        assert!(table.size_bytes() >= (table.total_size() - table.table_size()) * 8);
        assert!(table.size_bytes() < table.total_size() * 64);
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(PerfectHashTable::try_new(&[1, 2], 0), Err(BuildError::ZeroTableSize));
        assert_eq!(PerfectHashTable::try_new(&[1, 2, 3], 2), Err(BuildError::TooManyKeys { keys: 3, table_size: 2 }));
        assert_eq!(PerfectHashTable::try_new(&[5, 1, 5], 8), Err(BuildError::DuplicateKey { key: 5 }));
        assert_eq!(PerfectHashTable::try_with_conf(&[1, 2], BuildConf::size_modulus(4, 10)),
            Err(BuildError::NotPrime { modulus: 10 }));
        assert_eq!(PerfectHashTable::try_with_conf(&[3, 11], BuildConf::size_modulus(4, 11)),
            Err(BuildError::KeyOutOfRange { key: 11, modulus: 11 }));
        assert_eq!(PerfectHashTable::try_new(&[u64::MAX - 10], 1), Err(BuildError::NoModulus { key: u64::MAX - 10 }));
    }

    #[test]
    fn test_largest_modulus() {
        const P: u64 = u64::MAX - 58;
        let keys = [0, 1, P - 1, P / 2, 1 << 40];
        let table = PerfectHashTable::try_with_conf(&keys, BuildConf::size_modulus(8, P)).unwrap();
        check_structure(&table);
        check_keys(&table, &keys);
        assert_eq!(table.find(P - 2), None);
        assert_eq!(table.find(P), None);
    }

    #[test]
    fn test_exhausted_secondary_draws() {
        // all keys land in one bucket of 16 slots and in the same slot
        let keys = [3, 17, 42, 1000];
        let mut counters = BuildCounters::default();
        let conf = BuildConf { max_secondary_draws: 5, ..BuildConf::size_attempts(8, 3) };
        let result = PerfectHashTable::try_with_conf_rng_stats(&keys, conf, &mut ZeroRng, &mut counters);
        assert_eq!(result, Err(BuildError::AttemptsExhausted { attempts: 3 }));
        assert_eq!(counters.attempts, 3);
        assert_eq!(counters.space_exceeded, 0);
        assert_eq!(counters.secondary_exhausted, 3);
        assert_eq!(counters.secondary_draws, 15);
        assert_eq!(counters.total_size, 0);
    }

    #[test]
    fn test_exceeded_space() {
        // all 6 keys land in one bucket: 8 + 36 > 4*8
        let keys = [0, 1, 2, 3, 4, 5];
        let mut counters = BuildCounters::default();
        let result = PerfectHashTable::try_with_conf_rng_stats(&keys, BuildConf::size_attempts(8, 4), &mut ZeroRng, &mut counters);
        assert_eq!(result, Err(BuildError::AttemptsExhausted { attempts: 4 }));
        assert_eq!(counters.attempts, 4);
        assert_eq!(counters.space_exceeded, 4);
        assert_eq!(counters.secondary_draws, 0);
    }

    #[test]
    fn test_share_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PerfectHashTable>();
        let keys: Vec<u64> = (0..100).map(|k| k * 11).collect();
        let table = PerfectHashTable::try_from(&keys[..]).unwrap();
        std::thread::scope(|s| {
            for chunk in keys.chunks(25) {
                let table = &table;
                s.spawn(move || for key in chunk { assert!(table.contains(*key)); });
            }
        });
    }
}
