use std::collections::HashSet;

use rand::Rng;

/// Returns `keys_num` distinct keys and `foreign_keys_num` distinct keys not included in the former,
/// all drawn from `[0, universe)` by `rng`.
///
/// `universe` must be at least `keys_num + foreign_keys_num`.
pub fn gen_data<R: Rng>(keys_num: usize, foreign_keys_num: usize, universe: u64, rng: &mut R) -> (Vec<u64>, Vec<u64>) {
    let mut seen = HashSet::with_capacity(keys_num + foreign_keys_num);
    let mut take = |n: usize| {
        let mut result = Vec::with_capacity(n);
        while result.len() < n {
            let key = rng.gen_range(0..universe);
            if seen.insert(key) { result.push(key); }
        }
        result
    };
    let keys = take(keys_num);
    let foreign = take(foreign_keys_num);
    (keys, foreign)
}
