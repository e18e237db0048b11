//! Hash mixers for the open-addressing maps.

const PHI: u64 = 0x9E37_79B9_7F4A_7C15;

/// Golden-ratio multiplicative mix with a high-to-low fold.
#[inline]
pub fn mix_phi(key: i64) -> u64 {
    let h = (key as u64).wrapping_mul(PHI);
    h ^ (h >> 32)
}

/// Mixes two keys together with a per-map `seed`.
#[inline]
pub fn mix_pair(first: i64, second: i64, seed: u64) -> u64 {
    let h = mix_phi(first) ^ seed;
    mix_phi((h ^ mix_phi(second).rotate_left(31)) as i64)
}

/// Smallest power of two `>= n`, clamped to at least 1.
#[inline]
pub(crate) fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}
