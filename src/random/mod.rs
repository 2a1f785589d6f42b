//! Seedable, resumable random source
//!
//! Every scheduling run owns exactly one [`SeededRng`] per random stream and
//! threads it explicitly through iterators and schedulers. Nothing in the
//! engine touches a process-wide generator.
//!
//! # Reproducibility
//!
//! A stream is identified by its seed (an array of 32-bit words) and its use
//! count (number of 32-bit words consumed so far). Re-seeding with the same
//! words and discarding `use_count` words puts the generator at exactly the
//! same point, which is how persisted slot state survives restarts.
//!
//! ```
//! use lineup::random::SeededRng;
//!
//! let mut rng = SeededRng::from_seed(&[1, 2, 3, 4]);
//! let _ = rng.integer(0, 10);
//! let used = rng.use_count();
//! let next = rng.integer(0, 1_000_000);
//!
//! let mut restored = SeededRng::with_discard(&[1, 2, 3, 4], used);
//! assert_eq!(restored.integer(0, 1_000_000), next);
//! ```

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Number of 32-bit words in a freshly generated seed (one ChaCha key)
pub const SEED_WORDS: usize = 8;

/// Seed + discard count pair that fully identifies a position in a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngPosition {
    pub seed: Vec<u32>,
    pub use_count: u64,
}

/// ChaCha8-backed generator keyed by an array of 32-bit words
#[derive(Debug, Clone)]
pub struct SeededRng {
    seed: Vec<u32>,
    inner: ChaCha8Rng,
}

impl SeededRng {
    /// Create a generator positioned at the start of the stream for `words`
    pub fn from_seed(words: &[u32]) -> Self {
        Self {
            seed: words.to_vec(),
            inner: ChaCha8Rng::from_seed(key_from_words(words)),
        }
    }

    /// Create a generator and fast-forward it past `discard` words
    pub fn with_discard(words: &[u32], discard: u64) -> Self {
        let mut rng = Self::from_seed(words);
        rng.discard(discard);
        rng
    }

    /// Restore a generator from a persisted position
    pub fn restore(position: &RngPosition) -> Self {
        Self::with_discard(&position.seed, position.use_count)
    }

    /// Create a generator with a fresh seed from the OS entropy source
    pub fn fresh() -> Self {
        Self::from_seed(&Self::generate_seed())
    }

    /// Generate a new seed suitable for persisting
    pub fn generate_seed() -> Vec<u32> {
        let mut os = rand::thread_rng();
        (0..SEED_WORDS).map(|_| os.gen::<u32>()).collect()
    }

    /// Seed words this stream was created from
    pub fn seed(&self) -> &[u32] {
        &self.seed
    }

    /// Number of 32-bit words consumed since seeding
    pub fn use_count(&self) -> u64 {
        self.inner.get_word_pos() as u64
    }

    /// Current position as a persistable pair
    pub fn position(&self) -> RngPosition {
        RngPosition {
            seed: self.seed.clone(),
            use_count: self.use_count(),
        }
    }

    /// Skip `n` words of output
    pub fn discard(&mut self, n: u64) {
        let pos = self.inner.get_word_pos();
        self.inner.set_word_pos(pos + u128::from(n));
    }

    /// Uniform integer in `[lo, hi]`
    pub fn integer(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    /// Uniform real in `[lo, hi)`
    ///
    /// Always consumes one draw, even for an empty range, so that the use
    /// count does not depend on the arguments.
    pub fn real(&mut self, lo: f64, hi: f64) -> f64 {
        let unit: f64 = self.inner.gen();
        if hi > lo {
            lo + unit * (hi - lo)
        } else {
            lo
        }
    }

    /// Weighted coin flip: true with probability `weight / total`
    pub fn bool(&mut self, weight: f64, total: f64) -> bool {
        let unit: f64 = self.inner.gen();
        if total <= 0.0 || weight <= 0.0 {
            return false;
        }
        unit * total < weight
    }

    /// Fisher-Yates shuffle of the whole slice
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }

    /// Fisher-Yates shuffle of `items[lo..hi]`
    pub fn shuffle_range<T>(&mut self, items: &mut [T], lo: usize, hi: usize) {
        let hi = hi.min(items.len());
        if lo < hi {
            items[lo..hi].shuffle(&mut self.inner);
        }
    }

    /// Uniform index into a collection of `len` items
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.inner.gen_range(0..len))
    }
}

/// Fold seed words into a 32-byte ChaCha key.
///
/// Up to eight words map one-to-one onto the key (missing words are zero);
/// longer seeds are folded in with XOR.
fn key_from_words(words: &[u32]) -> [u8; 32] {
    let mut folded = [0u32; SEED_WORDS];
    for (i, word) in words.iter().enumerate() {
        folded[i % SEED_WORDS] ^= word;
    }

    let mut key = [0u8; 32];
    for (i, word) in folded.iter().enumerate() {
        key[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SeededRng::from_seed(&[7, 11, 13]);
        let mut b = SeededRng::from_seed(&[7, 11, 13]);

        for _ in 0..50 {
            assert_eq!(a.integer(0, 1000), b.integer(0, 1000));
        }
    }

    #[test]
    fn test_discard_restores_position() {
        let seed = SeededRng::generate_seed();
        let mut original = SeededRng::from_seed(&seed);
        for _ in 0..17 {
            original.real(0.0, 1.0);
        }
        original.shuffle(&mut [1, 2, 3, 4, 5, 6]);

        let mut restored = SeededRng::restore(&original.position());
        assert_eq!(restored.use_count(), original.use_count());

        for _ in 0..20 {
            assert_eq!(original.integer(-50, 50), restored.integer(-50, 50));
        }
    }

    #[test]
    fn test_use_count_advances() {
        let mut rng = SeededRng::from_seed(&[1]);
        assert_eq!(rng.use_count(), 0);

        rng.real(0.0, 1.0);
        let after_one = rng.use_count();
        assert!(after_one > 0);

        rng.bool(1.0, 2.0);
        assert!(rng.use_count() > after_one);
    }

    #[test]
    fn test_empty_range_still_consumes() {
        let mut rng = SeededRng::from_seed(&[3]);
        assert_eq!(rng.real(5.0, 5.0), 5.0);
        assert_eq!(rng.use_count(), 2);
    }

    #[test]
    fn test_bool_extremes() {
        let mut rng = SeededRng::from_seed(&[42]);
        for _ in 0..100 {
            assert!(rng.bool(10.0, 10.0));
            assert!(!rng.bool(0.0, 10.0));
            assert!(!rng.bool(1.0, 0.0));
        }
    }

    #[test]
    fn test_integer_bounds() {
        let mut rng = SeededRng::from_seed(&[9, 9]);
        for _ in 0..500 {
            let v = rng.integer(3, 7);
            assert!((3..=7).contains(&v));
        }
        assert_eq!(rng.integer(4, 4), 4);
        assert_eq!(rng.integer(10, 2), 10);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = SeededRng::from_seed(&[5]);
        let mut items: Vec<u32> = (0..40).collect();
        rng.shuffle(&mut items);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_range_leaves_outside_untouched() {
        let mut rng = SeededRng::from_seed(&[8]);
        let mut items: Vec<u32> = (0..10).collect();
        rng.shuffle_range(&mut items, 5, 10);
        assert_eq!(&items[..5], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_key_folding() {
        assert_eq!(key_from_words(&[1]), key_from_words(&[1, 0, 0, 0, 0, 0, 0, 0]));
        assert_ne!(key_from_words(&[1]), key_from_words(&[2]));
        // The ninth word folds onto the first
        assert_eq!(
            key_from_words(&[1, 0, 0, 0, 0, 0, 0, 0, 1]),
            key_from_words(&[0])
        );
    }

    #[test]
    fn test_generate_seed_length() {
        assert_eq!(SeededRng::generate_seed().len(), SEED_WORDS);
    }
}
