//! Outer-batch sampling for one epoch.
//!
//! Chunks `[0, len)` into outer batches of `batch_size` logical indices,
//! optionally shuffled first. Shuffles come from a ChaCha stream keyed by
//! `(seed, epoch)`, so every epoch is reproducible and epochs differ.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterBatchSampler {
    len: usize,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
}

impl OuterBatchSampler {
    /// # Panics
    ///
    /// Panics if `batch_size` is 0.
    pub fn new(len: usize, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        Self {
            len,
            batch_size,
            shuffle,
            seed,
        }
    }

    /// Number of outer batches per epoch (the last may be short).
    pub fn batch_count(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    pub fn epoch(&self, epoch: u64) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.len).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            rng.set_stream(epoch);
            indices.shuffle(&mut rng);
        }
        indices
            .chunks(self.batch_size)
            .map(<[usize]>::to_vec)
            .collect()
    }
}
