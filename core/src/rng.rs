//! Deterministic random number generation.
//!
//! RULE: Nothing in the pipeline may call any platform RNG.
//! All randomness flows through StreamRng instances derived
//! from an explicit seed (a split seed or a model's `seed`).
//!
//! Each concern gets its own RNG stream, seeded deterministically
//! from (seed XOR slot/member index). This means:
//!   - Adding a new stream never changes existing streams.
//!   - Tree i of a forest draws the same bootstrap whatever the
//!     other trees consumed.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// A named, deterministic RNG for a single concern.
pub struct StreamRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StreamRng {
    /// Create a stream from a seed and a stable index.
    /// The index must never change once assigned.
    pub fn new(seed: u64, index: u64) -> Self {
        let derived_seed = seed ^ index.wrapping_mul(GOLDEN_GAMMA);
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a usize in [0, n).
    pub fn next_below(&mut self, n: usize) -> usize {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Uniform float in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }

    /// Pick `k` distinct indices from [0, n), in draw order.
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut all: Vec<usize> = (0..n).collect();
        let k = k.min(n);
        for i in 0..k {
            let j = i + self.next_below(n - i);
            all.swap(i, j);
        }
        all.truncate(k);
        all
    }
}

/// All RNG streams for one seed, indexed by stable slot.
pub struct RngBank {
    seed: u64,
}

impl RngBank {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn for_stream(&self, slot: StreamSlot) -> StreamRng {
        StreamRng::new(self.seed, slot as u64).with_name(slot.name())
    }

    /// An independent stream for member `index` of an ensemble.
    pub fn for_member(&self, slot: StreamSlot, index: usize) -> StreamRng {
        let member_seed = self.seed ^ (index as u64 + 1).wrapping_mul(GOLDEN_GAMMA.rotate_left(17));
        StreamRng::new(member_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries. Only append.
/// Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Split = 0,
    Tree = 1,
    Sgd = 2,
    Mlp = 3,
    // Add new streams here. Append only.
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::Tree => "tree",
            Self::Sgd => "sgd",
            Self::Mlp => "mlp",
        }
    }
}
