use std::collections::BTreeSet;

use rand::seq::IndexedRandom;
use rand::{Rng, RngCore, SeedableRng};

use crate::types::DocId;

/// Small deterministic RNG (splitmix64) for reproducible cohort selection.
///
/// Every random decision the engine makes draws from one instance passed in
/// by the caller, so the same seed and inputs reproduce the same cohort.
#[derive(Debug, Clone)]
pub struct CohortRng {
    state: u64,
}

impl CohortRng {
    /// Create a generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Current internal state; feeding it to [`CohortRng::new`] resumes the stream.
    pub fn state(&self) -> u64 {
        self.state
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl RngCore for CohortRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let value = self.next_u64_internal();
            let bytes = value.to_le_bytes();
            let remaining = dest.len() - offset;
            let copy_len = remaining.min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

impl SeedableRng for CohortRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

/// Uniformly sample `amount` ids without replacement.
///
/// Ids are drawn from their sorted order, so the result depends only on the
/// set contents and the RNG stream. Asking for at least as many ids as exist
/// returns the whole set without consuming randomness.
pub fn sample_ids<R: Rng + ?Sized>(
    ids: &BTreeSet<DocId>,
    amount: usize,
    rng: &mut R,
) -> BTreeSet<DocId> {
    if amount >= ids.len() {
        return ids.clone();
    }
    let ordered: Vec<&DocId> = ids.iter().collect();
    ordered
        .choose_multiple(rng, amount)
        .map(|id| (*id).clone())
        .collect()
}
