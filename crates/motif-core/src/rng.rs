//! Seeded PRNG for deterministic gesture generation

use serde::{Deserialize, Serialize};

const MODULUS: u64 = 2_147_483_647; // 2^31 - 1
const MULTIPLIER: u64 = 16_807;

/// Park-Miller 31-bit multiplicative LCG.
///
/// Every generative choice in this crate draws from one of these, constructed
/// fresh from an explicit seed. Identical seed yields an identical stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        let mut state = seed % MODULUS;
        if state == 0 {
            state = 1_013_904_223;
        }
        Self { state }
    }

    /// Next value in [0, 1)
    pub fn next(&mut self) -> f64 {
        self.state = self.state * MULTIPLIER % MODULUS;
        (self.state - 1) as f64 / (MODULUS - 1) as f64
    }

    /// Uniform value in [min, max)
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next() * (max - min)
    }

    /// Uniform integer in [min, max], inclusive both ends
    pub fn int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        min + (self.next() * (max - min + 1) as f64) as i64
    }

    /// Random element, or None for an empty slice
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = (self.next() * items.len() as f64) as usize;
        items.get(idx.min(items.len() - 1))
    }

    /// In-place Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.int(0, i as i64) as usize;
            items.swap(i, j);
        }
    }

    /// Bernoulli draw
    pub fn chance(&mut self, probability: f64) -> bool {
        self.next() < probability
    }
}
