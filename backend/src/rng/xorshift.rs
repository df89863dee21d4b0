//! xorshift64* random number generator
//!
//! # Algorithm
//!
//! xorshift64* is a variant of xorshift that passes TestU01's BigCrush
//! statistical tests. It uses 64-bit state and produces 64-bit output.
//!
//! # Determinism
//!
//! Same seed → same sequence of draws → same event ordering. The scheduler's
//! reproducibility guarantee rests entirely on this stream being the only
//! source of randomness in a run.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use event_queue_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let u = rng.next_f64();
/// assert!((0.0..1.0).contains(&u));
/// let wait = rng.exponential(2.0);
/// assert!(wait >= 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is mapped to one (xorshift cannot leave the zero state).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform index in `[0, len)`, or `None` for an empty range.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some((self.next() % len as u64) as usize)
    }

    /// Get current RNG state (for checkpointing/replay)
    ///
    /// `RngManager::new(rng.get_state())` resumes the stream exactly where
    /// it was.
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Generate random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Draw a waiting time from an exponential distribution with the given
    /// rate (mean `1 / rate`).
    ///
    /// Uses inverse-transform sampling on `1 - u`, which lies in `(0, 1]`, so
    /// the logarithm is always finite. A non-positive or non-finite rate
    /// yields `f64::INFINITY` (the event never happens).
    ///
    /// # Example
    /// ```
    /// use event_queue_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(7);
    /// let dt = rng.exponential(0.5);
    /// assert!(dt.is_finite() && dt >= 0.0);
    /// assert_eq!(rng.exponential(0.0), f64::INFINITY);
    /// ```
    pub fn exponential(&mut self, rate: f64) -> f64 {
        if !(rate > 0.0) || !rate.is_finite() {
            return f64::INFINITY;
        }
        let u = self.next_f64();
        -(1.0 - u).ln() / rate
    }

    /// Weighted categorical draw over `weights`.
    ///
    /// Returns the index of the chosen weight with probability
    /// `w_i / sum(w)`. Entries that are zero, negative or NaN can never be
    /// chosen. Returns `None` when no entry has positive weight. Consumes
    /// exactly one draw whenever it returns `Some`.
    ///
    /// # Example
    /// ```
    /// use event_queue_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(99);
    /// assert_eq!(rng.weighted_index(&[0.0, 3.0, 0.0]), Some(1));
    /// assert_eq!(rng.weighted_index(&[0.0, 0.0]), None);
    /// ```
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let max = weights
            .iter()
            .copied()
            .filter(|w| *w > 0.0)
            .fold(0.0, f64::max);
        if !(max > 0.0) {
            return None;
        }

        // Normalised by the largest weight so the total cannot overflow
        let total: f64 = weights
            .iter()
            .copied()
            .filter(|w| *w > 0.0)
            .map(|w| w / max)
            .sum();
        let target = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (idx, weight) in weights.iter().copied().enumerate() {
            if !(weight > 0.0) {
                continue;
            }
            cumulative += weight / max;
            last_positive = Some(idx);
            if target < cumulative {
                return Some(idx);
            }
        }

        // Rounding can leave target == cumulative on the final entry
        last_positive
    }
}
