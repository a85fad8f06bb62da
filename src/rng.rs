//! Uniform random draws for the game engines
//!
//! Production play uses the operating system CSPRNG. [`SeededRandom`] (ChaCha
//! under `StdRng`) reproduces a session from a seed and [`ScriptedRandom`]
//! replays exact draws.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_core::OsRng;
use std::collections::VecDeque;

/// Uniform random source consumed by every engine and shuffle
pub trait RandomSource: Send {
    /// Uniform in `[0, 1)`
    fn random_float(&mut self) -> f64;

    /// Uniform over the closed range `[min, max_inclusive]`.
    /// Returns `min` when the range is empty.
    fn random_int(&mut self, min: i64, max_inclusive: i64) -> i64;
}

/// Operating system entropy, one syscall-backed draw per call
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn random_float(&mut self) -> f64 {
        OsRng.gen::<f64>()
    }

    fn random_int(&mut self, min: i64, max_inclusive: i64) -> i64 {
        if min >= max_inclusive {
            return min;
        }
        OsRng.gen_range(min..=max_inclusive)
    }
}

/// Reproducible stream for simulations
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn random_float(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn random_int(&mut self, min: i64, max_inclusive: i64) -> i64 {
        if min >= max_inclusive {
            return min;
        }
        self.rng.gen_range(min..=max_inclusive)
    }
}

/// Replays queued draws in order.
///
/// Integers outside the requested range are clamped into it; an exhausted
/// queue yields the range minimum (and `0.0` for floats).
#[derive(Debug, Default, Clone)]
pub struct ScriptedRandom {
    ints: VecDeque<i64>,
    floats: VecDeque<f64>,
}

impl ScriptedRandom {
    pub fn new<I: IntoIterator<Item = i64>>(ints: I) -> Self {
        Self {
            ints: ints.into_iter().collect(),
            floats: VecDeque::new(),
        }
    }

    pub fn with_floats<I: IntoIterator<Item = f64>>(mut self, floats: I) -> Self {
        self.floats = floats.into_iter().collect();
        self
    }

    pub fn push_int(&mut self, value: i64) {
        self.ints.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.ints.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn random_float(&mut self) -> f64 {
        self.floats.pop_front().unwrap_or(0.0).clamp(0.0, 1.0 - f64::EPSILON)
    }

    fn random_int(&mut self, min: i64, max_inclusive: i64) -> i64 {
        if min >= max_inclusive {
            return min;
        }
        self.ints
            .pop_front()
            .map(|v| v.clamp(min, max_inclusive))
            .unwrap_or(min)
    }
}

/// Fisher-Yates shuffle driven by `random_int(0, i)`
pub fn shuffle<T, R: RandomSource + ?Sized>(rng: &mut R, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.random_int(0, i as i64) as usize;
        items.swap(i, j);
    }
}
