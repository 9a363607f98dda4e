//! Sources of synthetic layer parameters for driving layer tests.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

pub trait Initializer {
    /// Produce the value connecting one of `in_size` inputs to one of `size` outputs.
    fn get(&mut self, in_size: usize, size: usize) -> f32;

    /// Row-major `[in_size][size]` matrix of values
    fn matrix(&mut self, in_size: usize, size: usize) -> Vec<f32> {
        (0..in_size * size).map(|_| self.get(in_size, size)).collect()
    }

    /// Vector of `size` biases
    fn vector(&mut self, size: usize) -> Vec<f32> {
        (0..size).map(|_| self.get(1, size)).collect()
    }
}

impl<T: Initializer + ?Sized> Initializer for &mut T {
    fn get(&mut self, in_size: usize, size: usize) -> f32 {
        (**self).get(in_size, size)
    }
}

/// Normally distributed values scaled by the fan in, seeded so runs are reproducible.
pub struct Xavier {
    rng: SmallRng,
}

impl Xavier {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for Xavier {
    fn default() -> Self {
        Self::new()
    }
}

impl Initializer for Xavier {
    fn get(&mut self, in_size: usize, _size: usize) -> f32 {
        self.rng.sample::<f32, _>(StandardNormal) / (in_size as f32).sqrt()
    }
}

/// Values of either sign with equal probability and magnitude in `[0.5, 1)`,
/// so none of them sits close to the binarization threshold.
pub struct Signs {
    rng: SmallRng,
}

impl Signs {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Initializer for Signs {
    fn get(&mut self, _in_size: usize, _size: usize) -> f32 {
        let magnitude = self.rng.gen_range(0.5, 1.);
        if self.rng.gen::<bool>() {
            magnitude
        } else {
            -magnitude
        }
    }
}

/// Always yields the same value
pub struct Constant(pub f32);

impl Initializer for Constant {
    fn get(&mut self, _: usize, _: usize) -> f32 {
        self.0
    }
}
