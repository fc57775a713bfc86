//! # Random
//!
//! Seedable random number generation for reproducible fixture data.

#![allow(dead_code)]

use glam::Vec3;
use rand::distr::uniform::SampleUniform;
use rand::distr::{Distribution, StandardUniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::cell::RefCell;

thread_local! {
    /// Thread local generator, reseedable for deterministic output.
    static RNG: RefCell<ChaCha20Rng> = {
        let rng = ChaCha20Rng::from_os_rng();
        RefCell::new(rng)
    }
}

/// Wraps some common random sample generation routines using a thread_rng().
pub struct Random {}

impl Random {
    /// Set the seed for the random number generator.
    ///
    /// * `s` - The seed.
    pub fn seed(s: u64) {
        RNG.with(|rng| *rng.borrow_mut() = SeedableRng::seed_from_u64(s))
    }

    /// Returns a random value.
    pub fn sample<T>() -> T
    where
        StandardUniform: Distribution<T>,
    {
        RNG.with(|rng| rng.borrow_mut().random::<T>())
    }

    /// Returns a random value in [`min`, `max`).
    ///
    /// * `min` - Minimum bound
    /// * `max` - Maximum bound
    pub fn sample_in_range<T>(min: T, max: T) -> T
    where
        T: SampleUniform + PartialOrd,
    {
        RNG.with(|rng| {
            let mut r = rng.borrow_mut();
            r.random_range(min..max)
        })
    }

    /// Returns `n` random values in [`min`, `max`).
    ///
    /// * `n` - Number of samples.
    /// * `min` - Minimum bound
    /// * `max` - Maximum bound
    pub fn samples_in_range<T>(n: usize, min: T, max: T) -> Vec<T>
    where
        T: SampleUniform + PartialOrd + Copy,
    {
        RNG.with(|rng| {
            let mut r = rng.borrow_mut();
            (0..n).map(|_| r.random_range(min..max)).collect()
        })
    }

    /// Returns a random vector with components in [`min`, `max`).
    pub fn vec3_in_range(min: f32, max: f32) -> Vec3 {
        RNG.with(|rng| {
            let mut r = rng.borrow_mut();
            Vec3::new(
                r.random_range(min..max),
                r.random_range(min..max),
                r.random_range(min..max),
            )
        })
    }
}
