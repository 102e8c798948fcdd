//! Named random number streams, seeded deterministically from one base seed.
//!
//! Every consumer of randomness declares its own stream with
//! [`define_rng!`](crate::define_rng) and samples through the
//! [`ContextRandomExt`] methods. Streams are created lazily, seeded with
//! `base_seed + hash(stream name)`, so a fixed base seed reproduces every
//! draw of every stream exactly, independent of which other streams exist.

use std::any::{Any, TypeId};
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;

use log::trace;

use crate::context::Context;
use crate::define_data_plugin;
use crate::hashing::hash_str;
use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::distr::Distribution;
use rand::{Rng, SeedableRng};

/// Use this to define a unique type which will be used as a key to retrieve
/// an independent rng stream when sampling through [`ContextRandomExt`].
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        #[derive(Copy, Clone)]
        struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::SmallRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
pub use define_rng;

pub trait RngId: Copy + Clone + Any {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// This is a wrapper that allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// Registers a data container which stores:
// * base_seed: A base seed for all rngs
// * rng_holders: A map of rngs, keyed by their RngId. Note that this is
//   stored in a RefCell to allow for mutable borrow without requiring a
//   mutable borrow of the Context itself.
define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        rng_holders: RefCell::new(HashMap::new()),
    }
);

/// Gets a mutable reference to the random number generator associated with
/// the given [`RngId`]. If the rng has not been used before, one is created
/// seeded with the base seed plus the hash of the stream name. Panics if
/// `init_random` was not called yet.
fn get_rng<R: RngId>(context: &Context) -> RefMut<R::RngType> {
    let data_container = context
        .get_data_container::<RngPlugin>()
        .expect("You must initialize the random number generator with a base seed");

    let rng_holders = data_container.rng_holders.try_borrow_mut().unwrap();
    RefMut::map(rng_holders, |holders| {
        holders
            .entry(TypeId::of::<R>())
            // Create a new rng holder if it doesn't exist yet
            .or_insert_with(|| {
                trace!(
                    "creating rng stream {} (base seed {})",
                    R::get_name(),
                    data_container.base_seed
                );
                let base_seed = data_container.base_seed;
                let seed_offset = hash_str(R::get_name());
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(
                        base_seed.wrapping_add(seed_offset),
                    )),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            .unwrap()
    })
}

// This is a trait extension on Context for random number generation
// functionality.
pub trait ContextRandomExt {
    fn init_random(&mut self, base_seed: u64);

    /// Gets a random sample from the rng stream associated with the given
    /// [`RngId`] by applying the specified sampler function.
    fn sample<R: RngId, T>(&self, rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Gets a random sample from the specified distribution using the rng
    /// stream associated with the given [`RngId`].
    fn sample_distr<R: RngId, T>(&self, rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng;

    /// Gets a strictly positive sample from the specified distribution,
    /// resampling until the draw is positive.
    ///
    /// A Normal delay distribution has a tail below zero, and a non-positive
    /// delay is invalid for a plan. Resampling truncates that tail without
    /// piling probability mass anywhere, so the realized distribution is the
    /// configured one conditioned on positivity.
    fn sample_positive_distr<R: RngId>(
        &self,
        rng_id: R,
        distribution: impl Distribution<f64>,
    ) -> f64
    where
        R::RngType: Rng;

    /// Gets a random sample within the provided `range` using the rng stream
    /// associated with the given [`RngId`].
    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;

    /// Gets a random boolean value which is true with probability `p` using
    /// the rng stream associated with the given [`RngId`].
    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    /// Initializes the `RngPlugin` data container to store rngs as well as a
    /// base seed. Note that rngs are created lazily on first sample.
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with seed {base_seed}");
        let data_container = self.get_data_container_mut::<RngPlugin>();
        data_container.base_seed = base_seed;

        // Clear any existing rngs to ensure they get re-seeded on next use
        let mut rng_map = data_container.rng_holders.try_borrow_mut().unwrap();
        rng_map.clear();
    }

    fn sample<R: RngId, T>(&self, _rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let mut rng = get_rng::<R>(self);
        sampler(&mut rng)
    }

    fn sample_distr<R: RngId, T>(&self, _rng_id: R, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        let mut rng = get_rng::<R>(self);
        distribution.sample::<R::RngType>(&mut rng)
    }

    fn sample_positive_distr<R: RngId>(
        &self,
        _rng_id: R,
        distribution: impl Distribution<f64>,
    ) -> f64
    where
        R::RngType: Rng,
    {
        let mut rng = get_rng::<R>(self);
        loop {
            let value = distribution.sample::<R::RngType>(&mut rng);
            if value > 0.0 {
                return value;
            }
        }
    }

    fn sample_range<R: RngId, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }
}

#[cfg(test)]
mod tests {
    use super::ContextRandomExt;
    use crate::context::Context;
    use rand::RngCore;
    use rand_distr::{Exp, Normal};

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn get_rng_basic() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    #[should_panic(expected = "You must initialize the random number generator with a base seed")]
    fn panic_if_not_initialized() {
        let context = Context::new();
        context.sample(FooRng, RngCore::next_u64);
    }

    #[test]
    fn streams_are_independent() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(BarRng, RngCore::next_u64)
        );
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);

        let run_0 = context.sample(FooRng, RngCore::next_u64);
        let run_1 = context.sample(FooRng, RngCore::next_u64);

        // Reset with same seed, ensure we get the same values
        context.init_random(42);
        assert_eq!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_eq!(run_1, context.sample(FooRng, RngCore::next_u64));

        // Reset with different seed, ensure we get different values
        context.init_random(88);
        assert_ne!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_ne!(run_1, context.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn sample_distribution() {
        let mut context = Context::new();
        context.init_random(42);

        let delay = context.sample_distr(FooRng, Exp::new(1.0).unwrap());
        assert!(delay >= 0.0);
    }

    #[test]
    fn sample_positive_distr_truncates_negative_tail() {
        let mut context = Context::new();
        context.init_random(42);

        // Most of this distribution's mass is below zero; every returned
        // sample must still be positive.
        let distribution = Normal::new(-1.0, 1.0).unwrap();
        for _ in 0..1000 {
            assert!(context.sample_positive_distr(FooRng, distribution) > 0.0);
        }
    }

    #[test]
    fn sample_range() {
        let mut context = Context::new();
        context.init_random(42);
        let result = context.sample_range(FooRng, 0..10);
        assert!((0..10).contains(&result));
    }

    #[test]
    fn sample_bool_at_bounds() {
        let mut context = Context::new();
        context.init_random(42);
        assert!(context.sample_bool(FooRng, 1.0));
        assert!(!context.sample_bool(FooRng, 0.0));
    }
}
