//! Inter-event duration sampling.
//!
//! Samples are rounded to whole ticks (ties to even) and a zero is bumped to
//! one, so two consecutive events are never scheduled on the same tick.

use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};

use crate::error::{Error, Result};
use crate::models::{DistributionConfig, NegativeSamples, MAX_SAMPLES};

#[derive(Clone, Copy, Debug)]
pub enum Sampler {
    Exponential(Exp<f64>),
    Normal(Normal<f64>),
}

impl Sampler {
    pub fn new(distribution: &DistributionConfig) -> Result<Self> {
        distribution.validate()?;
        match *distribution {
            DistributionConfig::Exponential { mean } => Exp::new(1.0 / mean)
                .map(Sampler::Exponential)
                .map_err(|_| Error::InvalidMean(mean)),
            DistributionConfig::Normal { mean, std_dev } => Normal::new(mean, std_dev)
                .map(Sampler::Normal)
                .map_err(|_| Error::InvalidStdDev(std_dev)),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Exponential(dist) => dist.sample(rng),
            Sampler::Normal(dist) => dist.sample(rng),
        }
    }
}

pub fn generate<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    distribution: &DistributionConfig,
    negatives: NegativeSamples,
) -> Result<Vec<i64>> {
    if count == 0 {
        return Err(Error::SampleCountZero);
    }
    if count > MAX_SAMPLES {
        return Err(Error::SampleCountTooLarge {
            max: MAX_SAMPLES,
            got: count,
        });
    }
    let sampler = Sampler::new(distribution)?;
    Ok((0..count)
        .map(|_| to_ticks(sampler.sample(rng), negatives))
        .collect())
}

pub(crate) fn to_ticks(sample: f64, negatives: NegativeSamples) -> i64 {
    let ticks = sample.round_ties_even() as i64;
    match ticks {
        0 => 1,
        t if t < 0 && negatives == NegativeSamples::Clamp => 1,
        t => t,
    }
}
