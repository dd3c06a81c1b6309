//! Reference time-series synthesizers.
//!
//! The physical noise and background models are out of this crate's scope;
//! these Gaussian sources stand in for them behind [`TimeSeriesSource`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::channels::{ChannelTimeSeries, Raw};
use crate::config::ObservationWindow;
use crate::error::{PipelineError, PipelineResult};
use crate::schedule::floor_count;

pub trait TimeSeriesSource: Send + Sync {
    fn name(&self) -> &str;

    /// Raw-basis channels covering at least `window.duration`.
    fn generate(&self, window: &ObservationWindow) -> PipelineResult<ChannelTimeSeries<Raw>>;
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn normal(sigma: f64) -> PipelineResult<Normal<f64>> {
    Normal::new(0.0, sigma)
        .map_err(|e| PipelineError::config(format!("invalid standard deviation {sigma}: {e}")))
}

/// One sample past the end of the window, like a generator that overshoots
/// and relies on the caller's truncation.
fn sample_count(window: &ObservationWindow) -> usize {
    floor_count(window.duration * window.sample_rate) + 1
}

/// Independent white Gaussian noise in each raw channel.
#[derive(Clone, Debug)]
pub struct WhiteNoiseSource {
    pub sigma: [f64; 3],
    pub seed: Option<u64>,
}

impl WhiteNoiseSource {
    pub fn new(sigma: f64, seed: Option<u64>) -> Self {
        Self {
            sigma: [sigma; 3],
            seed,
        }
    }
}

impl TimeSeriesSource for WhiteNoiseSource {
    fn name(&self) -> &str {
        "noise"
    }

    fn generate(&self, window: &ObservationWindow) -> PipelineResult<ChannelTimeSeries<Raw>> {
        let n = sample_count(window);
        let mut rng = make_rng(self.seed);
        let mut channels: [Vec<f64>; 3] = Default::default();
        for (channel, &sigma) in channels.iter_mut().zip(&self.sigma) {
            let dist = normal(sigma)?;
            *channel = (0..n).map(|_| dist.sample(&mut rng)).collect();
        }
        let [h1, h2, h3] = channels;
        ChannelTimeSeries::from_uniform(window.start_time, window.delta_t(), h1, h2, h3)
    }
}

/// A single Gaussian series added identically to all three raw channels,
/// giving fully correlated cross spectra.
#[derive(Clone, Debug)]
pub struct CorrelatedBackgroundSource {
    pub sigma: f64,
    pub seed: Option<u64>,
    /// Generation rate relative to the window's sample rate.
    pub rate_factor: f64,
}

impl CorrelatedBackgroundSource {
    pub fn new(sigma: f64, seed: Option<u64>) -> Self {
        Self {
            sigma,
            seed,
            rate_factor: 1.0,
        }
    }
}

impl TimeSeriesSource for CorrelatedBackgroundSource {
    fn name(&self) -> &str {
        "isgwb"
    }

    fn generate(&self, window: &ObservationWindow) -> PipelineResult<ChannelTimeSeries<Raw>> {
        let window = window.with_sample_rate(window.sample_rate * self.rate_factor)?;
        let n = sample_count(&window);
        let mut rng = make_rng(self.seed);
        let dist = normal(self.sigma)?;
        let common: Vec<f64> = (0..n).map(|_| dist.sample(&mut rng)).collect();
        ChannelTimeSeries::from_uniform(
            window.start_time,
            window.delta_t(),
            common.clone(),
            common.clone(),
            common,
        )
    }
}

/// Noise plus every signal contribution, truncated to the common sample
/// count `N = floor(duration / delta_t)` set by the noise series.
///
/// Contributions sampled differently from the noise, or shorter than `N`,
/// are rejected.
pub fn synthesize(
    window: &ObservationWindow,
    noise: &dyn TimeSeriesSource,
    signals: &[Box<dyn TimeSeriesSource>],
) -> PipelineResult<ChannelTimeSeries<Raw>> {
    let mut total = noise.generate(window)?;
    let delta_t = total.delta_t();
    let n = floor_count(window.duration / delta_t);
    if total.len() < n {
        return Err(PipelineError::consistency(format!(
            "{} series has {} samples, {n} needed for {} s",
            noise.name(),
            total.len(),
            window.duration
        )));
    }
    total.truncate(n);

    for source in signals {
        let mut contribution = source.generate(window)?;
        if !total.same_sampling(contribution.delta_t()) {
            return Err(PipelineError::consistency(format!(
                "noise and signal arrays are at different sampling frequencies ({}: {} Hz, noise: {} Hz)",
                source.name(),
                contribution.sample_rate(),
                total.sample_rate()
            )));
        }
        if contribution.len() < n {
            return Err(PipelineError::consistency(format!(
                "{} contribution has {} samples, shorter than the {n}-sample noise series",
                source.name(),
                contribution.len()
            )));
        }
        contribution.truncate(n);
        total.accumulate(&contribution)?;
        tracing::debug!(component = source.name(), samples = n, "added contribution");
    }
    Ok(total)
}
