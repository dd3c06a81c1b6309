//! One run of the spectral pipeline: schedule, data, basis, spectra, tensor.

use tracing::{info, warn};

use crate::channels::{ChannelFrequencySeries, ChannelTimeSeries, Raw};
use crate::config::{Basis, DataSource, DataType, ObservationWindow, RunConfig};
use crate::correlation::{CorrelationProducts, CorrelationTensorBuilder};
use crate::datafile::read_channel_file;
use crate::error::{PipelineError, PipelineResult};
use crate::schedule::{floor_count, SpliceSchedule};
use crate::spectral::{SegmentedFft, SpectralConverter};
use crate::synth::{synthesize, CorrelatedBackgroundSource, TimeSeriesSource, WhiteNoiseSource};

/// Everything the inference layer consumes, plus the intermediate spectra
/// used by the diagnostics.
#[derive(Clone, Debug)]
pub struct SpectralProduct {
    /// Frequency axis in Hz, DC excluded.
    pub fdata: Vec<f64>,
    /// `fdata / (2 f*)`.
    pub f0: Vec<f64>,
    pub tsegmid: Vec<f64>,
    pub tsegstart: Vec<f64>,
    pub schedule: SpliceSchedule,
    pub basis: Basis,
    pub data_type: DataType,
    /// Strain-like channel spectra in the analysis basis.
    pub channels: ChannelFrequencySeries,
    pub correlation: CorrelationProducts,
}

pub fn run(config: &RunConfig) -> PipelineResult<SpectralProduct> {
    let converter = SegmentedFft::new();
    match &config.source {
        DataSource::Simulated => {
            let synthesis = &config.synthesis;
            let noise = WhiteNoiseSource::new(synthesis.noise_sigma, synthesis.seed);
            let mut signals: Vec<Box<dyn TimeSeriesSource>> = Vec::new();
            if synthesis.signal_sigma > 0.0 {
                signals.push(Box::new(CorrelatedBackgroundSource::new(
                    synthesis.signal_sigma,
                    synthesis.seed.map(|s| s.wrapping_add(1)),
                )));
            }
            simulate_with(config, &noise, &signals, &converter)
        }
        DataSource::External(path) => {
            let raw = read_channel_file(path)?;
            let window = ObservationWindow::new(
                raw.times()[0],
                config.window.duration,
                config.window.sample_rate,
            )?;
            let raw = fit_external(raw, &window)?;
            process_raw(raw, &window, config, &converter)
        }
    }
}

/// Synthesizes the raw channels from `noise` and `signals`, then processes
/// them. When the noise comes out at a rate other than the configured one the
/// run is re-planned at the realized rate.
pub fn simulate_with(
    config: &RunConfig,
    noise: &dyn TimeSeriesSource,
    signals: &[Box<dyn TimeSeriesSource>],
    converter: &dyn SpectralConverter,
) -> PipelineResult<SpectralProduct> {
    // Plan up front so a bad configuration fails before any synthesis.
    SpliceSchedule::plan(&config.window, config.splice_duration)?;

    let raw = synthesize(&config.window, noise, signals)?;
    let mut window = config.window;
    if !raw.same_sampling(config.window.delta_t()) {
        warn!(
            configured_hz = config.window.sample_rate,
            realized_hz = raw.sample_rate(),
            "synthesized data sampled at a different rate, re-planning segments"
        );
        window = window.with_sample_rate(raw.sample_rate())?;
    }
    process_raw(raw, &window, config, converter)
}

fn fit_external(
    mut raw: ChannelTimeSeries<Raw>,
    window: &ObservationWindow,
) -> PipelineResult<ChannelTimeSeries<Raw>> {
    if !raw.same_sampling(window.delta_t()) {
        return Err(PipelineError::consistency(format!(
            "external data sampled at {} Hz, configured sample rate is {} Hz",
            raw.sample_rate(),
            window.sample_rate
        )));
    }
    let n = floor_count(window.duration / raw.delta_t());
    if raw.len() < n {
        return Err(PipelineError::consistency(format!(
            "external data holds {} samples, {n} needed for {} s",
            raw.len(),
            window.duration
        )));
    }
    raw.truncate(n);
    Ok(raw)
}

/// Basis combination, segment spectra, schedule check, unit conversion and
/// correlation tensor for an already truncated raw triplet.
pub fn process_raw(
    raw: ChannelTimeSeries<Raw>,
    window: &ObservationWindow,
    config: &RunConfig,
    converter: &dyn SpectralConverter,
) -> PipelineResult<SpectralProduct> {
    let schedule = SpliceSchedule::plan(window, config.splice_duration)?;
    info!(
        segments = schedule.segment_count,
        samples_per_segment = schedule.samples_per_segment,
        sample_rate = schedule.sample_rate,
        samples = raw.len(),
        "planned splice schedule"
    );

    let analysis = raw.into_analysis(config.basis);
    let delta_t = analysis.delta_t();
    let spectra = converter.convert(&analysis, &schedule)?;
    spectra.validate_against(&schedule, delta_t)?;

    let f0 = config.constants.scaled_frequencies(&spectra.frequencies);
    let channels = spectra.channels.apply_data_type(config.data_type, &f0)?;
    let correlation = CorrelationTensorBuilder::build(&channels)?;
    let (bins, segments) = channels.dim();
    info!(
        bins,
        segments,
        basis = %config.basis,
        data_type = %config.data_type,
        "built spectral product"
    );

    Ok(SpectralProduct {
        fdata: spectra.frequencies,
        f0,
        tsegmid: spectra.segment_mid_times,
        tsegstart: spectra.segment_start_times,
        schedule,
        basis: config.basis,
        data_type: config.data_type,
        channels,
        correlation,
    })
}
