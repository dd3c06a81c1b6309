//! Time series → per-segment frequency series.

use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;
use tracing::debug;

use crate::channels::{Analysis, ChannelFrequencySeries, ChannelTimeSeries};
use crate::error::{PipelineError, PipelineResult};
use crate::schedule::SpliceSchedule;
use crate::utils::{hanning_window, FftHelper};

/// Output of a [`SpectralConverter`].
#[derive(Clone, Debug)]
pub struct ConvertedSpectra {
    pub channels: ChannelFrequencySeries,
    pub frequencies: Vec<f64>,
    pub segment_start_times: Vec<f64>,
    pub segment_mid_times: Vec<f64>,
}

impl ConvertedSpectra {
    /// Checks the realized segmentation against the planned schedule.
    ///
    /// Start and mid times may differ from the plan by at most half a sample
    /// interval.
    pub fn validate_against(&self, schedule: &SpliceSchedule, delta_t: f64) -> PipelineResult<()> {
        let (bins, segments) = self.channels.dim();
        if segments != schedule.segment_count
            || self.segment_mid_times.len() != schedule.segment_count
            || self.segment_start_times.len() != schedule.segment_count
        {
            return Err(PipelineError::consistency(format!(
                "converter realized {segments} segments ({} mid times, {} start times), schedule plans {}",
                self.segment_mid_times.len(),
                self.segment_start_times.len(),
                schedule.segment_count
            )));
        }
        let tol = 0.5 * delta_t;
        let realized = [
            ("start", &self.segment_start_times, &schedule.segment_start_times),
            ("mid", &self.segment_mid_times, &schedule.segment_mid_times),
        ];
        for (what, got_times, planned_times) in realized {
            for (i, (&got, &planned)) in got_times.iter().zip(planned_times.iter()).enumerate() {
                if !((got - planned).abs() <= tol) {
                    return Err(PipelineError::consistency(format!(
                        "segment {i} {what} time {got} s diverges from planned {planned} s"
                    )));
                }
            }
        }
        if self.frequencies.len() != bins {
            return Err(PipelineError::consistency(format!(
                "frequency axis has {} entries for {bins} frequency bins",
                self.frequencies.len()
            )));
        }
        if let Some(k) = self.frequencies.iter().position(|&f| !(f > 0.0)) {
            return Err(PipelineError::consistency(format!(
                "frequency axis entry {k} is {} Hz, DC must be excluded",
                self.frequencies[k]
            )));
        }
        Ok(())
    }
}

pub trait SpectralConverter {
    fn convert(
        &self,
        series: &ChannelTimeSeries<Analysis>,
        schedule: &SpliceSchedule,
    ) -> PipelineResult<ConvertedSpectra>;
}

/// Hann-windowed real FFT of each planned segment.
///
/// Spectra are scaled by `sqrt(2 dt / sum(w^2))`, so the segment average of
/// `|r|^2` is the one-sided power spectral density. Samples that fall outside
/// the series are zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct SegmentedFft;

impl SegmentedFft {
    pub fn new() -> Self {
        Self
    }
}

fn segment_offsets(series_start: f64, delta_t: f64, schedule: &SpliceSchedule) -> Vec<isize> {
    schedule
        .segment_start_times
        .iter()
        .map(|&t| ((t - series_start) / delta_t).round() as isize)
        .collect()
}

fn fill_segment(buffer: &mut [f64], data: &[f64], offset: isize, window: &[f64]) {
    for (j, (slot, &w)) in buffer.iter_mut().zip(window).enumerate() {
        let idx = offset + j as isize;
        *slot = if idx >= 0 && (idx as usize) < data.len() {
            data[idx as usize] * w
        } else {
            0.0
        };
    }
}

impl SpectralConverter for SegmentedFft {
    fn convert(
        &self,
        series: &ChannelTimeSeries<Analysis>,
        schedule: &SpliceSchedule,
    ) -> PipelineResult<ConvertedSpectra> {
        let len = schedule.samples_per_segment;
        let bins = len / 2;
        if bins == 0 {
            return Err(PipelineError::config(format!(
                "segments of {len} samples have no positive-frequency bins"
            )));
        }
        let delta_t = series.delta_t();
        let series_start = series.times()[0];
        let offsets = segment_offsets(series_start, delta_t, schedule);
        let window = hanning_window(len);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let scale = (2.0 * delta_t / window_power).sqrt();
        let helper = FftHelper::new(len);

        let padded = offsets
            .iter()
            .filter(|&&o| o < 0 || o as usize + len > series.len())
            .count();
        debug!(
            segments = offsets.len(),
            samples_per_segment = len,
            zero_padded_segments = padded,
            "segmenting time series"
        );

        let per_segment: Vec<[Vec<Complex64>; 3]> = offsets
            .par_iter()
            .map(|&offset| -> PipelineResult<[Vec<Complex64>; 3]> {
                let mut input = vec![0.0; len];
                let mut output = vec![Complex64::new(0.0, 0.0); helper.half_spectrum_len()];
                let mut spectra: [Vec<Complex64>; 3] = Default::default();
                for (c, spectrum) in spectra.iter_mut().enumerate() {
                    fill_segment(&mut input, series.channel(c), offset, &window);
                    helper.forward_r2c_process(&mut input, &mut output)?;
                    *spectrum = output[1..=bins].iter().map(|z| *z * scale).collect();
                }
                Ok(spectra)
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let segments = per_segment.len();
        let mut arrays = [
            Array2::<Complex64>::zeros((bins, segments)),
            Array2::<Complex64>::zeros((bins, segments)),
            Array2::<Complex64>::zeros((bins, segments)),
        ];
        for (s, spectra) in per_segment.iter().enumerate() {
            for (array, spectrum) in arrays.iter_mut().zip(spectra) {
                for (k, &z) in spectrum.iter().enumerate() {
                    array[[k, s]] = z;
                }
            }
        }
        let [r1, r2, r3] = arrays;

        let segment_duration = len as f64 * delta_t;
        let segment_start_times: Vec<f64> = offsets
            .iter()
            .map(|&o| series_start + o as f64 * delta_t)
            .collect();
        let segment_mid_times = segment_start_times
            .iter()
            .map(|t| t + 0.5 * segment_duration)
            .collect();
        let frequencies = (1..=bins).map(|k| k as f64 / segment_duration).collect();

        Ok(ConvertedSpectra {
            channels: ChannelFrequencySeries::new(r1, r2, r3)?,
            frequencies,
            segment_start_times,
            segment_mid_times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelTimeSeries, Raw};
    use crate::config::{Basis, ObservationWindow};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn analysis_series(
        n: usize,
        delta_t: f64,
        mut f: impl FnMut(usize) -> [f64; 3],
    ) -> ChannelTimeSeries<Analysis> {
        let mut h = [Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n)];
        for i in 0..n {
            let v = f(i);
            for c in 0..3 {
                h[c].push(v[c]);
            }
        }
        let [h1, h2, h3] = h;
        ChannelTimeSeries::<Raw>::from_uniform(0.0, delta_t, h1, h2, h3)
            .unwrap()
            .into_analysis(Basis::Xyz)
    }

    #[test]
    fn shapes_and_axis_follow_schedule() {
        let window = ObservationWindow::new(0.0, 3.0e4, 0.01).unwrap();
        let schedule = SpliceSchedule::plan(&window, 1.0e4).unwrap();
        let series = analysis_series(300, 100.0, |i| [i as f64, 0.0, -(i as f64)]);
        let out = SegmentedFft::new().convert(&series, &schedule).unwrap();
        assert_eq!(out.channels.dim(), (50, 7));
        for (got, planned) in out.frequencies.iter().zip(schedule.frequency_axis()) {
            assert_relative_eq!(*got, planned, max_relative = 1e-12);
        }
        out.validate_against(&schedule, series.delta_t()).unwrap();
        for (got, planned) in out.segment_mid_times.iter().zip(&schedule.segment_mid_times) {
            assert_relative_eq!(*got, *planned, epsilon = 1e-9);
        }
    }

    #[test]
    fn white_noise_level_matches_one_sided_psd() {
        let sigma = 2.0;
        let delta_t = 0.5;
        let mut rng = StdRng::seed_from_u64(99);
        let normal = Normal::new(0.0, sigma).unwrap();
        let window = ObservationWindow::new(0.0, 2.0e5, 1.0 / delta_t).unwrap();
        let schedule = SpliceSchedule::plan(&window, 1.0e4).unwrap();
        let n = (2.0e5 / delta_t) as usize;
        let series = analysis_series(n, delta_t, |_| {
            [normal.sample(&mut rng), normal.sample(&mut rng), normal.sample(&mut rng)]
        });
        let out = SegmentedFft::new().convert(&series, &schedule).unwrap();
        // The last two segments run past the end of the series.
        let (bins, segments) = out.channels.dim();
        let mut total = 0.0;
        let mut count = 0usize;
        for s in 0..segments - 2 {
            for k in 0..bins {
                total += out.channels.channel(0)[[k, s]].norm_sqr();
                count += 1;
            }
        }
        let expected = 2.0 * sigma * sigma * delta_t;
        assert_relative_eq!(total / count as f64, expected, max_relative = 0.05);
    }

    #[test]
    fn divergent_schedule_is_rejected() {
        let window = ObservationWindow::new(0.0, 2.0e4, 0.01).unwrap();
        let schedule = SpliceSchedule::plan(&window, 1.0e4).unwrap();
        let series = analysis_series(200, 100.0, |_| [0.0; 3]);
        let mut out = SegmentedFft::new().convert(&series, &schedule).unwrap();
        out.segment_mid_times[2] += 500.0;
        assert!(out
            .validate_against(&schedule, series.delta_t())
            .unwrap_err()
            .is_consistency());

        let mut out = SegmentedFft::new().convert(&series, &schedule).unwrap();
        out.segment_start_times[1] += 4000.0;
        let err = out.validate_against(&schedule, series.delta_t()).unwrap_err();
        assert!(err.is_consistency());
        assert!(err.to_string().contains("start time"));

        let mut out = SegmentedFft::new().convert(&series, &schedule).unwrap();
        out.segment_start_times[3] += 0.25 * series.delta_t();
        out.validate_against(&schedule, series.delta_t()).unwrap();

        let other = SpliceSchedule::plan(
            &ObservationWindow::new(0.0, 3.0e4, 0.01).unwrap(),
            1.0e4,
        )
        .unwrap();
        let out = SegmentedFft::new().convert(&series, &schedule).unwrap();
        assert!(out
            .validate_against(&other, series.delta_t())
            .unwrap_err()
            .is_consistency());
    }
}
