use std::marker::PhantomData;

use ndarray::{Array2, Axis};
use num_complex::Complex64;

use crate::config::{Basis, DataType};
use crate::error::{PipelineError, PipelineResult};

/// Relative tolerance on the spacing of a time array.
const DELTA_T_REL_TOL: f64 = 1e-6;

/// Basis tag: channels exactly as measured or synthesized.
#[derive(Clone, Copy, Debug)]
pub struct Raw;

/// Basis tag: channels already combined into the analysis basis.
#[derive(Clone, Copy, Debug)]
pub struct Analysis;

/// Three equal-length real channels on a shared, uniform time array.
///
/// The basis tag only changes through [`ChannelTimeSeries::into_analysis`],
/// which consumes the raw value, so the basis combination cannot be applied
/// twice.
#[derive(Clone, Debug)]
pub struct ChannelTimeSeries<B> {
    times: Vec<f64>,
    channels: [Vec<f64>; 3],
    delta_t: f64,
    _basis: PhantomData<B>,
}

impl<B> ChannelTimeSeries<B> {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    pub fn sample_rate(&self) -> f64 {
        1.0 / self.delta_t
    }

    pub fn channel(&self, index: usize) -> &[f64] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f64>; 3] {
        &self.channels
    }

    /// Drops every sample from `n` onwards.
    pub fn truncate(&mut self, n: usize) {
        self.times.truncate(n);
        for channel in self.channels.iter_mut() {
            channel.truncate(n);
        }
    }

    /// True when `other` is sampled at the same interval within tolerance.
    pub fn same_sampling(&self, other_delta_t: f64) -> bool {
        (self.delta_t - other_delta_t).abs() <= DELTA_T_REL_TOL * self.delta_t
    }
}

impl ChannelTimeSeries<Raw> {
    pub fn new(times: Vec<f64>, h1: Vec<f64>, h2: Vec<f64>, h3: Vec<f64>) -> PipelineResult<Self> {
        let n = times.len();
        if h1.len() != n || h2.len() != n || h3.len() != n {
            return Err(PipelineError::consistency(format!(
                "channel lengths differ from time array: time {n}, h1 {}, h2 {}, h3 {}",
                h1.len(),
                h2.len(),
                h3.len()
            )));
        }
        if n < 2 {
            return Err(PipelineError::consistency(format!(
                "time series needs at least two samples, got {n}"
            )));
        }
        let delta_t = times[1] - times[0];
        if !(delta_t.is_finite() && delta_t > 0.0) {
            return Err(PipelineError::consistency(format!(
                "time array is not increasing (delta_t = {delta_t})"
            )));
        }
        let tol = DELTA_T_REL_TOL * delta_t;
        if let Some(idx) = times
            .windows(2)
            .position(|pair| ((pair[1] - pair[0]) - delta_t).abs() > tol)
        {
            return Err(PipelineError::consistency(format!(
                "time array is not uniformly sampled at sample {}: step {} vs delta_t {}",
                idx + 1,
                times[idx + 1] - times[idx],
                delta_t
            )));
        }
        Ok(Self {
            times,
            channels: [h1, h2, h3],
            delta_t,
            _basis: PhantomData,
        })
    }

    /// Uniform time array `start + i * delta_t` for `n` samples.
    pub fn from_uniform(
        start: f64,
        delta_t: f64,
        h1: Vec<f64>,
        h2: Vec<f64>,
        h3: Vec<f64>,
    ) -> PipelineResult<Self> {
        let times = (0..h1.len()).map(|i| start + delta_t * i as f64).collect();
        Self::new(times, h1, h2, h3)
    }

    /// Adds `other` sample by sample. Both must already share length and
    /// sampling interval.
    pub fn accumulate(&mut self, other: &ChannelTimeSeries<Raw>) -> PipelineResult<()> {
        if !self.same_sampling(other.delta_t) {
            return Err(PipelineError::consistency(
                "noise and signal arrays are at different sampling frequencies",
            ));
        }
        if other.len() != self.len() {
            return Err(PipelineError::consistency(format!(
                "cannot add a {}-sample contribution to a {}-sample series",
                other.len(),
                self.len()
            )));
        }
        for (dst, src) in self.channels.iter_mut().zip(other.channels.iter()) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
        Ok(())
    }

    /// Moves the triplet into the analysis basis.
    pub fn into_analysis(self, basis: Basis) -> ChannelTimeSeries<Analysis> {
        let channels = match basis {
            Basis::Xyz => self.channels,
            Basis::Aet => {
                let [h1, h2, h3] = self.channels;
                aet_from_xyz(&h1, &h2, &h3)
            }
        };
        ChannelTimeSeries {
            times: self.times,
            channels,
            delta_t: self.delta_t,
            _basis: PhantomData,
        }
    }
}

/// `a = (2x - y - z)/3`, `e = (z - y)/sqrt(3)`, `t = (x + y + z)/3`.
pub fn aet_from_xyz(x: &[f64], y: &[f64], z: &[f64]) -> [Vec<f64>; 3] {
    let inv_sqrt3 = 1.0 / 3.0_f64.sqrt();
    let n = x.len();
    let mut a = Vec::with_capacity(n);
    let mut e = Vec::with_capacity(n);
    let mut t = Vec::with_capacity(n);
    for ((&xi, &yi), &zi) in x.iter().zip(y).zip(z) {
        a.push((2.0 * xi - yi - zi) / 3.0);
        e.push((zi - yi) * inv_sqrt3);
        t.push((xi + yi + zi) / 3.0);
    }
    [a, e, t]
}

/// Inverse of [`aet_from_xyz`].
pub fn xyz_from_aet(a: &[f64], e: &[f64], t: &[f64]) -> [Vec<f64>; 3] {
    let half_sqrt3 = 3.0_f64.sqrt() / 2.0;
    let n = a.len();
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    for ((&ai, &ei), &ti) in a.iter().zip(e).zip(t) {
        x.push(ai + ti);
        y.push(ti - 0.5 * ai - half_sqrt3 * ei);
        z.push(ti - 0.5 * ai + half_sqrt3 * ei);
    }
    [x, y, z]
}

pub(crate) fn ensure_same_shape(
    context: &'static str,
    r1: &Array2<Complex64>,
    r2: &Array2<Complex64>,
    r3: &Array2<Complex64>,
) -> PipelineResult<(usize, usize)> {
    let expected = r1.dim();
    for other in [r2, r3] {
        if other.dim() != expected {
            return Err(PipelineError::ShapeMismatch {
                context,
                expected,
                actual: other.dim(),
            });
        }
    }
    Ok(expected)
}

/// Per-segment spectra of the three analysis channels, each `(bins, segments)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelFrequencySeries {
    channels: [Array2<Complex64>; 3],
}

impl ChannelFrequencySeries {
    pub fn new(
        r1: Array2<Complex64>,
        r2: Array2<Complex64>,
        r3: Array2<Complex64>,
    ) -> PipelineResult<Self> {
        ensure_same_shape("channel frequency series", &r1, &r2, &r3)?;
        Ok(Self {
            channels: [r1, r2, r3],
        })
    }

    /// `(num_frequency_bins, num_segments)`.
    pub fn dim(&self) -> (usize, usize) {
        self.channels[0].dim()
    }

    pub fn channel(&self, index: usize) -> &Array2<Complex64> {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Array2<Complex64>; 3] {
        &self.channels
    }

    /// Converts rate-like data to strain; strain passes through untouched.
    pub fn apply_data_type(self, data_type: DataType, f0: &[f64]) -> PipelineResult<Self> {
        match data_type {
            DataType::Strain => Ok(self),
            DataType::Doppler => self.rescale_rate_to_strain(f0),
        }
    }

    /// Divides bin `k` of every segment and channel by `4 * f0[k]`.
    pub fn rescale_rate_to_strain(self, f0: &[f64]) -> PipelineResult<Self> {
        let (bins, _) = self.dim();
        if f0.len() != bins {
            return Err(PipelineError::consistency(format!(
                "scaled frequency axis has {} entries for {bins} frequency bins",
                f0.len()
            )));
        }
        if let Some(k) = f0.iter().position(|&v| !(v.is_finite() && v > 0.0)) {
            return Err(PipelineError::consistency(format!(
                "scaled frequency at bin {k} is {}, rate-to-strain needs f0 > 0",
                f0[k]
            )));
        }
        let mut channels = self.channels;
        for channel in channels.iter_mut() {
            for (mut row, &f) in channel.axis_iter_mut(Axis(0)).zip(f0) {
                let scale = 1.0 / (4.0 * f);
                row.mapv_inplace(|z| z * scale);
            }
        }
        Ok(Self { channels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vec(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(-5.0..5.0)).collect()
    }

    #[test]
    fn aet_then_inverse_recovers_triplet() {
        let mut rng = StdRng::seed_from_u64(11);
        let (x, y, z) = (
            random_vec(&mut rng, 257),
            random_vec(&mut rng, 257),
            random_vec(&mut rng, 257),
        );
        let [a, e, t] = aet_from_xyz(&x, &y, &z);
        let [x2, y2, z2] = xyz_from_aet(&a, &e, &t);
        for i in 0..x.len() {
            assert_relative_eq!(x[i], x2[i], epsilon = 1e-12);
            assert_relative_eq!(y[i], y2[i], epsilon = 1e-12);
            assert_relative_eq!(z[i], z2[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn aet_uses_raw_values_for_every_output() {
        let [a, e, t] = aet_from_xyz(&[3.0], &[1.0], &[2.0]);
        assert_relative_eq!(a[0], (6.0 - 1.0 - 2.0) / 3.0);
        assert_relative_eq!(e[0], 1.0 / 3.0_f64.sqrt());
        assert_relative_eq!(t[0], 2.0);
    }

    #[test]
    fn xyz_basis_is_identity() {
        let raw = ChannelTimeSeries::from_uniform(
            0.0,
            0.5,
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        )
        .unwrap();
        let analysis = raw.clone().into_analysis(Basis::Xyz);
        assert_eq!(analysis.channels(), raw.channels());
        assert_eq!(analysis.times(), raw.times());
        assert_eq!(analysis.delta_t(), 0.5);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = ChannelTimeSeries::new(
            vec![0.0, 1.0, 2.0],
            vec![0.0; 3],
            vec![0.0; 2],
            vec![0.0; 3],
        )
        .unwrap_err();
        assert!(err.is_consistency());
    }

    #[test]
    fn irregular_time_array_is_rejected() {
        let err = ChannelTimeSeries::new(
            vec![0.0, 1.0, 2.5],
            vec![0.0; 3],
            vec![0.0; 3],
            vec![0.0; 3],
        )
        .unwrap_err();
        assert!(err.is_consistency());
    }

    #[test]
    fn accumulate_rejects_other_sampling() {
        let mut noise =
            ChannelTimeSeries::from_uniform(0.0, 1.0, vec![1.0; 4], vec![1.0; 4], vec![1.0; 4])
                .unwrap();
        let signal =
            ChannelTimeSeries::from_uniform(0.0, 0.5, vec![1.0; 4], vec![1.0; 4], vec![1.0; 4])
                .unwrap();
        let err = noise.accumulate(&signal).unwrap_err();
        assert!(err.to_string().contains("different sampling frequencies"));

        let same =
            ChannelTimeSeries::from_uniform(0.0, 1.0, vec![2.0; 4], vec![0.5; 4], vec![0.0; 4])
                .unwrap();
        noise.accumulate(&same).unwrap();
        assert_eq!(noise.channel(0), &[3.0; 4]);
        assert_eq!(noise.channel(1), &[1.5; 4]);
        assert_eq!(noise.channel(2), &[1.0; 4]);
    }

    fn random_series(rng: &mut StdRng, bins: usize, segments: usize) -> Array2<Complex64> {
        Array2::from_shape_fn((bins, segments), |_| {
            Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
        })
    }

    #[test]
    fn rate_to_strain_matches_manual_division() {
        let mut rng = StdRng::seed_from_u64(3);
        let (bins, segments) = (6, 4);
        let series = ChannelFrequencySeries::new(
            random_series(&mut rng, bins, segments),
            random_series(&mut rng, bins, segments),
            random_series(&mut rng, bins, segments),
        )
        .unwrap();
        let f0: Vec<f64> = (1..=bins).map(|k| 0.01 * k as f64).collect();
        let strain = series.clone().rescale_rate_to_strain(&f0).unwrap();
        for c in 0..3 {
            for k in 0..bins {
                for s in 0..segments {
                    let expected = series.channel(c)[[k, s]] / (4.0 * f0[k]);
                    let got = strain.channel(c)[[k, s]];
                    assert_relative_eq!(got.re, expected.re, epsilon = 1e-12);
                    assert_relative_eq!(got.im, expected.im, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn rate_to_strain_keeps_zeros() {
        let zeros = Array2::<Complex64>::zeros((3, 2));
        let series =
            ChannelFrequencySeries::new(zeros.clone(), zeros.clone(), zeros.clone()).unwrap();
        let out = series.rescale_rate_to_strain(&[1e-3, 2e-3, 3e-3]).unwrap();
        for c in 0..3 {
            assert!(out.channel(c).iter().all(|z| *z == Complex64::new(0.0, 0.0)));
        }
    }

    #[test]
    fn strain_passes_through() {
        let mut rng = StdRng::seed_from_u64(5);
        let series = ChannelFrequencySeries::new(
            random_series(&mut rng, 2, 3),
            random_series(&mut rng, 2, 3),
            random_series(&mut rng, 2, 3),
        )
        .unwrap();
        let out = series
            .clone()
            .apply_data_type(DataType::Strain, &[0.0, 0.0])
            .unwrap();
        assert_eq!(out, series);
    }

    #[test]
    fn rate_to_strain_checks_axis_length() {
        let zeros = Array2::<Complex64>::zeros((3, 2));
        let series =
            ChannelFrequencySeries::new(zeros.clone(), zeros.clone(), zeros.clone()).unwrap();
        assert!(series.rescale_rate_to_strain(&[1.0, 2.0]).unwrap_err().is_consistency());
    }
}
