//! Half-overlapping splice schedule over an observation window.

use crate::config::ObservationWindow;
use crate::error::{PipelineError, PipelineResult};

/// Floor of a sample count derived from `duration / delta_t`, where
/// `delta_t = 1 / fs` is itself rounded (`3e4 / (1.0 / 0.03)` lands just
/// below `900`).
pub(crate) fn floor_count(value: f64) -> usize {
    (value * (1.0 + 1e-12)).floor() as usize
}

/// Segment layout for one run. Segments are `splice_duration` long and each
/// overlaps its neighbour by half.
#[derive(Clone, Debug, PartialEq)]
pub struct SpliceSchedule {
    pub start_time: f64,
    pub splice_duration: f64,
    pub sample_rate: f64,
    pub segment_count: usize,
    pub samples_per_segment: usize,
    pub segment_start_times: Vec<f64>,
    pub segment_mid_times: Vec<f64>,
}

impl SpliceSchedule {
    pub fn plan(window: &ObservationWindow, splice_duration: f64) -> PipelineResult<Self> {
        if !(splice_duration.is_finite() && splice_duration > 0.0) {
            return Err(PipelineError::config(format!(
                "splice duration must be positive, got {splice_duration}"
            )));
        }
        if splice_duration > window.duration {
            return Err(PipelineError::config(format!(
                "splice duration {splice_duration} s exceeds observation duration {} s",
                window.duration
            )));
        }
        let samples_per_segment = (window.sample_rate * splice_duration).floor() as usize;
        if samples_per_segment < 2 {
            return Err(PipelineError::config(format!(
                "sample rate {} Hz gives {} samples per {} s segment",
                window.sample_rate, samples_per_segment, splice_duration
            )));
        }

        let segment_count = 2 * (window.duration / splice_duration).floor() as usize + 1;
        let half = splice_duration / 2.0;
        let segment_start_times: Vec<f64> = (0..segment_count)
            .map(|i| window.start_time + half * i as f64)
            .collect();
        let segment_mid_times: Vec<f64> = segment_start_times.iter().map(|t| t + half).collect();

        Ok(Self {
            start_time: window.start_time,
            splice_duration,
            sample_rate: window.sample_rate,
            segment_count,
            samples_per_segment,
            segment_start_times,
            segment_mid_times,
        })
    }

    /// Number of positive-frequency bins of one segment's real FFT.
    pub fn frequency_bin_count(&self) -> usize {
        self.samples_per_segment / 2
    }

    /// Planned frequency axis, DC excluded.
    pub fn frequency_axis(&self) -> Vec<f64> {
        let df = self.sample_rate / self.samples_per_segment as f64;
        (1..=self.frequency_bin_count())
            .map(|k| k as f64 * df)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn window(duration: f64, sample_rate: f64) -> ObservationWindow {
        ObservationWindow::new(0.0, duration, sample_rate).unwrap()
    }

    #[test]
    fn three_splices_give_seven_segments() {
        let schedule = SpliceSchedule::plan(&window(3.0e4, 0.25), 1.0e4).unwrap();
        assert_eq!(schedule.segment_count, 7);
        assert_eq!(schedule.samples_per_segment, 2500);
        assert_eq!(schedule.segment_mid_times.len(), 7);
        assert_relative_eq!(schedule.segment_mid_times[0], 5.0e3);
        assert_relative_eq!(schedule.segment_mid_times[6], 3.5e4);
    }

    #[test]
    fn segment_count_is_always_odd() {
        for &duration in &[1.0e4, 1.5e4, 2.0e4, 2.99e4, 1.0e5, 3.3333e5] {
            let schedule = SpliceSchedule::plan(&window(duration, 1.0), 1.0e4).unwrap();
            assert_eq!(schedule.segment_count % 2, 1, "duration {duration}");
            assert!(schedule.segment_count >= 1);
            assert_eq!(
                schedule.segment_count,
                2 * (duration / 1.0e4).floor() as usize + 1
            );
        }
    }

    #[test]
    fn mid_times_are_offset_by_half_splice() {
        let w = ObservationWindow::new(1.0e6, 2.0e4, 10.0).unwrap();
        let schedule = SpliceSchedule::plan(&w, 1.0e4).unwrap();
        assert_eq!(schedule.segment_count, 5);
        assert_eq!(schedule.samples_per_segment, 100_000);
        for (i, (&start, &mid)) in schedule
            .segment_start_times
            .iter()
            .zip(&schedule.segment_mid_times)
            .enumerate()
        {
            assert_relative_eq!(start, 1.0e6 + 5.0e3 * i as f64);
            assert_relative_eq!(mid, 1.0e6 + 5.0e3 * i as f64 + 5.0e3);
        }
    }

    #[test]
    fn frequency_axis_skips_dc() {
        let schedule = SpliceSchedule::plan(&window(2.0e4, 0.01), 1.0e4).unwrap();
        let axis = schedule.frequency_axis();
        assert_eq!(axis.len(), 50);
        assert_relative_eq!(axis[0], 1.0e-4, epsilon = 1e-18);
        assert_relative_eq!(axis[49], 5.0e-3, epsilon = 1e-15);
    }

    #[test]
    fn samples_per_segment_is_a_plain_floor() {
        // 0.043 * 1e4 evaluates to 429.99999999999994
        let schedule = SpliceSchedule::plan(&window(3.0e4, 0.043), 1.0e4).unwrap();
        assert_eq!(schedule.samples_per_segment, 429);
        assert_eq!(schedule.frequency_bin_count(), 214);
        assert_eq!(schedule.segment_count, 7);
    }

    #[test]
    fn sample_count_absorbs_reciprocal_rounding() {
        // 3e4 / (1 / 0.03) evaluates to 899.9999999999999
        assert_eq!(floor_count(3.0e4 / (1.0 / 0.03)), 900);
        assert_eq!(floor_count(2899.5), 2899);
    }

    #[test]
    fn empty_segments_are_rejected_at_planning() {
        let err = SpliceSchedule::plan(&window(3.0e4, 1.0e-5), 1.0e4).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn splice_longer_than_observation_is_rejected() {
        let err = SpliceSchedule::plan(&window(5.0e3, 1.0), 1.0e4).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
