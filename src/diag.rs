//! Segment-averaged PSD/CSD diagnostics of a spectral product.

use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};
use num_complex::Complex64;
use tracing::info;

use crate::channels::ChannelFrequencySeries;
use crate::config::Basis;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::SpectralProduct;
use crate::plot::{plot_loglog_series, plot_logx_series, BLUE, GREEN, RED};
use crate::utils::DynError;

pub const PSD_PLOT_FILE: &str = "data_psd.png";
pub const CSD_PLOT_FILE: &str = "diag_csd_31.png";

/// Channel pair of the cross-spectrum diagnostic, zero-based.
pub const CSD_PAIR: (usize, usize) = (2, 0);

#[derive(Clone, Debug)]
pub struct Diagnostics {
    pub basis: Basis,
    /// Band-limited frequency axis.
    pub frequencies: Vec<f64>,
    pub psd: [Vec<f64>; 3],
    pub csd: Vec<Complex64>,
}

/// Indices of the bins inside `[fmin, fmax]`.
pub fn band_indices(frequencies: &[f64], fmin: f64, fmax: f64) -> Vec<usize> {
    frequencies
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f >= fmin && f <= fmax)
        .map(|(k, _)| k)
        .collect()
}

/// `mean_s |r_c[k, s]|^2` for each channel.
pub fn mean_psd(channels: &ChannelFrequencySeries) -> [Vec<f64>; 3] {
    let (_, segments) = channels.dim();
    let norm = 1.0 / segments.max(1) as f64;
    let mut psd: [Vec<f64>; 3] = Default::default();
    for (out, channel) in psd.iter_mut().zip(channels.channels()) {
        *out = channel
            .map(|z| z.norm_sqr())
            .sum_axis(Axis(1))
            .iter()
            .map(|p| p * norm)
            .collect();
    }
    psd
}

/// Mean over the segment axis of a `(K, S)` cross product.
pub fn segment_mean(values: &Array2<Complex64>) -> Vec<Complex64> {
    let norm = 1.0 / values.ncols().max(1) as f64;
    values.sum_axis(Axis(1)).iter().map(|z| *z * norm).collect()
}

impl Diagnostics {
    pub fn compute(product: &SpectralProduct, fmin: f64, fmax: f64) -> PipelineResult<Self> {
        let band = band_indices(&product.fdata, fmin, fmax);
        if band.is_empty() {
            return Err(PipelineError::config(format!(
                "no frequency bins in [{fmin}, {fmax}] Hz (axis spans {:?} to {:?} Hz)",
                product.fdata.first(),
                product.fdata.last()
            )));
        }
        let psd_full = mean_psd(&product.channels);
        let (ii, jj) = CSD_PAIR;
        let cross = product.correlation.cross.pair(ii, jj).ok_or_else(|| {
            PipelineError::config(format!("no cross product for channel pair ({ii}, {jj})"))
        })?;
        let csd_full = segment_mean(cross);

        let pick_f64 = |values: &[f64]| band.iter().map(|&k| values[k]).collect::<Vec<_>>();
        let [p1, p2, p3] = &psd_full;
        Ok(Self {
            basis: product.basis,
            frequencies: pick_f64(product.fdata.as_slice()),
            psd: [
                pick_f64(p1.as_slice()),
                pick_f64(p2.as_slice()),
                pick_f64(p3.as_slice()),
            ],
            csd: band.iter().map(|&k| csd_full[k]).collect(),
        })
    }

    fn channel_labels(&self) -> [&'static str; 3] {
        match self.basis {
            Basis::Xyz => ["X", "Y", "Z"],
            Basis::Aet => ["A", "E", "T"],
        }
    }

    /// Writes the PSD and CSD plots into `out_dir`.
    pub fn write_plots(&self, out_dir: &Path) -> Result<Vec<PathBuf>, DynError> {
        let labels = self.channel_labels();
        let psd_path = out_dir.join(PSD_PLOT_FILE);
        plot_loglog_series(
            &self.frequencies,
            &[
                (self.psd[0].as_slice(), &BLUE, labels[0]),
                (self.psd[1].as_slice(), &GREEN, labels[1]),
                (self.psd[2].as_slice(), &RED, labels[2]),
            ],
            "Segment-averaged PSD",
            &psd_path,
            "Frequency [Hz]",
            "PSD [1/Hz]",
        )?;

        let re: Vec<f64> = self.csd.iter().map(|z| z.re).collect();
        let im: Vec<f64> = self.csd.iter().map(|z| z.im).collect();
        let (ii, jj) = CSD_PAIR;
        let csd_path = out_dir.join(CSD_PLOT_FILE);
        let title = format!("CSD {}{}", labels[ii], labels[jj]);
        plot_logx_series(
            &self.frequencies,
            &[(re.as_slice(), &BLUE, "Re"), (im.as_slice(), &RED, "Im")],
            &title,
            &csd_path,
            "Frequency [Hz]",
            "CSD [1/Hz]",
        )?;

        info!(
            psd = %psd_path.display(),
            csd = %csd_path.display(),
            bins = self.frequencies.len(),
            "wrote diagnostic plots"
        );
        Ok(vec![psd_path, csd_path])
    }
}
