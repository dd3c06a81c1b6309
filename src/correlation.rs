//! Cross-channel correlation tensor, the sufficient statistic handed to the
//! likelihood layer.
//!
//! For every frequency bin `k` and segment `s` the tensor holds the outer
//! product `conj(rbar[k, s, :]) ⊗ rbar[k, s, :]`. Each `(k, s)` entry is
//! computed independently; nothing is normalized or averaged here.

use ndarray::{stack, Array2, Array3, Array4, ArrayView2, Axis, Zip};
use num_complex::Complex64;
use tracing::debug;

use crate::channels::{ensure_same_shape, ChannelFrequencySeries};
use crate::error::{PipelineError, PipelineResult};

/// The six ordered off-diagonal products `conj(r_i) * r_j`.
#[derive(Clone, Debug, PartialEq)]
pub struct CrossProducts {
    pub r12: Array2<Complex64>,
    pub r13: Array2<Complex64>,
    pub r21: Array2<Complex64>,
    pub r23: Array2<Complex64>,
    pub r31: Array2<Complex64>,
    pub r32: Array2<Complex64>,
}

impl CrossProducts {
    /// Zero-based channel pair; `None` on the diagonal or out of range.
    pub fn pair(&self, i: usize, j: usize) -> Option<&Array2<Complex64>> {
        match (i, j) {
            (0, 1) => Some(&self.r12),
            (0, 2) => Some(&self.r13),
            (1, 0) => Some(&self.r21),
            (1, 2) => Some(&self.r23),
            (2, 0) => Some(&self.r31),
            (2, 1) => Some(&self.r32),
            _ => None,
        }
    }
}

/// `(bins, segments, 3, 3)` complex tensor, Hermitian in the last two axes.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationTensor {
    rmat: Array4<Complex64>,
}

impl CorrelationTensor {
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.rmat.dim()
    }

    pub fn as_array(&self) -> &Array4<Complex64> {
        &self.rmat
    }

    /// 3×3 matrix of bin `k`, segment `s`.
    pub fn matrix(&self, k: usize, s: usize) -> ArrayView2<'_, Complex64> {
        self.rmat.slice(ndarray::s![k, s, .., ..])
    }
}

#[derive(Clone, Debug)]
pub struct CorrelationProducts {
    pub cross: CrossProducts,
    /// `(bins, segments, 3)` stack of the channel series.
    pub rbar: Array3<Complex64>,
    pub rmat: CorrelationTensor,
}

fn conj_product(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    Zip::from(a).and(b).map_collect(|x, y| x.conj() * *y)
}

pub struct CorrelationTensorBuilder;

impl CorrelationTensorBuilder {
    pub fn build(channels: &ChannelFrequencySeries) -> PipelineResult<CorrelationProducts> {
        let [r1, r2, r3] = channels.channels();
        Self::build_from_arrays(r1, r2, r3)
    }

    pub fn build_from_arrays(
        r1: &Array2<Complex64>,
        r2: &Array2<Complex64>,
        r3: &Array2<Complex64>,
    ) -> PipelineResult<CorrelationProducts> {
        let (bins, segments) = ensure_same_shape("correlation tensor input", r1, r2, r3)?;

        let cross = CrossProducts {
            r12: conj_product(r1, r2),
            r13: conj_product(r1, r3),
            r21: conj_product(r2, r1),
            r23: conj_product(r2, r3),
            r31: conj_product(r3, r1),
            r32: conj_product(r3, r2),
        };

        let rbar = stack(Axis(2), &[r1.view(), r2.view(), r3.view()])
            .map_err(|e| PipelineError::consistency(format!("cannot stack channels: {e}")))?;

        let mut rmat = Array4::<Complex64>::zeros((bins, segments, 3, 3));
        Zip::indexed(&mut rmat).par_for_each(|(k, s, i, j), out| {
            *out = rbar[[k, s, i]].conj() * rbar[[k, s, j]];
        });
        debug!(bins, segments, "built correlation tensor");

        Ok(CorrelationProducts {
            cross,
            rbar,
            rmat: CorrelationTensor { rmat },
        })
    }
}
