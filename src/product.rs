//! Little-endian binary container for the spectral product.
//!
//! Layout: a 64-byte header, then `fdata[K]`, `f0[K]`, `tsegmid[S]` as f64
//! and the `(K, S, 3, 3)` tensor in row-major order as `(re, im)` f64 pairs.
//!
//! | offset | field                        |
//! |--------|------------------------------|
//! | 0      | magic `SGWBRMAT`             |
//! | 8      | format version (u32)         |
//! | 12     | basis code (u8)              |
//! | 13     | data type code (u8)          |
//! | 16     | K, frequency bins (u64)      |
//! | 24     | S, segments (u64)            |
//! | 32     | splice duration, s (f64)     |
//! | 40     | sample rate, Hz (f64)        |
//! | 48     | start time, s (f64)          |

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array4;
use num_complex::Complex64;
use tracing::info;

use crate::config::{Basis, DataType};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::SpectralProduct;

pub const PRODUCT_FILE: &str = "spectral_product.bin";
pub const PRODUCT_MAGIC: &[u8; 8] = b"SGWBRMAT";
pub const PRODUCT_VERSION: u32 = 1;

const HEADER_SIZE: usize = 64;
const VERSION_OFFSET: usize = 8;
const BASIS_OFFSET: usize = 12;
const DATA_TYPE_OFFSET: usize = 13;
const BINS_OFFSET: usize = 16;
const SEGMENTS_OFFSET: usize = 24;
const SPLICE_OFFSET: usize = 32;
const SAMPLE_RATE_OFFSET: usize = 40;
const START_TIME_OFFSET: usize = 48;

/// A product loaded back from disk.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredProduct {
    pub basis: Basis,
    pub data_type: DataType,
    pub splice_duration: f64,
    pub sample_rate: f64,
    pub start_time: f64,
    pub fdata: Vec<f64>,
    pub f0: Vec<f64>,
    pub tsegmid: Vec<f64>,
    pub rmat: Array4<Complex64>,
}

fn basis_code(basis: Basis) -> u8 {
    match basis {
        Basis::Xyz => 0,
        Basis::Aet => 1,
    }
}

fn data_type_code(data_type: DataType) -> u8 {
    match data_type {
        DataType::Strain => 0,
        DataType::Doppler => 1,
    }
}

fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64_le(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn write_f64_le(buf: &mut [u8], offset: usize, value: f64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn build_header(product: &SpectralProduct) -> [u8; HEADER_SIZE] {
    let (bins, segments, _, _) = product.correlation.rmat.shape();
    let schedule = &product.schedule;
    let mut out = [0u8; HEADER_SIZE];
    out[..PRODUCT_MAGIC.len()].copy_from_slice(PRODUCT_MAGIC);
    write_u32_le(&mut out, VERSION_OFFSET, PRODUCT_VERSION);
    out[BASIS_OFFSET] = basis_code(product.basis);
    out[DATA_TYPE_OFFSET] = data_type_code(product.data_type);
    write_u64_le(&mut out, BINS_OFFSET, bins as u64);
    write_u64_le(&mut out, SEGMENTS_OFFSET, segments as u64);
    write_f64_le(&mut out, SPLICE_OFFSET, schedule.splice_duration);
    write_f64_le(&mut out, SAMPLE_RATE_OFFSET, schedule.sample_rate);
    write_f64_le(&mut out, START_TIME_OFFSET, schedule.start_time);
    out
}

fn write_f64_slice<W: Write>(writer: &mut W, values: &[f64]) -> PipelineResult<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Writes `product` to `out_dir/spectral_product.bin`.
pub fn write_product(product: &SpectralProduct, out_dir: &Path) -> PipelineResult<PathBuf> {
    let (bins, segments, _, _) = product.correlation.rmat.shape();
    if product.fdata.len() != bins || product.f0.len() != bins || product.tsegmid.len() != segments
    {
        return Err(PipelineError::consistency(format!(
            "product axes ({} frequencies, {} scaled, {} mid times) do not match tensor ({bins}, {segments})",
            product.fdata.len(),
            product.f0.len(),
            product.tsegmid.len()
        )));
    }

    let path = out_dir.join(PRODUCT_FILE);
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(&build_header(product))?;
    write_f64_slice(&mut writer, &product.fdata)?;
    write_f64_slice(&mut writer, &product.f0)?;
    write_f64_slice(&mut writer, &product.tsegmid)?;
    for z in product.correlation.rmat.as_array().iter() {
        writer.write_all(&z.re.to_le_bytes())?;
        writer.write_all(&z.im.to_le_bytes())?;
    }
    writer.flush()?;
    info!(path = %path.display(), bins, segments, "wrote spectral product");
    Ok(path)
}

struct Cursor<'a> {
    path: &'a Path,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn error(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::Product {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }

    fn take<const N: usize>(&mut self) -> PipelineResult<[u8; N]> {
        let end = self.pos + N;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| self.error(format!("truncated at byte {}", self.pos)))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos = end;
        Ok(out)
    }

    fn f64(&mut self) -> PipelineResult<f64> {
        Ok(f64::from_le_bytes(self.take::<8>()?))
    }

    fn f64_vec(&mut self, n: usize) -> PipelineResult<Vec<f64>> {
        (0..n).map(|_| self.f64()).collect()
    }
}

fn read_u64_le(header: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&header[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn read_f64_le(header: &[u8], offset: usize) -> f64 {
    f64::from_bits(read_u64_le(header, offset))
}

/// Header plus axes plus tensor, `None` when the size overflows `usize`.
fn expected_file_len(bins: usize, segments: usize) -> Option<usize> {
    let tensor = bins.checked_mul(segments)?.checked_mul(9 * 16)?;
    let axes = bins.checked_mul(2)?.checked_add(segments)?.checked_mul(8)?;
    tensor.checked_add(axes)?.checked_add(HEADER_SIZE)
}

pub fn read_product(path: &Path) -> PipelineResult<StoredProduct> {
    let buf = fs::read(path)?;
    let mut cursor = Cursor {
        path,
        buf: &buf,
        pos: 0,
    };
    let header = cursor.take::<HEADER_SIZE>()?;
    if &header[..PRODUCT_MAGIC.len()] != PRODUCT_MAGIC {
        return Err(cursor.error("not a spectral product (bad magic)"));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&header[VERSION_OFFSET..VERSION_OFFSET + 4]);
    let version = u32::from_le_bytes(version);
    if version != PRODUCT_VERSION {
        return Err(cursor.error(format!("unsupported format version {version}")));
    }
    let basis = match header[BASIS_OFFSET] {
        0 => Basis::Xyz,
        1 => Basis::Aet,
        code => return Err(cursor.error(format!("unknown basis code {code}"))),
    };
    let data_type = match header[DATA_TYPE_OFFSET] {
        0 => DataType::Strain,
        1 => DataType::Doppler,
        code => return Err(cursor.error(format!("unknown data type code {code}"))),
    };
    let dimension = |offset: usize, name: &str| {
        let raw = read_u64_le(&header, offset);
        usize::try_from(raw).map_err(|_| cursor.error(format!("{name} count {raw} exceeds usize")))
    };
    let bins = dimension(BINS_OFFSET, "bin")?;
    let segments = dimension(SEGMENTS_OFFSET, "segment")?;

    let expected = expected_file_len(bins, segments).ok_or_else(|| {
        cursor.error(format!("header declares an impossible ({bins}, {segments}) product"))
    })?;
    if expected != buf.len() {
        return Err(cursor.error(format!(
            "{} bytes on disk do not match a ({bins}, {segments}) product",
            buf.len()
        )));
    }

    let fdata = cursor.f64_vec(bins)?;
    let f0 = cursor.f64_vec(bins)?;
    let tsegmid = cursor.f64_vec(segments)?;
    let mut values = Vec::with_capacity(bins * segments * 9);
    for _ in 0..bins * segments * 9 {
        let re = cursor.f64()?;
        let im = cursor.f64()?;
        values.push(Complex64::new(re, im));
    }
    let rmat = Array4::from_shape_vec((bins, segments, 3, 3), values)
        .map_err(|e| cursor.error(e.to_string()))?;

    Ok(StoredProduct {
        basis,
        data_type,
        splice_duration: read_f64_le(&header, SPLICE_OFFSET),
        sample_rate: read_f64_le(&header, SAMPLE_RATE_OFFSET),
        start_time: read_f64_le(&header, START_TIME_OFFSET),
        fdata,
        f0,
        tsegmid,
        rmat,
    })
}
