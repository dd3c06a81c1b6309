use std::f64::consts::PI;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::args::Args;
use crate::error::{PipelineError, PipelineResult};
use crate::params::ParamsFileData;

/// Length of one analysis splice in seconds. Not user-configurable.
pub const SPLICE_DURATION_S: f64 = 1.0e4;
pub const SPEED_OF_LIGHT_M_S: f64 = 3.0e8;
pub const DEFAULT_ARM_LENGTH_M: f64 = 2.5e9;

pub const DEFAULT_DURATION_S: f64 = 3.0e4;
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 0.25;
pub const DEFAULT_FMIN_HZ: f64 = 1.0e-4;
pub const DEFAULT_FMAX_HZ: f64 = 1.0e-1;
pub const DEFAULT_NOISE_SIGMA: f64 = 1.0e-20;
pub const DEFAULT_OUT_DIR: &str = "out";

/// Physical constants shared by every stage of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstrumentConstants {
    pub speed_of_light: f64,
    pub arm_length: f64,
}

impl Default for InstrumentConstants {
    fn default() -> Self {
        Self {
            speed_of_light: SPEED_OF_LIGHT_M_S,
            arm_length: DEFAULT_ARM_LENGTH_M,
        }
    }
}

impl InstrumentConstants {
    pub fn new(arm_length: f64) -> PipelineResult<Self> {
        if !(arm_length.is_finite() && arm_length > 0.0) {
            return Err(PipelineError::config(format!(
                "arm length must be positive, got {arm_length}"
            )));
        }
        Ok(Self {
            arm_length,
            ..Self::default()
        })
    }

    /// `f* = c / (2 pi L)`.
    pub fn characteristic_frequency(&self) -> f64 {
        self.speed_of_light / (2.0 * PI * self.arm_length)
    }

    /// `f0 = f / (2 f*)` for every entry of `frequencies`.
    pub fn scaled_frequencies(&self, frequencies: &[f64]) -> Vec<f64> {
        let two_fstar = 2.0 * self.characteristic_frequency();
        frequencies.iter().map(|f| f / two_fstar).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObservationWindow {
    pub start_time: f64,
    pub duration: f64,
    pub sample_rate: f64,
}

impl ObservationWindow {
    pub fn new(start_time: f64, duration: f64, sample_rate: f64) -> PipelineResult<Self> {
        if !start_time.is_finite() {
            return Err(PipelineError::config("observation start time must be finite"));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(PipelineError::config(format!(
                "observation duration must be positive, got {duration}"
            )));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PipelineError::config(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        Ok(Self {
            start_time,
            duration,
            sample_rate,
        })
    }

    pub fn delta_t(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Same window resampled at `sample_rate`.
    pub fn with_sample_rate(&self, sample_rate: f64) -> PipelineResult<Self> {
        Self::new(self.start_time, self.duration, sample_rate)
    }
}

/// Measurement basis the analysis runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Basis {
    /// Raw channels are used as they are.
    Xyz,
    /// Orthogonal A/E/T combination of the raw channels.
    Aet,
}

impl FromStr for Basis {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xyz" | "michelson" => Ok(Self::Xyz),
            "aet" => Ok(Self::Aet),
            other => Err(PipelineError::config(format!(
                "unknown TDI basis '{other}' (expected xyz, michelson or aet)"
            ))),
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xyz => write!(f, "xyz"),
            Self::Aet => write!(f, "aet"),
        }
    }
}

/// Physical unit of the supplied channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Strain,
    /// Rate-like (doppler) data, converted to strain after the FFT.
    Doppler,
}

impl FromStr for DataType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strain" => Ok(Self::Strain),
            "doppler" | "rate" => Ok(Self::Doppler),
            other => Err(PipelineError::config(format!(
                "unknown data type '{other}' (expected strain or doppler)"
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strain => write!(f, "strain"),
            Self::Doppler => write!(f, "doppler"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataSource {
    Simulated,
    External(PathBuf),
}

/// Levels of the reference synthesizers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthesisConfig {
    pub noise_sigma: f64,
    /// Zero disables the correlated background contribution.
    pub signal_sigma: f64,
    pub seed: Option<u64>,
}

/// Everything a run needs, resolved from the CLI and the params file.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub window: ObservationWindow,
    pub splice_duration: f64,
    pub basis: Basis,
    pub data_type: DataType,
    pub source: DataSource,
    pub constants: InstrumentConstants,
    pub synthesis: SynthesisConfig,
    pub fmin: f64,
    pub fmax: f64,
    pub out_dir: PathBuf,
    pub cpu: usize,
}

fn pick<T: Clone>(cli: &Option<T>, file: &Option<T>, default: T) -> T {
    cli.clone().or_else(|| file.clone()).unwrap_or(default)
}

impl RunConfig {
    /// Command-line values win over the params file, which wins over defaults.
    pub fn resolve(args: &Args, file: Option<&ParamsFileData>) -> PipelineResult<Self> {
        let empty = ParamsFileData::default();
        let file = file.unwrap_or(&empty);

        let duration = pick(&args.duration, &file.duration, DEFAULT_DURATION_S);
        let sample_rate = pick(&args.fs, &file.fs, DEFAULT_SAMPLE_RATE_HZ);
        let start_time = pick(&args.tstart, &file.tstart, 0.0);
        let window = ObservationWindow::new(start_time, duration, sample_rate)?;

        let basis = pick(&args.tdi, &file.tdi_lev, "xyz".to_string()).parse::<Basis>()?;
        let data_type =
            pick(&args.datatype, &file.datatype, "strain".to_string()).parse::<DataType>()?;

        let source = match (&args.data, file.mldc, &file.datafile) {
            (Some(path), _, _) => DataSource::External(path.clone()),
            (None, Some(true), Some(path)) => DataSource::External(path.clone()),
            (None, Some(true), None) => {
                return Err(PipelineError::config(
                    "mldc = 1 requires a datafile entry or --data",
                ))
            }
            _ => DataSource::Simulated,
        };

        let constants = InstrumentConstants::new(pick(
            &args.arm_length,
            &file.arm_length,
            DEFAULT_ARM_LENGTH_M,
        ))?;

        let seed = if args.seed.is_some() {
            args.seed
        } else if file.fix_seed.unwrap_or(false) {
            file.seed
        } else {
            None
        };
        let synthesis = SynthesisConfig {
            noise_sigma: pick(&args.noise_sigma, &file.noise_sigma, DEFAULT_NOISE_SIGMA),
            signal_sigma: pick(&args.signal_sigma, &file.signal_sigma, 0.0),
            seed,
        };
        if !(synthesis.noise_sigma.is_finite() && synthesis.noise_sigma >= 0.0) {
            return Err(PipelineError::config("noise sigma must be non-negative"));
        }
        if !(synthesis.signal_sigma.is_finite() && synthesis.signal_sigma >= 0.0) {
            return Err(PipelineError::config("signal sigma must be non-negative"));
        }

        let fmin = pick(&args.fmin, &file.fmin, DEFAULT_FMIN_HZ);
        let fmax = pick(&args.fmax, &file.fmax, DEFAULT_FMAX_HZ);
        if !(fmin >= 0.0 && fmax > fmin) {
            return Err(PipelineError::config(format!(
                "frequency band must satisfy 0 <= fmin < fmax, got [{fmin}, {fmax}]"
            )));
        }

        let out_dir = pick(&args.out_dir, &file.out_dir, PathBuf::from(DEFAULT_OUT_DIR));
        let cpu = pick(&args.cpu, &file.nthreads, 1);
        if cpu == 0 {
            return Err(PipelineError::config("--cpu must be at least 1"));
        }

        Ok(Self {
            window,
            splice_duration: SPLICE_DURATION_S,
            basis,
            data_type,
            source,
            constants,
            synthesis,
            fmin,
            fmax,
            out_dir,
            cpu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use clap::Parser;

    #[test]
    fn characteristic_frequency_matches_arm_length() {
        let constants = InstrumentConstants::default();
        let fstar = constants.characteristic_frequency();
        assert_relative_eq!(fstar, 3.0e8 / (2.0 * PI * 2.5e9), epsilon = 1e-15);
        let f0 = constants.scaled_frequencies(&[fstar, 2.0 * fstar]);
        assert_relative_eq!(f0[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(f0[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn window_rejects_non_positive_values() {
        assert!(matches!(
            ObservationWindow::new(0.0, 0.0, 1.0),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            ObservationWindow::new(0.0, 10.0, -1.0),
            Err(PipelineError::Config(_))
        ));
        assert!(ObservationWindow::new(5.0, 10.0, 1.0).is_ok());
    }

    #[test]
    fn tags_parse_case_insensitively() {
        assert_eq!("AET".parse::<Basis>().unwrap(), Basis::Aet);
        assert_eq!("michelson".parse::<Basis>().unwrap(), Basis::Xyz);
        assert_eq!(" Doppler ".parse::<DataType>().unwrap(), DataType::Doppler);
        assert_eq!("strain".parse::<DataType>().unwrap(), DataType::Strain);
    }

    #[test]
    fn unknown_data_type_is_config_error() {
        assert!(matches!(
            "frequency".parse::<DataType>(),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!("abc".parse::<Basis>(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn cli_overrides_params_file() {
        let args = Args::parse_from(["sgwb_spectra", "--duration", "20000", "--tdi", "aet"]);
        let file = ParamsFileData {
            duration: Some(50000.0),
            fs: Some(0.5),
            tdi_lev: Some("xyz".into()),
            datatype: Some("doppler".into()),
            ..ParamsFileData::default()
        };
        let config = RunConfig::resolve(&args, Some(&file)).unwrap();
        assert_eq!(config.window.duration, 20000.0);
        assert_eq!(config.window.sample_rate, 0.5);
        assert_eq!(config.basis, Basis::Aet);
        assert_eq!(config.data_type, DataType::Doppler);
        assert_eq!(config.splice_duration, SPLICE_DURATION_S);
        assert_eq!(config.source, DataSource::Simulated);
    }

    #[test]
    fn mldc_without_datafile_is_rejected() {
        let args = Args::parse_from(["sgwb_spectra"]);
        let file = ParamsFileData {
            mldc: Some(true),
            ..ParamsFileData::default()
        };
        assert!(matches!(
            RunConfig::resolve(&args, Some(&file)),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn seed_from_file_requires_fix_seed() {
        let args = Args::parse_from(["sgwb_spectra"]);
        let mut file = ParamsFileData {
            seed: Some(42),
            fix_seed: Some(false),
            ..ParamsFileData::default()
        };
        assert_eq!(RunConfig::resolve(&args, Some(&file)).unwrap().synthesis.seed, None);
        file.fix_seed = Some(true);
        assert_eq!(
            RunConfig::resolve(&args, Some(&file)).unwrap().synthesis.seed,
            Some(42)
        );
    }
}
