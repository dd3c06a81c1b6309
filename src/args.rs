use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Segmented spectra and cross-channel correlation tensor for SGWB inference",
    long_about = None,
    after_help = "Examples:\n  sgwb_spectra --params params.ini\n  sgwb_spectra --duration 3e4 --fs 0.25 --tdi aet --seed 7 --out-dir run1\n  sgwb_spectra --data mldc_tdi.txt --datatype doppler --duration 8e4 --fs 0.5\n"
)]
pub struct Args {
    /// INI-style params file ([params], [inj], [run_params] sections)
    #[arg(long, visible_alias = "ini")]
    pub params: Option<PathBuf>,

    /// Observation duration in seconds
    #[arg(long, visible_alias = "dur")]
    pub duration: Option<f64>,

    /// Sample rate of the time series in Hz
    #[arg(long, visible_alias = "sampling")]
    pub fs: Option<f64>,

    /// Observation start time in seconds
    #[arg(long, allow_hyphen_values = true)]
    pub tstart: Option<f64>,

    /// Analysis basis (xyz, michelson or aet)
    #[arg(long = "tdi", visible_alias = "tdi-lev")]
    pub tdi: Option<String>,

    /// Unit of the supplied channels (strain or doppler)
    #[arg(long)]
    pub datatype: Option<String>,

    /// Externally supplied data file (columns: time h1 h2 h3). Skips synthesis.
    #[arg(long, visible_alias = "datafile")]
    pub data: Option<PathBuf>,

    /// Interferometer arm length in metres
    #[arg(long = "arm-length")]
    pub arm_length: Option<f64>,

    /// Standard deviation of the white instrument noise per raw channel
    #[arg(long = "noise-sigma")]
    pub noise_sigma: Option<f64>,

    /// Standard deviation of the correlated background injected in every channel
    #[arg(long = "signal-sigma")]
    pub signal_sigma: Option<f64>,

    /// Fixed random seed for the synthesizers
    #[arg(long)]
    pub seed: Option<u64>,

    /// Lower edge of the diagnostic band in Hz
    #[arg(long)]
    pub fmin: Option<f64>,

    /// Upper edge of the diagnostic band in Hz
    #[arg(long)]
    pub fmax: Option<f64>,

    /// Output directory for the spectral product and plots
    #[arg(long = "out-dir", visible_alias = "out")]
    pub out_dir: Option<PathBuf>,

    /// Number of parallel worker threads
    #[arg(long)]
    pub cpu: Option<usize>,

    /// Skip the diagnostic PSD/CSD plots
    #[arg(long)]
    pub no_plots: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;

    #[test]
    fn aliases_are_accepted() {
        let args = Args::parse_from([
            "sgwb_spectra",
            "--dur",
            "2e4",
            "--sampling",
            "10",
            "--tdi-lev",
            "aet",
            "--tstart",
            "-5",
        ]);
        assert_eq!(args.duration, Some(2.0e4));
        assert_eq!(args.fs, Some(10.0));
        assert_eq!(args.tdi.as_deref(), Some("aet"));
        assert_eq!(args.tstart, Some(-5.0));
        assert!(!args.no_plots);
    }
}
