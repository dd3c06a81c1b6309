use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PipelineError, PipelineResult};

/// Values read from an INI-style params file. Missing keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamsFileData {
    pub duration: Option<f64>,
    pub fs: Option<f64>,
    pub tstart: Option<f64>,
    pub tdi_lev: Option<String>,
    pub datatype: Option<String>,
    pub mldc: Option<bool>,
    pub datafile: Option<PathBuf>,
    pub fmin: Option<f64>,
    pub fmax: Option<f64>,
    pub arm_length: Option<f64>,
    pub noise_sigma: Option<f64>,
    pub signal_sigma: Option<f64>,
    pub out_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub fix_seed: Option<bool>,
    pub nthreads: Option<usize>,
}

fn parse_optional<T: FromStr>(
    params: &HashMap<String, String>,
    keys: &[&str],
) -> PipelineResult<Option<T>> {
    for key in keys {
        if let Some(value) = params.get(*key) {
            return value.trim().parse::<T>().map(Some).map_err(|_| {
                PipelineError::config(format!("params file: cannot parse {key} = '{value}'"))
            });
        }
    }
    Ok(None)
}

fn parse_flag(raw: &str) -> PipelineResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(PipelineError::config(format!(
            "params file: '{other}' is not a boolean"
        ))),
    }
}

fn parse_optional_flag(
    params: &HashMap<String, String>,
    keys: &[&str],
) -> PipelineResult<Option<bool>> {
    for key in keys {
        if let Some(value) = params.get(*key) {
            return parse_flag(value).map(Some);
        }
    }
    Ok(None)
}

fn get_string(params: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| params.get(*key))
        .filter(|v| !v.is_empty())
        .cloned()
}

/// Collects `key = value` pairs. Keys are lower-cased with underscores
/// removed; section headers are accepted but do not namespace keys.
pub fn parse_params_str(contents: &str) -> PipelineResult<ParamsFileData> {
    let mut params = HashMap::new();
    for raw in contents.lines() {
        let line = raw.splitn(2, '#').next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            continue;
        }
        if let Some(index) = line.find('=').or_else(|| line.find(':')) {
            let (key, value) = line.split_at(index);
            let key = key.trim().to_ascii_lowercase().replace('_', "");
            let value = value[1..]
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            params.insert(key, value);
        }
    }

    Ok(ParamsFileData {
        duration: parse_optional(&params, &["duration", "dur"])?,
        fs: parse_optional(&params, &["fs", "samplerate"])?,
        tstart: parse_optional(&params, &["tstart", "starttime"])?,
        tdi_lev: get_string(&params, &["tdilev", "tdi", "basis"]),
        datatype: get_string(&params, &["datatype"]),
        mldc: parse_optional_flag(&params, &["mldc"])?,
        datafile: get_string(&params, &["datafile"]).map(PathBuf::from),
        fmin: parse_optional(&params, &["fmin"])?,
        fmax: parse_optional(&params, &["fmax"])?,
        arm_length: parse_optional(&params, &["armlength"])?,
        noise_sigma: parse_optional(&params, &["noisesigma"])?,
        signal_sigma: parse_optional(&params, &["signalsigma"])?,
        out_dir: get_string(&params, &["outdir"]).map(PathBuf::from),
        seed: parse_optional(&params, &["seed"])?,
        fix_seed: parse_optional_flag(&params, &["fixseed"])?,
        nthreads: parse_optional(&params, &["nthreads", "cpu"])?,
    })
}

pub fn parse_params_file(path: &Path) -> PipelineResult<ParamsFileData> {
    let reader = BufReader::new(File::open(path)?);
    let mut contents = String::new();
    for line in reader.lines() {
        contents.push_str(&line?);
        contents.push('\n');
    }
    parse_params_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[params]
fmin = 1e-4
fmax = 1e-1
duration = 3e4   # seconds
fs = 0.25
tstart = 0
datatype = strain
tdi_lev = aet
mldc = 0

[run_params]
out_dir = ./runs/test
FixSeed = True
seed = 12345
Nthreads = 4
; a comment
";

    #[test]
    fn parses_sections_and_normalises_keys() {
        let data = parse_params_str(SAMPLE).unwrap();
        assert_eq!(data.duration, Some(3.0e4));
        assert_eq!(data.fs, Some(0.25));
        assert_eq!(data.tdi_lev.as_deref(), Some("aet"));
        assert_eq!(data.datatype.as_deref(), Some("strain"));
        assert_eq!(data.mldc, Some(false));
        assert_eq!(data.out_dir, Some(PathBuf::from("./runs/test")));
        assert_eq!(data.fix_seed, Some(true));
        assert_eq!(data.seed, Some(12345));
        assert_eq!(data.nthreads, Some(4));
        assert_eq!(data.datafile, None);
    }

    #[test]
    fn unparsable_number_is_config_error() {
        let err = parse_params_str("duration = soon\n").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.ini");
        std::fs::write(&path, "[params]\nfs = 10\nmldc = 1\ndatafile = 'tdi.txt'\n").unwrap();
        let data = parse_params_file(&path).unwrap();
        assert_eq!(data.fs, Some(10.0));
        assert_eq!(data.mldc, Some(true));
        assert_eq!(data.datafile, Some(PathBuf::from("tdi.txt")));
    }
}
