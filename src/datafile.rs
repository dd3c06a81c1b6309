//! Externally supplied time series: four ASCII columns `time h1 h2 h3`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::channels::{ChannelTimeSeries, Raw};
use crate::error::{PipelineError, PipelineResult};

fn parse_row(line: &str) -> Result<Option<[f64; 4]>, String> {
    let content = match line.split_once('#') {
        Some((before, _)) => before,
        None => line,
    };
    let fields: Vec<&str> = content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        return Ok(None);
    }
    if fields.len() != 4 {
        return Err(format!("expected 4 columns, found {}", fields.len()));
    }
    let mut row = [0.0; 4];
    for (slot, field) in row.iter_mut().zip(&fields) {
        *slot = field
            .parse::<f64>()
            .map_err(|e| format!("invalid number '{field}': {e}"))?;
        if !slot.is_finite() {
            return Err(format!("non-finite value '{field}'"));
        }
    }
    Ok(Some(row))
}

pub fn read_channel_reader<R: BufRead>(
    reader: R,
    path: &Path,
) -> PipelineResult<ChannelTimeSeries<Raw>> {
    let data_error = |line: usize, reason: String| PipelineError::DataFile {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut times = Vec::new();
    let mut h1 = Vec::new();
    let mut h2 = Vec::new();
    let mut h3 = Vec::new();
    let mut lines_read = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        lines_read = idx + 1;
        let Some([t, a, b, c]) = parse_row(&line).map_err(|reason| data_error(idx + 1, reason))?
        else {
            continue;
        };
        times.push(t);
        h1.push(a);
        h2.push(b);
        h3.push(c);
    }
    if times.len() < 2 {
        return Err(data_error(
            lines_read,
            format!("needs at least two samples, found {}", times.len()),
        ));
    }
    ChannelTimeSeries::new(times, h1, h2, h3)
}

pub fn read_channel_file(path: &Path) -> PipelineResult<ChannelTimeSeries<Raw>> {
    let file = File::open(path)?;
    let series = read_channel_reader(BufReader::new(file), path)?;
    info!(
        path = %path.display(),
        samples = series.len(),
        sample_rate = series.sample_rate(),
        "loaded external data"
    );
    Ok(series)
}
