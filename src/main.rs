use std::fs;
use std::path::Path;

use clap::{CommandFactory, Parser};
use tracing::{info, Level};

use sgwb_spectra::args::Args;
use sgwb_spectra::config::{DataSource, RunConfig};
use sgwb_spectra::diag::Diagnostics;
use sgwb_spectra::params::parse_params_file;
use sgwb_spectra::pipeline;
use sgwb_spectra::product::write_product;
use sgwb_spectra::utils::DynError;

fn echo_params_file(params: &Path, out_dir: &Path) -> Result<(), DynError> {
    let file_name = params
        .file_name()
        .ok_or_else(|| format!("params path {} has no file name", params.display()))?;
    let target = out_dir.join(file_name);
    fs::copy(params, &target)?;
    info!(path = %target.display(), "copied params file");
    Ok(())
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.debug { Level::DEBUG } else { Level::INFO })
        .init();

    let params_data = match &args.params {
        Some(path) => Some(parse_params_file(path)?),
        None => None,
    };
    let config = RunConfig::resolve(&args, params_data.as_ref())?;

    let available_cores = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) } as usize;
    if config.cpu > available_cores {
        return Err(format!(
            "--cpu value ({}) exceeds the number of available cores ({})",
            config.cpu, available_cores
        )
        .into());
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.cpu)
        .build_global()
        .map_err(|_| "Failed to initialise rayon thread pool")?;

    fs::create_dir_all(&config.out_dir)?;
    if let Some(params) = &args.params {
        echo_params_file(params, &config.out_dir)?;
    }

    info!(
        duration = config.window.duration,
        sample_rate = config.window.sample_rate,
        start_time = config.window.start_time,
        basis = %config.basis,
        data_type = %config.data_type,
        external = matches!(config.source, DataSource::External(_)),
        threads = config.cpu,
        "starting spectral pipeline"
    );
    let product = pipeline::run(&config)?;

    let diagnostics = if args.no_plots {
        None
    } else {
        Some(Diagnostics::compute(&product, config.fmin, config.fmax)?)
    };

    write_product(&product, &config.out_dir)?;
    if let Some(diagnostics) = diagnostics {
        diagnostics.write_plots(&config.out_dir)?;
    }
    info!(out_dir = %config.out_dir.display(), "done");
    Ok(())
}
