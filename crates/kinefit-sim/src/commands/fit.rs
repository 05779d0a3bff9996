use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use kinefit_core::ParameterName;
use kinefit_mcmc::{fit, write_run_artifacts, FitConfig, Observation};

use super::cube_io::{self, CubeDocument};

#[derive(Args, Debug)]
pub struct FitArgs {
    /// Cube document written by `kinefit-sim synth` or by hand.
    #[arg(long)]
    pub cube: PathBuf,
    /// YAML fit configuration; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output directory; overrides `output.run_directory`.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Master seed override.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: &FitArgs, verbose: bool) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => FitConfig::load(path)?,
        None => FitConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    config.sampler.verbose |= verbose;
    let run_dir = args
        .out
        .clone()
        .or_else(|| config.output.run_directory.clone())
        .ok_or("no output directory: pass --out or set output.run_directory")?;
    config.output.run_directory = Some(run_dir.clone());
    fs::create_dir_all(&run_dir)?;

    let document = cube_io::read(&args.cube)?;
    let mut observation = Observation::new(document.data.clone());
    observation.variance = document.variance.clone();
    let result = fit(&observation, &config)?;

    let artifacts = write_run_artifacts(&run_dir, &config, &observation.cube, &result)?;
    cube_io::write(
        &run_dir.join("model_cube.json"),
        &CubeDocument {
            data: result.convolved_cube.clone(),
            variance: None,
            parameters: Some(result.best.parameters),
        },
    )?;

    for name in ParameterName::ALL {
        let truth = document
            .parameters
            .map(|params| format!("  (true {:.4})", params[name]))
            .unwrap_or_default();
        println!(
            "{:<20} {:>12.4} ± {:<10.4} {}{truth}",
            name.as_str(),
            result.best.parameters[name],
            result.best.stdev[name],
            name.unit(),
        );
    }
    println!(
        "acceptance {:.1}%  chi2_at_p {:.4}  BIC {:.1}",
        result.acceptance_rate, result.statistics.chi2_at_p, result.statistics.bic
    );
    info!(
        manifest = %artifacts.manifest.display(),
        result = %artifacts.result.display(),
        "fit artefacts written"
    );
    Ok(())
}
