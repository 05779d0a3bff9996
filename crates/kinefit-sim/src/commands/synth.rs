use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use rand_distr::Normal;
use tracing::info;

use kinefit_core::{Cube, CubeShape, GalaxyParameters, RngHandle};
use kinefit_mcmc::determinism::noise_seed;
use kinefit_mcmc::FitConfig;
use kinefit_model::KinematicModel;

use super::cube_io::{self, CubeDocument};

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// YAML or JSON map of the true galaxy parameters.
    #[arg(long)]
    pub params: PathBuf,
    /// Fit configuration providing the instrument and the model settings.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Spectral planes.
    #[arg(long, default_value_t = 32)]
    pub nz: usize,
    /// Rows.
    #[arg(long, default_value_t = 24)]
    pub ny: usize,
    /// Columns.
    #[arg(long, default_value_t = 24)]
    pub nx: usize,
    /// Standard deviation of the Gaussian noise added to every voxel.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,
    /// Master seed of the noise; defaults to the configuration seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Output cube document.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &SynthArgs) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => FitConfig::load(path)?,
        None => FitConfig::default(),
    };
    let params: GalaxyParameters = serde_yaml::from_str(&fs::read_to_string(&args.params)?)?;
    if params.has_nan() {
        return Err(format!("{} must set all ten parameters", args.params.display()).into());
    }

    let shape = CubeShape::new(args.nz, args.ny, args.nx);
    let instrument = config.instrument.build()?;
    config.model.validate()?;
    let clean = config
        .model
        .clean_cube(&params, shape, instrument.z_step_kms())?;
    let mut data = instrument.convolver(shape)?.convolve(&clean.cube)?;

    let variance = if args.noise > 0.0 {
        let seed = args.seed.unwrap_or(config.seed_policy.master_seed);
        let normal = Normal::new(0.0, args.noise)?;
        let mut rng = RngHandle::from_seed(noise_seed(seed));
        data.mapv_inplace(|value| value + rng.sample(&normal));
        info!(sigma = args.noise, seed, "added Gaussian noise");
        Some(Cube::from_elem(shape.dim(), args.noise * args.noise))
    } else {
        None
    };

    cube_io::write(
        &args.out,
        &CubeDocument {
            data,
            variance,
            parameters: Some(params),
        },
    )?;
    info!(
        path = %args.out.display(),
        instrument = %instrument.name,
        flux = clean.flux_map.sum(),
        "synthetic cube written"
    );
    Ok(())
}
