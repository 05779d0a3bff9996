use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use kinefit_conv::InstrumentConfig;
use kinefit_core::errors::ErrorInfo;
use kinefit_core::{GalaxyParameters, KineError};
use kinefit_model::DiskModel;

use crate::analysis::BestFitMethod;
use crate::proposal::ProposalKind;
use crate::statistics::ChiStatistic;

/// YAML-configurable description of a fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    /// Sampler settings.
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Best-fit extraction settings.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Instrument preset and overrides.
    #[serde(default)]
    pub instrument: InstrumentConfig,
    /// Disk model settings.
    #[serde(default)]
    pub model: DiskModel,
    /// Boundaries, initial values and known parameters.
    #[serde(default)]
    pub priors: PriorConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            selection: SelectionConfig::default(),
            instrument: InstrumentConfig::default(),
            model: DiskModel::default(),
            priors: PriorConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl FitConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, KineError> {
        serde_yaml::from_str(yaml).map_err(|err| {
            KineError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_hint("see the fit configuration sections: sampler, selection, instrument, model, priors"),
            )
        })
    }

    /// Loads a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, KineError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            KineError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Canonical YAML rendering, used for hashing and manifests.
    pub fn to_yaml_string(&self) -> Result<String, KineError> {
        serde_yaml::to_string(self).map_err(|err| {
            KineError::Serde(ErrorInfo::new("config-serialize", err.to_string()))
        })
    }
}

/// Metropolis sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Upper bound on the number of iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Proposal distribution.
    #[serde(default)]
    pub proposal: ProposalKind,
    /// Acceptance rate, in percent, below which the run stops early.
    #[serde(default = "default_min_acceptance_rate")]
    pub min_acceptance_rate: f64,
    /// Iterations between two acceptance-rate checks.
    #[serde(default = "default_acceptance_check_interval")]
    pub acceptance_check_interval: usize,
    /// Goodness-of-fit statistic.
    #[serde(default)]
    pub chi_stat: ChiStatistic,
    /// Report per-iteration progress and numerical warnings.
    #[serde(default)]
    pub verbose: bool,
}

fn default_max_iterations() -> usize {
    15_000
}

fn default_min_acceptance_rate() -> f64 {
    10.0
}

fn default_acceptance_check_interval() -> usize {
    100
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            proposal: ProposalKind::default(),
            min_acceptance_rate: default_min_acceptance_rate(),
            acceptance_check_interval: default_acceptance_check_interval(),
            chi_stat: ChiStatistic::default(),
            verbose: false,
        }
    }
}

/// Best-fit extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Selection policy over the chain.
    #[serde(default)]
    pub method: BestFitMethod,
    /// Percentage of the chain used by the policy.
    #[serde(default = "default_last_fraction")]
    pub last_fraction: f64,
    /// Width of the reported percentile interval, in percent.
    #[serde(default = "default_percentile")]
    pub percentile: Option<f64>,
}

fn default_last_fraction() -> f64 {
    60.0
}

fn default_percentile() -> Option<f64> {
    Some(95.0)
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            method: BestFitMethod::default(),
            last_fraction: default_last_fraction(),
            percentile: default_percentile(),
        }
    }
}

/// Proposal amplitude multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RandomScale {
    /// Same factor for every parameter.
    Uniform(f64),
    /// One factor per parameter; unset fields keep a factor of one.
    PerParameter(GalaxyParameters),
}

impl Default for RandomScale {
    fn default() -> Self {
        RandomScale::Uniform(1.0)
    }
}

impl RandomScale {
    /// Factors as a parameter vector.
    pub fn factors(&self) -> GalaxyParameters {
        match self {
            RandomScale::Uniform(value) => GalaxyParameters::splat(*value),
            RandomScale::PerParameter(values) => {
                values.merge_where_nan(&GalaxyParameters::splat(1.0))
            }
        }
    }
}

/// Prior knowledge about the parameters. Unset fields are NaN.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorConfig {
    /// Lower boundary overrides.
    #[serde(default)]
    pub min: GalaxyParameters,
    /// Upper boundary overrides.
    #[serde(default)]
    pub max: GalaxyParameters,
    /// Starting point overrides.
    #[serde(default)]
    pub initial: GalaxyParameters,
    /// Parameters held fixed at the given value.
    #[serde(default)]
    pub known: GalaxyParameters,
    /// Proposal amplitude multiplier.
    #[serde(default)]
    pub random_scale: RandomScale,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            min: GalaxyParameters::nan(),
            max: GalaxyParameters::nan(),
            initial: GalaxyParameters::nan(),
            known: GalaxyParameters::nan(),
            random_scale: RandomScale::default(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Result filename relative to `run_directory`.
    #[serde(default = "default_result_filename")]
    pub result_file: PathBuf,
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_result_filename() -> PathBuf {
    PathBuf::from("result.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            manifest_file: default_manifest_filename(),
            result_file: default_result_filename(),
        }
    }
}
