#![deny(missing_docs)]
#![doc = include_str!("../docs/sampler-api.md")]

//! Metropolis sampler, best-fit extraction and run artefacts for kinematic
//! cube fitting.

/// Best-fit extraction and circular statistics.
pub mod analysis;
/// Append-only record of the random walk.
pub mod chain;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Run setup, fit orchestration and derived cubes.
pub mod fit;
/// Clean model plus instrument convolution.
pub mod forward;
/// Core Metropolis loop.
pub mod kernel;
/// Run manifest and result serialization helpers.
pub mod manifest;
/// Proposal distributions.
pub mod proposal;
/// Chi-square variants.
pub mod statistics;
/// Information criteria of a finished fit.
pub mod stats;

pub use analysis::{best_fit, BestFit, BestFitMethod};
pub use chain::{Chain, ChainRow};
pub use config::{
    FitConfig, OutputConfig, PriorConfig, RandomScale, SamplerConfig, SeedPolicy, SelectionConfig,
};
pub use fit::{fit, fit_with_model, FitResult, FitSummary, Observation};
pub use forward::ForwardModel;
pub use kernel::{run, SamplerRun, SamplerSetup, Termination};
pub use manifest::{write_run_artifacts, RunArtifacts, RunManifest};
pub use proposal::ProposalKind;
pub use statistics::{ChiSquare, ChiStatistic};
pub use stats::FitStatistics;
