use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use kinefit_core::errors::ErrorInfo;
use kinefit_core::{Cube, KineError, RunProvenance, SchemaVersion};

use crate::config::FitConfig;
use crate::fit::{FitResult, FitSummary};

/// Structured manifest describing a completed fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: FitConfig,
    /// Master seed the sampler stream was derived from.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Hashes, timestamp and tool versions.
    pub provenance: RunProvenance,
    /// Result document (relative to the run directory).
    pub result_file: Option<PathBuf>,
}

impl RunManifest {
    /// Manifest for a fit of `cube` under `config`.
    pub fn new(config: &FitConfig, cube: Option<&Cube>) -> Result<Self, KineError> {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Ok(Self {
            config: config.clone(),
            master_seed: config.seed_policy.master_seed,
            seed_label: config.seed_policy.label.clone(),
            provenance: RunProvenance {
                schema: SchemaVersion::CURRENT,
                config_hash: config_hash(config)?,
                cube_hash: cube.map(cube_hash),
                seed: config.seed_policy.master_seed,
                created_at: Utc::now().to_rfc3339(),
                tool_versions,
            },
            result_file: None,
        })
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), KineError> {
        write_json(self, path, "manifest")
    }

    /// Loads a manifest from disk.
    ///
    /// Manifests written under a newer schema are refused.
    pub fn load(path: &Path) -> Result<Self, KineError> {
        let manifest: Self = read_json(path, "manifest")?;
        let schema = manifest.provenance.schema;
        if !schema.is_readable() {
            return Err(KineError::Serde(
                ErrorInfo::new("manifest-schema", "manifest schema is not supported")
                    .with_context("path", path.display().to_string())
                    .with_context(
                        "schema",
                        format!("{}.{}.{}", schema.major, schema.minor, schema.patch),
                    ),
            ));
        }
        Ok(manifest)
    }
}

/// Paths of the artefacts written by [`write_run_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    /// Manifest path.
    pub manifest: PathBuf,
    /// Result summary path.
    pub result: PathBuf,
}

/// Writes the manifest and the result summary under `run_dir`, using the
/// filenames of the `output` section.
pub fn write_run_artifacts(
    run_dir: &Path,
    config: &FitConfig,
    cube: &Cube,
    result: &FitResult,
) -> Result<RunArtifacts, KineError> {
    let result_path = run_dir.join(&config.output.result_file);
    let manifest_path = run_dir.join(&config.output.manifest_file);
    write_json(&result.summary(), &result_path, "result")?;

    let mut manifest = RunManifest::new(config, Some(cube))?;
    manifest.result_file = Some(config.output.result_file.clone());
    manifest.write(&manifest_path)?;
    Ok(RunArtifacts {
        manifest: manifest_path,
        result: result_path,
    })
}

/// Loads a result summary written by [`write_run_artifacts`].
pub fn load_summary(path: &Path) -> Result<FitSummary, KineError> {
    read_json(path, "result")
}

/// SHA-256 of the canonical YAML rendering of a configuration.
pub fn config_hash(config: &FitConfig) -> Result<String, KineError> {
    let yaml = config.to_yaml_string()?;
    Ok(hex::encode(Sha256::digest(yaml.as_bytes())))
}

/// SHA-256 over the shape and the little-endian voxel values of a cube.
pub fn cube_hash(cube: &Cube) -> String {
    let mut hasher = Sha256::new();
    let (nz, ny, nx) = cube.dim();
    for len in [nz, ny, nx] {
        hasher.update((len as u64).to_le_bytes());
    }
    for value in cube.iter() {
        hasher.update(value.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

fn write_json<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<(), KineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            KineError::Serde(
                ErrorInfo::new(format!("{what}-mkdir"), err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|err| {
        KineError::Serde(
            ErrorInfo::new(format!("{what}-serialize"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    fs::write(path, json).map_err(|err| {
        KineError::Serde(
            ErrorInfo::new(format!("{what}-write"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, KineError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        KineError::Serde(
            ErrorInfo::new(format!("{what}-read"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    serde_json::from_str(&contents).map_err(|err| {
        KineError::Serde(
            ErrorInfo::new(format!("{what}-parse"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}
