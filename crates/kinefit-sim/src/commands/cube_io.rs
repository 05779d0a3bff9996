use std::error::Error;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use kinefit_core::{Cube, GalaxyParameters};

/// JSON cube exchanged between the `synth` and `fit` subcommands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeDocument {
    /// Flux with axes `(spectral, y, x)`.
    pub data: Cube,
    /// Per-voxel variance, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance: Option<Cube>,
    /// Parameters the cube was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<GalaxyParameters>,
}

pub fn read(path: &Path) -> Result<CubeDocument, Box<dyn Error>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("cannot read cube {}: {err}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn write(path: &Path, document: &CubeDocument) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(document)?)?;
    Ok(())
}
