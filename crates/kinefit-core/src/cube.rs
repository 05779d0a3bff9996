use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, KineError};

/// Hyperspectral cube with axes `(spectral, y, x)`.
pub type Cube = Array3<f64>;

/// Shape of a [`Cube`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeShape {
    /// Number of spectral planes.
    pub nz: usize,
    /// Number of rows.
    pub ny: usize,
    /// Number of columns.
    pub nx: usize,
}

impl CubeShape {
    /// Creates a shape descriptor.
    pub const fn new(nz: usize, ny: usize, nx: usize) -> Self {
        Self { nz, ny, nx }
    }

    /// Shape of an existing cube.
    pub fn of(cube: &Cube) -> Self {
        let (nz, ny, nx) = cube.dim();
        Self { nz, ny, nx }
    }

    /// Shape as an ndarray pattern.
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.nz, self.ny, self.nx)
    }

    /// Total number of voxels.
    pub fn voxels(&self) -> usize {
        self.nz * self.ny * self.nx
    }

    /// Fails on a cube with an empty axis.
    pub fn ensure_non_empty(&self) -> Result<(), KineError> {
        if self.voxels() == 0 {
            return Err(KineError::Config(
                ErrorInfo::new("empty-cube", "cube has an empty axis")
                    .with_context("shape", format!("{:?}", self.dim())),
            ));
        }
        Ok(())
    }
}
