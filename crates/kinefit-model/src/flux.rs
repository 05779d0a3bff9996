use tracing::warn;

use kinefit_core::Cube;

/// Total flux of an observed cube, ignoring non-finite voxels.
///
/// A negative total (noise-dominated sky subtraction) falls back to the sum
/// of the positive voxels.
pub fn estimate_flux(cube: &Cube) -> f64 {
    let total: f64 = cube.iter().filter(|v| v.is_finite()).sum();
    if total >= 0.0 {
        return total;
    }
    let positive: f64 = cube.iter().filter(|v| v.is_finite() && **v > 0.0).sum();
    warn!(
        total,
        positive, "cube flux is negative; using the sum of positive voxels"
    );
    positive
}
