use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, Axis};
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};

/// FFT plans kept across convolutions.
///
/// A sampler convolves one cube shape per iteration, so every padded axis
/// length is planned once and reused afterwards.
pub struct FftPlans {
    planner: FftPlanner<f64>,
    plans: HashMap<(usize, bool), Arc<dyn Fft<f64>>>,
}

impl Default for FftPlans {
    fn default() -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: HashMap::new(),
        }
    }
}

impl FftPlans {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `(length, direction)` plans built so far.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Returns true before the first transform.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn plan(&mut self, len: usize, direction: FftDirection) -> Arc<dyn Fft<f64>> {
        let inverse = direction == FftDirection::Inverse;
        let planner = &mut self.planner;
        self.plans
            .entry((len, inverse))
            .or_insert_with(|| planner.plan_fft(len, direction))
            .clone()
    }
}

// Plans are rebuilt lazily by the copy.
impl Clone for FftPlans {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for FftPlans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lengths: Vec<(usize, bool)> = self.plans.keys().copied().collect();
        lengths.sort_unstable();
        f.debug_struct("FftPlans").field("plans", &lengths).finish()
    }
}

/// In-place N-dimensional transform, one axis at a time.
///
/// The inverse direction is normalised by the total number of samples so that
/// a forward/inverse pair is the identity.
pub(crate) fn transform(
    values: &mut ArrayD<Complex64>,
    direction: FftDirection,
    plans: &mut FftPlans,
) {
    for axis in 0..values.ndim() {
        let len = values.len_of(Axis(axis));
        if len < 2 {
            continue;
        }
        let fft = plans.plan(len, direction);
        let mut buffer = vec![Complex64::new(0.0, 0.0); len];
        let mut scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        for mut lane in values.lanes_mut(Axis(axis)) {
            for (slot, value) in buffer.iter_mut().zip(lane.iter()) {
                *slot = *value;
            }
            fft.process_with_scratch(&mut buffer, &mut scratch);
            for (value, slot) in lane.iter_mut().zip(buffer.iter()) {
                *value = *slot;
            }
        }
    }
    if direction == FftDirection::Inverse && !values.is_empty() {
        let scale = 1.0 / values.len() as f64;
        values.mapv_inplace(|value| value * scale);
    }
}
