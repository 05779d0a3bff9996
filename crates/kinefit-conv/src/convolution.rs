//! FFT "same" convolution with power-of-two zero padding.
//!
//! Every axis is padded to the next power of two not smaller than
//! `data_len + kernel_len - 1`, so the circular product never wraps onto the
//! retained window. Data and kernel are each centred in the padded volume
//! (left margin `floor(diff / 2)`, the odd remainder on the right). The kernel
//! centre is the pixel at index `len / 2` on every axis; the output pixel `i`
//! is the real part of the inverse transform at
//! `(left_data + left_kernel + kernel_len / 2 + i) mod padded_len`.
//!
//! Transforming the kernel is the expensive part of a convolution, so the
//! spatial path returns a [`KernelSpectrum`] that later calls can pass back in
//! through [`Kernel::Spectrum`].

use ndarray::{
    Array, Array1, Array2, Array3, ArrayD, ArrayView, ArrayView1, ArrayView2, ArrayView3,
    ArrayViewD, Dimension, IxDyn,
};
use rustfft::num_complex::Complex64;
use rustfft::FftDirection;

use kinefit_core::{ErrorInfo, KineError};

use crate::fft::{self, FftPlans};

/// Fourier transform of a zero-padded kernel, valid for one data shape.
#[derive(Debug, Clone)]
pub struct KernelSpectrum {
    data_shape: Vec<usize>,
    kernel_shape: Vec<usize>,
    padded_shape: Vec<usize>,
    values: ArrayD<Complex64>,
}

impl KernelSpectrum {
    /// Transforms `kernel` for convolutions of data shaped like `data_shape`.
    pub fn compute(data_shape: &[usize], kernel: ArrayViewD<'_, f64>) -> Result<Self, KineError> {
        Self::compute_with(data_shape, kernel, &mut FftPlans::new())
    }

    /// [`KernelSpectrum::compute`] drawing on a shared plan cache.
    pub fn compute_with(
        data_shape: &[usize],
        kernel: ArrayViewD<'_, f64>,
        plans: &mut FftPlans,
    ) -> Result<Self, KineError> {
        if kernel.ndim() != data_shape.len() {
            return Err(KineError::Convolution(
                ErrorInfo::new("rank-mismatch", "kernel rank differs from data rank")
                    .with_context("data_rank", data_shape.len().to_string())
                    .with_context("kernel_rank", kernel.ndim().to_string()),
            ));
        }
        if kernel.is_empty() || data_shape.iter().any(|&len| len == 0) {
            return Err(KineError::Convolution(
                ErrorInfo::new("empty-operand", "cannot convolve an empty array")
                    .with_context("data_shape", format!("{data_shape:?}"))
                    .with_context("kernel_shape", format!("{:?}", kernel.shape())),
            ));
        }
        let padded_shape: Vec<usize> = data_shape
            .iter()
            .zip(kernel.shape())
            .map(|(&n_data, &n_kernel)| padded_length(n_data, n_kernel))
            .collect();
        let mut values = ArrayD::<Complex64>::zeros(IxDyn(&padded_shape));
        embed(&mut values, kernel.view());
        fft::transform(&mut values, FftDirection::Forward, plans);
        Ok(Self {
            data_shape: data_shape.to_vec(),
            kernel_shape: kernel.shape().to_vec(),
            padded_shape,
            values,
        })
    }

    /// Shape of the data this spectrum was computed for.
    pub fn data_shape(&self) -> &[usize] {
        &self.data_shape
    }

    /// Shape of the spatial kernel.
    pub fn kernel_shape(&self) -> &[usize] {
        &self.kernel_shape
    }

    /// Padded working shape.
    pub fn padded_shape(&self) -> &[usize] {
        &self.padded_shape
    }

    fn ensure_matches(&self, data_shape: &[usize]) -> Result<(), KineError> {
        if self.data_shape != data_shape {
            return Err(KineError::Convolution(
                ErrorInfo::new(
                    "spectrum-shape-mismatch",
                    "kernel spectrum was computed for a different data shape",
                )
                .with_context("expected", format!("{:?}", self.data_shape))
                .with_context("actual", format!("{data_shape:?}"))
                .with_hint("recompute the spectrum from the spatial kernel"),
            ));
        }
        Ok(())
    }
}

/// Kernel operand of a convolution.
#[derive(Debug, Clone)]
pub enum Kernel<'a> {
    /// Spatial kernel; its spectrum is computed and returned.
    Spatial(ArrayViewD<'a, f64>),
    /// Previously computed spectrum; nothing is recomputed.
    Spectrum(&'a KernelSpectrum),
}

impl<'a> Kernel<'a> {
    /// Wraps a spatial kernel of any rank.
    pub fn spatial<D: Dimension>(kernel: ArrayView<'a, f64, D>) -> Self {
        Kernel::Spatial(kernel.into_dyn())
    }
}

/// Result of a convolution.
#[derive(Debug, Clone)]
pub struct ConvolutionOutput<D: Dimension> {
    /// Convolved data, same shape as the input.
    pub data: Array<f64, D>,
    /// Kernel spectrum, present when the kernel was given spatially.
    pub spectrum: Option<KernelSpectrum>,
}

/// Padded length for one axis: next power of two `>= data + kernel - 1`.
pub fn padded_length(data_len: usize, kernel_len: usize) -> usize {
    (data_len + kernel_len).saturating_sub(1).max(1).next_power_of_two()
}

/// Convolves `data` with `kernel`, returning an array of the same shape.
pub fn convolve_same<D: Dimension>(
    data: ArrayView<'_, f64, D>,
    kernel: Kernel<'_>,
) -> Result<ConvolutionOutput<D>, KineError> {
    convolve_same_with(data, kernel, &mut FftPlans::new())
}

/// [`convolve_same`] reusing the FFT plans cached in `plans`.
pub fn convolve_same_with<D: Dimension>(
    data: ArrayView<'_, f64, D>,
    kernel: Kernel<'_>,
    plans: &mut FftPlans,
) -> Result<ConvolutionOutput<D>, KineError> {
    match kernel {
        Kernel::Spatial(spatial) => {
            let spectrum = KernelSpectrum::compute_with(data.shape(), spatial, plans)?;
            let convolved = apply(&spectrum, data, plans)?;
            Ok(ConvolutionOutput {
                data: convolved,
                spectrum: Some(spectrum),
            })
        }
        Kernel::Spectrum(spectrum) => {
            spectrum.ensure_matches(data.shape())?;
            Ok(ConvolutionOutput {
                data: apply(spectrum, data, plans)?,
                spectrum: None,
            })
        }
    }
}

/// One-dimensional [`convolve_same`].
pub fn convolve_1d(
    data: ArrayView1<'_, f64>,
    kernel: Kernel<'_>,
) -> Result<(Array1<f64>, Option<KernelSpectrum>), KineError> {
    let out = convolve_same(data, kernel)?;
    Ok((out.data, out.spectrum))
}

/// Two-dimensional [`convolve_same`].
pub fn convolve_2d(
    data: ArrayView2<'_, f64>,
    kernel: Kernel<'_>,
) -> Result<(Array2<f64>, Option<KernelSpectrum>), KineError> {
    let out = convolve_same(data, kernel)?;
    Ok((out.data, out.spectrum))
}

/// Three-dimensional [`convolve_same`].
pub fn convolve_3d(
    data: ArrayView3<'_, f64>,
    kernel: Kernel<'_>,
) -> Result<(Array3<f64>, Option<KernelSpectrum>), KineError> {
    let out = convolve_same(data, kernel)?;
    Ok((out.data, out.spectrum))
}

fn apply<D: Dimension>(
    spectrum: &KernelSpectrum,
    data: ArrayView<'_, f64, D>,
    plans: &mut FftPlans,
) -> Result<Array<f64, D>, KineError> {
    let mut work = ArrayD::<Complex64>::zeros(IxDyn(&spectrum.padded_shape));
    embed(&mut work, data.view().into_dyn());

    fft::transform(&mut work, FftDirection::Forward, plans);
    work.zip_mut_with(&spectrum.values, |value, kernel| *value *= *kernel);
    fft::transform(&mut work, FftDirection::Inverse, plans);

    let shift: Vec<usize> = spectrum
        .padded_shape
        .iter()
        .zip(spectrum.data_shape.iter().zip(&spectrum.kernel_shape))
        .map(|(&padded, (&n_data, &n_kernel))| {
            left_margin(padded, n_data) + left_margin(padded, n_kernel) + n_kernel / 2
        })
        .collect();
    let mut source = vec![0usize; shift.len()];
    let convolved = ArrayD::from_shape_fn(IxDyn(data.shape()), |idx| {
        for axis in 0..source.len() {
            source[axis] = (idx[axis] + shift[axis]) % spectrum.padded_shape[axis];
        }
        work[source.as_slice()].re
    });
    convolved.into_dimensionality::<D>().map_err(|err| {
        KineError::Convolution(ErrorInfo::new("output-shape", err.to_string()))
    })
}

fn left_margin(padded: usize, len: usize) -> usize {
    (padded - len) / 2
}

fn embed(target: &mut ArrayD<Complex64>, source: ArrayViewD<'_, f64>) {
    let offsets: Vec<usize> = target
        .shape()
        .iter()
        .zip(source.shape())
        .map(|(&padded, &len)| left_margin(padded, len))
        .collect();
    let mut dest = vec![0usize; offsets.len()];
    for (idx, &value) in source.indexed_iter() {
        for axis in 0..dest.len() {
            dest[axis] = idx[axis] + offsets[axis];
        }
        target[dest.as_slice()] = Complex64::new(value, 0.0);
    }
}
