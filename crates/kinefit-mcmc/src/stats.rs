use serde::{Deserialize, Serialize};

use kinefit_core::Cube;

use crate::analysis::{median, BestFitMethod};

/// Information criteria and goodness-of-fit summary of a finished fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    /// Reduced chi-square at the best-fit parameters.
    pub chi2_at_p: f64,
    /// Lowest reduced chi-square met by the chain.
    pub best_chi2: f64,
    /// Degrees of freedom used to reduce the chi-square.
    pub degrees_of_freedom: f64,
    /// Free parameters.
    pub k_free: usize,
    /// Voxels in the observed cube.
    pub n_data: usize,
    /// Bayesian information criterion `χ² + k ln N`.
    pub bic: f64,
    /// Akaike information criterion `χ² + 2k`.
    pub aic: f64,
    /// Effective number of parameters `2 var(-χ²/2)` over the sub-chain.
    pub p_d: f64,
    /// Deviance information criterion `χ² + 2 pD`.
    pub dic: f64,
    /// Peak of the convolved model relative to the median noise.
    pub snr_max: f64,
}

/// Inputs of [`FitStatistics::compute`].
#[derive(Debug, Clone, Copy)]
pub struct StatisticsInput<'a> {
    /// Reduced chi-square at the best-fit parameters.
    pub chi2_at_p: f64,
    /// Lowest reduced chi-square of the chain.
    pub best_chi2: f64,
    /// Degrees of freedom of the reduction.
    pub degrees_of_freedom: f64,
    /// Free parameters.
    pub k_free: usize,
    /// Reduced chi-square of the selected sub-chain.
    pub sub_chain_chi: &'a [f64],
    /// Selection policy; chi-sorted sub-chains carry no deviance spread.
    pub method: BestFitMethod,
    /// Convolved best-fit model.
    pub convolved: &'a Cube,
    /// Variance cube used by the fit.
    pub variance: &'a Cube,
}

impl FitStatistics {
    /// Derives the criteria from the best fit and its sub-chain.
    pub fn compute(input: StatisticsInput<'_>) -> Self {
        let n_data = input.convolved.len();
        let k = input.k_free as f64;
        let chi2 = input.chi2_at_p * input.degrees_of_freedom;
        let bic = chi2 + k * (n_data as f64).ln();
        let aic = chi2 + 2.0 * k;

        let (p_d, dic) = match input.method {
            BestFitMethod::ChiSorted => (0.0, 0.0),
            _ => {
                let log_likelihood: Vec<f64> = input
                    .sub_chain_chi
                    .iter()
                    .map(|chi| -0.5 * chi * input.degrees_of_freedom)
                    .filter(|value| value.is_finite())
                    .collect();
                let p_d = 2.0 * variance(&log_likelihood);
                (p_d, chi2 + 2.0 * p_d)
            }
        };

        let noise = median(&input.variance.iter().copied().collect::<Vec<_>>()).sqrt();
        let snr_max = input
            .convolved
            .iter()
            .map(|value| value / noise)
            .filter(|snr| snr.is_finite())
            .fold(0.0, f64::max);

        Self {
            chi2_at_p: input.chi2_at_p,
            best_chi2: input.best_chi2,
            degrees_of_freedom: input.degrees_of_freedom,
            k_free: input.k_free,
            n_data,
            bic,
            aic,
            p_d,
            dic,
            snr_max,
        }
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn input<'a>(
        sub_chain_chi: &'a [f64],
        method: BestFitMethod,
        convolved: &'a Cube,
        variance: &'a Cube,
    ) -> StatisticsInput<'a> {
        StatisticsInput {
            chi2_at_p: 1.5,
            best_chi2: 1.2,
            degrees_of_freedom: 100.0,
            k_free: 10,
            sub_chain_chi,
            method,
            convolved,
            variance,
        }
    }

    #[test]
    fn information_criteria_follow_the_raw_chi_square() {
        let convolved = Array3::from_elem((2, 2, 2), 4.0);
        let variance = Array3::from_elem((2, 2, 2), 4.0);
        let stats = FitStatistics::compute(input(&[1.0, 2.0], BestFitMethod::Last, &convolved, &variance));
        assert_eq!(stats.n_data, 8);
        assert!((stats.bic - (150.0 + 10.0 * 8f64.ln())).abs() < 1e-9);
        assert!((stats.aic - 170.0).abs() < 1e-9);
        // -χ²/2 over the sub-chain is {-50, -100}: variance 625.
        assert!((stats.p_d - 1250.0).abs() < 1e-9);
        assert!((stats.dic - (150.0 + 2500.0)).abs() < 1e-9);
        assert!((stats.snr_max - 2.0).abs() < 1e-12);
    }

    #[test]
    fn chi_sorted_selection_has_no_deviance_criterion() {
        let convolved = Array3::from_elem((1, 2, 2), 1.0);
        let variance = Array3::from_elem((1, 2, 2), 1.0);
        let stats =
            FitStatistics::compute(input(&[1.0, 3.0], BestFitMethod::ChiSorted, &convolved, &variance));
        assert_eq!(stats.p_d, 0.0);
        assert_eq!(stats.dic, 0.0);
    }
}
