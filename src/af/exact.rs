use log::{debug, trace};

use crate::af::{
    assign_from_matrix, check_priors, log10_sum_log10, AlleleFrequencyMatrix, AlleleFrequencyModel,
    AlleleFrequencyPosteriors, SampleLikelihoods,
};
use crate::errors::Result;
use crate::record::{Allele, GenotypeMap};

/// Keeps `p` away from 0 and 1 so both `log10(p)` and `log10(1 - p)` stay finite.
const MIN_FREQUENCY: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExactModelConfig {
    pub max_iterations: usize,
    /// Convergence threshold on the change of the mean allele frequency.
    pub tolerance: f64,
}

impl Default for ExactModelConfig {
    fn default() -> Self {
        ExactModelConfig {
            max_iterations: 50,
            tolerance: 1e-4,
        }
    }
}

/// Exact likelihood of every allele count by dynamic programming over samples.
///
/// `y[j][k]` is the (row-normalized) probability that the first `j` samples
/// carry exactly `k` alternate alleles.
#[derive(Debug, Default)]
pub struct ExactModel {
    config: ExactModelConfig,
    y: Vec<Vec<f64>>,
    log10_factorials: Vec<f64>,
    matrix: AlleleFrequencyMatrix,
    iterations: usize,
}

impl ExactModel {
    pub fn new(config: ExactModelConfig) -> Self {
        ExactModel {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &ExactModelConfig {
        &self.config
    }

    /// Reweighting rounds run by the last `log10_posteriors` call.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// `log10 C(n, k)` from a cached table of `log10(i!)`.
    fn log10_binomial(&mut self, n: usize, k: usize) -> f64 {
        if self.log10_factorials.is_empty() {
            self.log10_factorials.push(0.0);
        }
        while self.log10_factorials.len() <= n {
            let i = self.log10_factorials.len();
            let previous = self.log10_factorials[i - 1];
            self.log10_factorials.push(previous + (i as f64).log10());
        }
        let f = &self.log10_factorials;
        f[n] - f[k] - f[n - k]
    }

    /// Final row of the recursion, one entry per allele count `0..=2N`.
    fn allele_count_likelihoods(&mut self, likelihoods: &SampleLikelihoods) -> &[f64] {
        let n = likelihoods.len();
        self.y.resize_with(n + 1, Vec::new);
        self.y[0].clear();
        self.y[0].push(1.0);
        for (j, gl) in likelihoods.values().enumerate().map(|(i, gl)| (i + 1, gl)) {
            // linear scale relative to the best genotype
            let best = gl.aa.max(gl.ab).max(gl.bb);
            let [aa, ab, bb] = gl.as_array().map(|l| 10f64.powf(l - best));

            let (done, rest) = self.y.split_at_mut(j);
            let previous = &done[j - 1];
            let row = &mut rest[0];
            row.clear();
            let two_j = 2.0 * j as f64;
            for k in 0..=2 * j {
                let kf = k as f64;
                let mut value = 0.0;
                if k + 2 <= 2 * j {
                    value += (two_j - kf) * (two_j - kf - 1.0) * previous[k] * aa;
                }
                if k >= 1 && k < 2 * j {
                    value += 2.0 * kf * (two_j - kf) * previous[k - 1] * ab;
                }
                if k >= 2 {
                    value += kf * (kf - 1.0) * previous[k - 2] * bb;
                }
                row.push(value / (two_j * (two_j - 1.0)));
            }
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|v| *v /= sum);
            }
        }
        &self.y[n]
    }
}

impl AlleleFrequencyModel for ExactModel {
    fn log10_posteriors(
        &mut self,
        likelihoods: &SampleLikelihoods,
        log10_priors: &[f64],
    ) -> Result<AlleleFrequencyPosteriors> {
        check_priors(likelihoods, log10_priors)?;
        let n_chromosomes = 2 * likelihoods.len();
        let config = self.config;
        let log10_likelihoods = self
            .allele_count_likelihoods(likelihoods)
            .iter()
            .map(|l| l.log10())
            .collect::<Vec<_>>();

        let priors = &log10_priors[..=n_chromosomes];
        let mut weights = priors.to_vec();
        let mut posteriors = Vec::with_capacity(n_chromosomes + 1);
        let mut previous_frequency: Option<f64> = None;
        self.iterations = 0;
        for iteration in 0..config.max_iterations.max(1) {
            self.iterations = iteration + 1;
            posteriors = log10_likelihoods
                .iter()
                .zip(&weights)
                .map(|(l, w)| l + w)
                .collect();
            let total = log10_sum_log10(&posteriors);
            posteriors.iter_mut().for_each(|p| *p -= total);

            let frequency = if n_chromosomes == 0 {
                0.0
            } else {
                posteriors
                    .iter()
                    .enumerate()
                    .map(|(k, p)| k as f64 * 10f64.powf(*p))
                    .sum::<f64>()
                    / n_chromosomes as f64
            };
            trace!("iteration {}: mean allele frequency {}", iteration, frequency);
            if previous_frequency.map_or(false, |p| (frequency - p).abs() < config.tolerance) {
                debug!("converged after {} iterations", iteration + 1);
                break;
            }
            previous_frequency = Some(frequency);

            // binomial probability of k alternate alleles at frequency p
            let p = frequency.max(MIN_FREQUENCY).min(1.0 - MIN_FREQUENCY);
            for (k, prior) in priors.iter().enumerate() {
                weights[k] = prior
                    + self.log10_binomial(n_chromosomes, k)
                    + k as f64 * p.log10()
                    + (n_chromosomes - k) as f64 * (1.0 - p).log10();
            }
        }
        Ok(AlleleFrequencyPosteriors::new(posteriors))
    }

    fn assign_genotypes(
        &mut self,
        likelihoods: &SampleLikelihoods,
        posteriors: &AlleleFrequencyPosteriors,
        alleles: &[Allele],
    ) -> Result<GenotypeMap> {
        assign_from_matrix(&mut self.matrix, posteriors.max_index(), likelihoods, alleles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::af::{heterozygosity_priors, BiallelicGenotypeLikelihoods, GridSearchModel};
    use crate::record::GenotypeType;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn likelihoods(values: &[[f64; 3]]) -> SampleLikelihoods {
        values
            .iter()
            .enumerate()
            .map(|(i, [aa, ab, bb])| {
                (format!("s{}", i + 1), BiallelicGenotypeLikelihoods::new(*aa, *ab, *bb))
            })
            .collect()
    }

    #[test]
    fn test_single_sample_recursion() {
        let gls = likelihoods(&[[-2.0, -1.0, 0.0]]);
        let mut model = ExactModel::default();
        let row = model.allele_count_likelihoods(&gls).to_vec();
        let total = 0.01 + 0.1 + 1.0;
        assert_relative_eq!(row[0], 0.01 / total, epsilon = 1e-12);
        assert_relative_eq!(row[1], 0.1 / total, epsilon = 1e-12);
        assert_relative_eq!(row[2], 1.0 / total, epsilon = 1e-12);
    }

    #[test]
    fn test_rows_are_normalized() {
        let gls = likelihoods(&[[0.0, -1.0, -3.0], [-4.0, 0.0, -4.0], [-30.0, -12.0, 0.0]]);
        let mut model = ExactModel::default();
        model.allele_count_likelihoods(&gls);
        for (j, row) in model.y.iter().enumerate() {
            assert_eq!(row.len(), 2 * j + 1);
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_posteriors_sum_to_one() {
        let gls = likelihoods(&[[0.0, -2.0, -5.0], [-3.0, 0.0, -3.0], [0.0, -1.0, -4.0]]);
        let mut model = ExactModel::default();
        let posteriors = model
            .log10_posteriors(&gls, &heterozygosity_priors(6, 1e-3))
            .unwrap();
        assert_eq!(posteriors.len(), 7);
        let total: f64 = posteriors.log10_values().iter().map(|p| 10f64.powf(*p)).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(posteriors.normalized().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hom_ref_and_hom_var_sites() {
        let mut model = ExactModel::new(ExactModelConfig::default());
        let priors = heterozygosity_priors(4, 1e-3);

        let hom_ref = likelihoods(&[[0.0, -5.0, -10.0], [0.0, -6.0, -12.0]]);
        let posteriors = model.log10_posteriors(&hom_ref, &priors).unwrap();
        assert_eq!(posteriors.max_index(), 0);
        assert!(posteriors.log10_p_non_ref() < -3.0);

        let hom_var = likelihoods(&[[-30.0, -10.0, 0.0], [-30.0, -10.0, 0.0]]);
        let posteriors = model.log10_posteriors(&hom_var, &priors).unwrap();
        assert_eq!(posteriors.max_index(), 4);
        assert!(posteriors.log10_p_ref() < -10.0);
    }

    #[test]
    fn test_single_iteration_is_plain_bayes() {
        let gls = likelihoods(&[[-1.0, 0.0, -1.0]]);
        let mut model = ExactModel::new(ExactModelConfig {
            max_iterations: 1,
            tolerance: 1e-4,
        });
        let posteriors = model.log10_posteriors(&gls, &[0.0, 0.0, 0.0]).unwrap();
        let expected = [0.1 / 1.2, 1.0 / 1.2, 0.1 / 1.2];
        for (p, e) in posteriors.normalized().iter().zip(&expected) {
            assert_relative_eq!(*p, *e, epsilon = 1e-12);
        }
    }

    fn mean_frequency(posteriors: &AlleleFrequencyPosteriors) -> f64 {
        let normalized = posteriors.normalized();
        let n_chromosomes = (normalized.len() - 1) as f64;
        normalized
            .iter()
            .enumerate()
            .map(|(k, p)| k as f64 * p)
            .sum::<f64>()
            / n_chromosomes
    }

    #[test]
    fn test_log10_binomial() {
        let mut model = ExactModel::default();
        assert_abs_diff_eq!(model.log10_binomial(4, 2), 6f64.log10(), epsilon = 1e-12);
        assert_abs_diff_eq!(model.log10_binomial(20, 0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.log10_binomial(20, 10), 184756f64.log10(), epsilon = 1e-9);
    }

    #[test]
    fn test_reweighting_converges_and_keeps_mixed_frequency() {
        let mut values = vec![[0.0, -2.0, -4.0]; 5];
        values.extend(vec![[-3.0, 0.0, -3.0]; 3]);
        values.extend(vec![[-6.0, -3.0, 0.0]; 2]);
        let gls = likelihoods(&values);
        let flat = vec![0.0; 21];

        let mut single = ExactModel::new(ExactModelConfig {
            max_iterations: 1,
            tolerance: 1e-4,
        });
        let one_pass = mean_frequency(&single.log10_posteriors(&gls, &flat).unwrap());

        let mut model = ExactModel::default();
        let posteriors = model.log10_posteriors(&gls, &flat).unwrap();
        assert!(model.iterations() > 1);
        assert!(model.iterations() < model.config().max_iterations);
        assert_abs_diff_eq!(mean_frequency(&posteriors), one_pass, epsilon = 5e-4);
        assert_eq!(posteriors.max_index(), 7);
    }

    #[test]
    fn test_agrees_with_grid_search_calls() {
        let gls = likelihoods(&[[-20.0, -10.0, 0.0], [-10.0, 0.0, -10.0], [0.0, -10.0, -20.0]]);
        let alleles = vec![Allele::reference("G"), Allele::alternate("A")];
        let priors = heterozygosity_priors(6, 1e-3);

        let mut exact = ExactModel::default();
        let posteriors = exact.log10_posteriors(&gls, &priors).unwrap();
        assert_eq!(posteriors.max_index(), 3);
        let exact_calls = exact.assign_genotypes(&gls, &posteriors, &alleles).unwrap();

        let mut grid = GridSearchModel::new();
        let posteriors = grid.log10_posteriors(&gls, &priors).unwrap();
        let grid_calls = grid.assign_genotypes(&gls, &posteriors, &alleles).unwrap();

        assert_eq!(exact_calls, grid_calls);
        assert_eq!(exact_calls["s1"].genotype_type(), GenotypeType::HomVar);
        assert_eq!(exact_calls["s3"].genotype_type(), GenotypeType::HomRef);
    }

    #[test]
    fn test_no_samples() {
        let mut model = ExactModel::default();
        let posteriors = model.log10_posteriors(&SampleLikelihoods::new(), &[0.0]).unwrap();
        assert_eq!(posteriors.len(), 1);
        assert_eq!(posteriors.max_index(), 0);
    }
}
