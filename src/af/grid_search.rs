use log::trace;

use crate::af::{
    assign_from_matrix, check_priors, load_matrix, AlleleFrequencyMatrix, AlleleFrequencyModel,
    AlleleFrequencyPosteriors, SampleLikelihoods, LOG10_OPTIMIZATION_EPSILON, VALUE_NOT_CALCULATED,
};
use crate::errors::Result;
use crate::record::{Allele, GenotypeMap};

/// Greedy sweep over `k` that stops once the posterior has fallen more than
/// [`LOG10_OPTIMIZATION_EPSILON`] below the best value seen.
#[derive(Debug, Default)]
pub struct GridSearchModel {
    matrix: AlleleFrequencyMatrix,
}

impl GridSearchModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self) -> &AlleleFrequencyMatrix {
        &self.matrix
    }
}

impl AlleleFrequencyModel for GridSearchModel {
    fn log10_posteriors(
        &mut self,
        likelihoods: &SampleLikelihoods,
        log10_priors: &[f64],
    ) -> Result<AlleleFrequencyPosteriors> {
        check_priors(likelihoods, log10_priors)?;
        load_matrix(&mut self.matrix, likelihoods);
        // clear hom-ref samples stay AA at every k
        let clear_ref: f64 = likelihoods
            .values()
            .filter(|gl| gl.is_clear_ref())
            .map(|gl| gl.aa)
            .sum();

        let mut posteriors = vec![VALUE_NOT_CALCULATED; 2 * likelihoods.len() + 1];
        let mut max = VALUE_NOT_CALCULATED;
        for k in 0..=2 * self.matrix.n_samples() {
            if k > 0 {
                self.matrix.increment_frequency()?;
            }
            let posterior = self.matrix.get_likelihoods_of_frequency() + clear_ref + log10_priors[k];
            posteriors[k] = posterior;
            max = max.max(posterior);
            if max - posterior > LOG10_OPTIMIZATION_EPSILON {
                trace!("grid search stopped at k = {}", k);
                break;
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
