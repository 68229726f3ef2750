//! Biallelic allele-frequency calculation over the population allele count
//! `k = 0..=2N`, and the per-sample genotype calls derived from it.
//!
//! All likelihoods, priors and posteriors are log10 values. Model instances
//! keep scratch state between sites, so each worker owns its own instance.

pub mod exact;
pub mod grid_search;
pub mod matrix;

use indexmap::IndexMap;

use crate::errors::{Error, Result};
use crate::record::{Allele, GenotypeBuilder, GenotypeMap};

pub use exact::{ExactModel, ExactModelConfig};
pub use grid_search::GridSearchModel;
pub use matrix::AlleleFrequencyMatrix;

/// Posterior gap (log10) beyond which a search stops, and the margin by
/// which AA must beat both other states for a sample to be clearly hom-ref.
pub const LOG10_OPTIMIZATION_EPSILON: f64 = 8.0;

/// Posterior entry that was never computed; counts as zero probability.
pub const VALUE_NOT_CALCULATED: f64 = -f64::MAX;

pub const DEFAULT_HETEROZYGOSITY: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiploidGenotype {
    AA,
    AB,
    BB,
}

impl DiploidGenotype {
    pub const ALL: [DiploidGenotype; 3] = [DiploidGenotype::AA, DiploidGenotype::AB, DiploidGenotype::BB];

    /// Number of alternate alleles carried.
    pub fn alt_count(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<DiploidGenotype> {
        match self {
            DiploidGenotype::AA => Some(DiploidGenotype::AB),
            DiploidGenotype::AB => Some(DiploidGenotype::BB),
            DiploidGenotype::BB => None,
        }
    }
}

/// log10 likelihoods of the three diploid genotypes of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiallelicGenotypeLikelihoods {
    pub aa: f64,
    pub ab: f64,
    pub bb: f64,
}

impl BiallelicGenotypeLikelihoods {
    pub fn new(aa: f64, ab: f64, bb: f64) -> Self {
        BiallelicGenotypeLikelihoods { aa, ab, bb }
    }

    /// From phred-scaled `PL` values of a biallelic site.
    pub fn from_pls(pls: &[i32]) -> Option<Self> {
        match pls {
            [aa, ab, bb] => Some(Self::new(
                *aa as f64 / -10.0,
                *ab as f64 / -10.0,
                *bb as f64 / -10.0,
            )),
            _ => None,
        }
    }

    pub fn get(&self, genotype: DiploidGenotype) -> f64 {
        match genotype {
            DiploidGenotype::AA => self.aa,
            DiploidGenotype::AB => self.ab,
            DiploidGenotype::BB => self.bb,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.aa, self.ab, self.bb]
    }

    /// Most likely genotype; the earlier state wins ties.
    pub fn best(&self) -> DiploidGenotype {
        DiploidGenotype::ALL
            .iter()
            .copied()
            .fold(DiploidGenotype::AA, |best, g| {
                if self.get(g) > self.get(best) {
                    g
                } else {
                    best
                }
            })
    }

    /// AA beats both other genotypes by more than [`LOG10_OPTIMIZATION_EPSILON`].
    pub fn is_clear_ref(&self) -> bool {
        self.aa - LOG10_OPTIMIZATION_EPSILON > self.ab && self.aa - LOG10_OPTIMIZATION_EPSILON > self.bb
    }

    /// Phred-scaled likelihoods relative to the best genotype.
    pub fn to_pls(&self) -> Vec<i32> {
        let best = self.get(self.best());
        self.as_array()
            .iter()
            .map(|l| (-10.0 * (l - best)).round() as i32)
            .collect()
    }
}

pub type SampleLikelihoods = IndexMap<String, BiallelicGenotypeLikelihoods>;

/// log10 of `sum(10^v)`, stable for large magnitudes.
pub fn log10_sum_log10(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| 10f64.powf(v - max)).sum::<f64>().log10()
}

/// log10 prior over `0..=n_chromosomes`: `h / i` for `i >= 1`, the rest at 0.
pub fn heterozygosity_priors(n_chromosomes: usize, heterozygosity: f64) -> Vec<f64> {
    let mut priors = vec![0.0; n_chromosomes + 1];
    let mut sum = 0.0;
    for (i, prior) in priors.iter_mut().enumerate().skip(1) {
        *prior = heterozygosity / i as f64;
        sum += *prior;
    }
    priors[0] = 1.0 - sum;
    priors.into_iter().map(f64::log10).collect()
}

/// log10 posterior over the population allele count.
#[derive(Debug, Clone, PartialEq)]
pub struct AlleleFrequencyPosteriors {
    log10: Vec<f64>,
}

impl AlleleFrequencyPosteriors {
    pub fn new(log10: Vec<f64>) -> Self {
        AlleleFrequencyPosteriors { log10 }
    }

    pub fn log10_values(&self) -> &[f64] {
        &self.log10
    }

    pub fn len(&self) -> usize {
        self.log10.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log10.is_empty()
    }

    pub fn is_calculated(&self, k: usize) -> bool {
        self.log10.get(k).map_or(false, |&v| v != VALUE_NOT_CALCULATED)
    }

    /// Allele count with the highest posterior; the lowest count wins ties.
    pub fn max_index(&self) -> usize {
        let mut best = 0;
        for (k, &v) in self.log10.iter().enumerate() {
            if v > self.log10[best] {
                best = k;
            }
        }
        best
    }

    /// Linear posteriors summing to one. Uncalculated entries are zero.
    pub fn normalized(&self) -> Vec<f64> {
        let calculated = self
            .log10
            .iter()
            .copied()
            .filter(|&v| v != VALUE_NOT_CALCULATED)
            .collect::<Vec<_>>();
        let total = log10_sum_log10(&calculated);
        self.log10
            .iter()
            .map(|&v| {
                if v == VALUE_NOT_CALCULATED || total == f64::NEG_INFINITY {
                    0.0
                } else {
                    10f64.powf(v - total)
                }
            })
            .collect()
    }

    /// log10 probability that the site is polymorphic (`k > 0`).
    pub fn log10_p_non_ref(&self) -> f64 {
        self.normalized().iter().skip(1).sum::<f64>().log10()
    }

    /// log10 probability that no alternate allele is present.
    pub fn log10_p_ref(&self) -> f64 {
        self.normalized().first().copied().unwrap_or(0.0).log10()
    }
}

/// Turns per-sample likelihoods into posteriors over `k`, then into calls.
pub trait AlleleFrequencyModel {
    /// `log10_priors` must cover `0..=2N` for the `N` samples.
    fn log10_posteriors(
        &mut self,
        likelihoods: &SampleLikelihoods,
        log10_priors: &[f64],
    ) -> Result<AlleleFrequencyPosteriors>;

    /// Calls every sample at the posterior-maximizing allele count.
    /// `alleles` are the site's REF and ALT.
    fn assign_genotypes(
        &mut self,
        likelihoods: &SampleLikelihoods,
        posteriors: &AlleleFrequencyPosteriors,
        alleles: &[Allele],
    ) -> Result<GenotypeMap>;
}

pub(crate) fn check_priors(likelihoods: &SampleLikelihoods, log10_priors: &[f64]) -> Result<()> {
    let needed = 2 * likelihoods.len() + 1;
    if log10_priors.len() < needed {
        return Err(Error::internal(format!(
            "prior vector has {} entries, {} samples need {}",
            log10_priors.len(),
            likelihoods.len(),
            needed
        )));
    }
    Ok(())
}

/// Fills `matrix` with every sample that is not clearly hom-ref.
pub(crate) fn load_matrix(matrix: &mut AlleleFrequencyMatrix, likelihoods: &SampleLikelihoods) {
    matrix.clear();
    for (sample, gl) in likelihoods {
        if !gl.is_clear_ref() {
            matrix.set_likelihoods(sample, *gl);
        }
    }
}

/// Calls genotypes from the matrix snapshot at `best_k`, walking the matrix
/// there first unless a snapshot for these samples already exists.
pub(crate) fn assign_from_matrix(
    matrix: &mut AlleleFrequencyMatrix,
    best_k: usize,
    likelihoods: &SampleLikelihoods,
    alleles: &[Allele],
) -> Result<GenotypeMap> {
    let (reference, alternate) = match alleles {
        [r, a, ..] => (r.clone(), a.clone()),
        _ => {
            return Err(Error::InvalidRecord {
                message: format!("genotype assignment needs REF and ALT, got {} alleles", alleles.len()),
            })
        }
    };

    let matrix_samples = likelihoods
        .iter()
        .filter(|(_, gl)| !gl.is_clear_ref())
        .map(|(s, _)| s.as_str());
    if !matrix.samples().iter().map(String::as_str).eq(matrix_samples) {
        load_matrix(matrix, likelihoods);
    }
    let best_k = best_k.min(2 * matrix.n_samples());
    if !matrix.has_snapshot(best_k) {
        if matrix.current_allele_count() > best_k {
            load_matrix(matrix, likelihoods);
        }
        while matrix.current_allele_count() < best_k {
            matrix.increment_frequency()?;
        }
        matrix.get_likelihoods_of_frequency();
    }

    let mut genotypes = GenotypeMap::with_capacity(likelihoods.len());
    for (sample, gl) in likelihoods {
        let (state, confidence) = if gl.is_clear_ref() {
            (DiploidGenotype::AA, gl.aa - gl.ab.max(gl.bb))
        } else {
            matrix.get_genotype(best_k, sample)?
        };
        let called = match state {
            DiploidGenotype::AA => vec![reference.clone(), reference.clone()],
            DiploidGenotype::AB => vec![reference.clone(), alternate.clone()],
            DiploidGenotype::BB => vec![alternate.clone(), alternate.clone()],
        };
        let genotype = GenotypeBuilder::new(sample.as_str())
            .alleles(called)
            .log10_p_error(-confidence)
            .likelihoods(gl.to_pls())
            .make();
        genotypes.insert(sample.clone(), genotype);
    }
    Ok(genotypes)
}
