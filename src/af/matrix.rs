use std::collections::HashMap;

use crate::af::{log10_sum_log10, BiallelicGenotypeLikelihoods, DiploidGenotype};
use crate::errors::{Error, Result};

/// Per-sample genotype likelihoods walked greedily from `k = 0` upwards.
///
/// Each step promotes the one sample whose next state gains the most
/// likelihood, so `k` only grows and no sample ever moves backwards.
#[derive(Debug, Default, Clone)]
pub struct AlleleFrequencyMatrix {
    samples: Vec<String>,
    likelihoods: Vec<BiallelicGenotypeLikelihoods>,
    active: Vec<DiploidGenotype>,
    allele_count: usize,
    history: HashMap<usize, Vec<(DiploidGenotype, f64)>>,
}

impl AlleleFrequencyMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all samples and history, keeping allocations.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.likelihoods.clear();
        self.active.clear();
        self.allele_count = 0;
        self.history.clear();
    }

    /// Appends a sample in state AA.
    pub fn set_likelihoods(&mut self, sample: impl Into<String>, likelihoods: BiallelicGenotypeLikelihoods) {
        self.samples.push(sample.into());
        self.likelihoods.push(likelihoods);
        self.active.push(DiploidGenotype::AA);
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn current_allele_count(&self) -> usize {
        self.allele_count
    }

    pub fn active_genotype(&self, sample: &str) -> Option<DiploidGenotype> {
        self.sample_index(sample).map(|i| self.active[i])
    }

    fn sample_index(&self, sample: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == sample)
    }

    /// Moves the sample with the largest likelihood gain one state forward.
    pub fn increment_frequency(&mut self) -> Result<()> {
        let max_count = 2 * self.samples.len();
        if self.allele_count >= max_count {
            return Err(Error::internal(format!(
                "allele count cannot exceed {} for {} samples",
                max_count,
                self.samples.len()
            )));
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, (gl, state)) in self.likelihoods.iter().zip(&self.active).enumerate() {
            let next = match state.next() {
                Some(next) => next,
                None => continue,
            };
            let delta = gl.get(next) - gl.get(*state);
            if best.map_or(true, |(_, max)| delta > max) {
                best = Some((i, delta));
            }
        }
        let (i, _) = best.ok_or_else(|| {
            Error::internal(format!(
                "no sample can take another alternate allele at count {}",
                self.allele_count
            ))
        })?;
        // next() is Some for every candidate
        if let Some(next) = self.active[i].next() {
            self.active[i] = next;
        }
        self.allele_count += 1;
        Ok(())
    }

    /// Sum of the active-state likelihoods. Records every sample's state and
    /// confidence for the current allele count.
    pub fn get_likelihoods_of_frequency(&mut self) -> f64 {
        let snapshot = self
            .likelihoods
            .iter()
            .zip(&self.active)
            .map(|(gl, &state)| (state, confidence(gl, state)))
            .collect();
        self.history.insert(self.allele_count, snapshot);
        self.likelihoods
            .iter()
            .zip(&self.active)
            .map(|(gl, &state)| gl.get(state))
            .sum()
    }

    pub fn has_snapshot(&self, allele_count: usize) -> bool {
        self.history.contains_key(&allele_count)
    }

    /// State and confidence of `sample` as recorded at `allele_count`.
    pub fn get_genotype(&self, allele_count: usize, sample: &str) -> Result<(DiploidGenotype, f64)> {
        let snapshot = self.history.get(&allele_count).ok_or_else(|| {
            Error::internal(format!("allele count {} was never visited", allele_count))
        })?;
        let i = self
            .sample_index(sample)
            .ok_or_else(|| Error::internal(format!("sample {} is not in the matrix", sample)))?;
        Ok(snapshot[i])
    }
}

/// Gap to the runner-up when `state` is the best genotype, otherwise
/// `-log10(1 - p(state))` with `p` normalized over the three genotypes.
fn confidence(gl: &BiallelicGenotypeLikelihoods, state: DiploidGenotype) -> f64 {
    let best = gl.best();
    if state == best {
        let runner_up = DiploidGenotype::ALL
            .iter()
            .filter(|&&g| g != best)
            .map(|&g| gl.get(g))
            .fold(f64::NEG_INFINITY, f64::max);
        gl.get(best) - runner_up
    } else {
        let total = log10_sum_log10(&gl.as_array());
        let p = 10f64.powf(gl.get(state) - total);
        -(1.0 - p).log10()
    }
}
