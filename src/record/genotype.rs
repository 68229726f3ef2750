use getset::{CopyGetters, Getters};
use indexmap::{IndexMap, IndexSet};

use crate::header::Sample;
use crate::record::Allele;
use crate::types::Value;

/// Phased or unphased alleles, represented as indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenotypeAllele {
    Unphased(i32),
    Phased(i32),
    UnphasedMissing,
    PhasedMissing,
}

impl From<i32> for GenotypeAllele {
    /// Decode given GT offset: `0` is a no-call, otherwise `(offset >> 1) - 1`
    /// indexes the site's alleles and the low bit carries phasing.
    fn from(encoded: i32) -> Self {
        match (encoded >> 1, encoded & 1) {
            (0, 0) => GenotypeAllele::UnphasedMissing,
            (0, _) => GenotypeAllele::PhasedMissing,
            (e, 0) => GenotypeAllele::Unphased(e - 1),
            (e, _) => GenotypeAllele::Phased(e - 1),
        }
    }
}

impl GenotypeAllele {
    /// Get the index into the list of alleles.
    pub fn index(self) -> Option<u32> {
        match self {
            GenotypeAllele::Unphased(i) | GenotypeAllele::Phased(i) => Some(i as u32),
            GenotypeAllele::UnphasedMissing | GenotypeAllele::PhasedMissing => None,
        }
    }

    pub fn is_phased(self) -> bool {
        matches!(self, GenotypeAllele::Phased(_) | GenotypeAllele::PhasedMissing)
    }

    /// Inverse of `From<i32>`.
    pub fn encode(self) -> i32 {
        match self {
            GenotypeAllele::UnphasedMissing => 0,
            GenotypeAllele::PhasedMissing => 1,
            GenotypeAllele::Unphased(i) => (i + 1) << 1,
            GenotypeAllele::Phased(i) => ((i + 1) << 1) | 1,
        }
    }
}

/// Diploid classification of a called genotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenotypeType {
    NoCall,
    HomRef,
    Het,
    HomVar,
    Mixed,
}

/// One sample's call at one site. Immutable; built through [`GenotypeBuilder`].
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Genotype {
    #[getset(get = "pub")]
    sample: Sample,
    #[getset(get = "pub")]
    alleles: Vec<Allele>,
    #[getset(get_copy = "pub")]
    phased: bool,
    /// log10 probability that the call is wrong.
    #[getset(get_copy = "pub")]
    log10_p_error: Option<f64>,
    #[getset(get = "pub")]
    filters: Option<IndexSet<String>>,
    #[getset(get_copy = "pub")]
    depth: Option<i32>,
    #[getset(get = "pub")]
    allele_depths: Option<Vec<i32>>,
    /// Phred-scaled genotype likelihoods (PL).
    #[getset(get = "pub")]
    likelihoods: Option<Vec<i32>>,
    #[getset(get = "pub")]
    attributes: IndexMap<String, Value>,
}

impl Genotype {
    pub fn is_called(&self) -> bool {
        !self.alleles.is_empty() && self.alleles.iter().all(|a| !a.is_no_call())
    }

    pub fn genotype_type(&self) -> GenotypeType {
        if !self.is_called() {
            return GenotypeType::NoCall;
        }
        let refs = self.alleles.iter().filter(|a| a.is_reference()).count();
        if refs == self.alleles.len() {
            GenotypeType::HomRef
        } else if refs > 0 {
            GenotypeType::Het
        } else if self.alleles.windows(2).all(|w| w[0] == w[1]) {
            GenotypeType::HomVar
        } else {
            GenotypeType::Mixed
        }
    }

    /// Phred-scaled confidence, the `GQ` value.
    pub fn gq(&self) -> Option<i32> {
        self.log10_p_error.map(|e| (-10.0 * e).round() as i32)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Assembles a [`Genotype`] field by field before it is made.
#[derive(Debug, Clone)]
pub struct GenotypeBuilder {
    sample: Sample,
    alleles: Vec<Allele>,
    phased: bool,
    log10_p_error: Option<f64>,
    filters: Option<IndexSet<String>>,
    depth: Option<i32>,
    allele_depths: Option<Vec<i32>>,
    likelihoods: Option<Vec<i32>>,
    attributes: IndexMap<String, Value>,
}

impl GenotypeBuilder {
    pub fn new(sample: impl Into<Sample>) -> Self {
        GenotypeBuilder {
            sample: sample.into(),
            alleles: Vec::new(),
            phased: false,
            log10_p_error: None,
            filters: None,
            depth: None,
            allele_depths: None,
            likelihoods: None,
            attributes: IndexMap::new(),
        }
    }

    pub fn alleles(mut self, alleles: Vec<Allele>) -> Self {
        self.alleles = alleles;
        self
    }

    pub fn phased(mut self, phased: bool) -> Self {
        self.phased = phased;
        self
    }

    pub fn log10_p_error(mut self, log10_p_error: f64) -> Self {
        self.log10_p_error = Some(log10_p_error);
        self
    }

    pub fn gq(mut self, gq: i32) -> Self {
        self.log10_p_error = Some(gq as f64 / -10.0);
        self
    }

    pub fn filters<I: IntoIterator<Item = S>, S: Into<String>>(mut self, filters: I) -> Self {
        self.filters = Some(filters.into_iter().map(Into::into).collect());
        self
    }

    pub fn depth(mut self, depth: i32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn allele_depths(mut self, ad: Vec<i32>) -> Self {
        self.allele_depths = Some(ad);
        self
    }

    pub fn likelihoods(mut self, pl: Vec<i32>) -> Self {
        self.likelihoods = Some(pl);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    // in-place variants used by the columnar field decoders

    pub(crate) fn set_alleles(&mut self, alleles: Vec<Allele>, phased: bool) {
        self.alleles = alleles;
        self.phased = phased;
    }

    pub(crate) fn set_log10_p_error(&mut self, log10_p_error: f64) {
        self.log10_p_error = Some(log10_p_error);
    }

    pub(crate) fn set_depth(&mut self, depth: i32) {
        self.depth = Some(depth);
    }

    pub(crate) fn set_allele_depths(&mut self, ad: Vec<i32>) {
        self.allele_depths = Some(ad);
    }

    pub(crate) fn set_likelihoods(&mut self, pl: Vec<i32>) {
        self.likelihoods = Some(pl);
    }

    pub(crate) fn set_attribute(&mut self, key: String, value: Value) {
        self.attributes.insert(key, value);
    }

    pub fn make(self) -> Genotype {
        Genotype {
            sample: self.sample,
            alleles: self.alleles,
            phased: self.phased,
            log10_p_error: self.log10_p_error,
            filters: self.filters,
            depth: self.depth,
            allele_depths: self.allele_depths,
            likelihoods: self.likelihoods,
            attributes: self.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genotype_allele_offsets() {
        assert_eq!(GenotypeAllele::from(0), GenotypeAllele::UnphasedMissing);
        assert_eq!(GenotypeAllele::from(2), GenotypeAllele::Unphased(0));
        assert_eq!(GenotypeAllele::from(4), GenotypeAllele::Unphased(1));
        assert_eq!(GenotypeAllele::from(5), GenotypeAllele::Phased(1));
        assert_eq!(GenotypeAllele::from(2).index(), Some(0));
        assert_eq!(GenotypeAllele::from(0).index(), None);
        for offset in 0..10 {
            assert_eq!(GenotypeAllele::from(offset).encode(), offset);
        }
    }

    #[test]
    fn test_genotype_type() {
        let a = Allele::reference("A");
        let c = Allele::alternate("C");
        let g = Allele::alternate("G");
        let make = |alleles: Vec<Allele>| GenotypeBuilder::new("s").alleles(alleles).make();
        assert_eq!(make(vec![a.clone(), a.clone()]).genotype_type(), GenotypeType::HomRef);
        assert_eq!(make(vec![a.clone(), c.clone()]).genotype_type(), GenotypeType::Het);
        assert_eq!(make(vec![c.clone(), c.clone()]).genotype_type(), GenotypeType::HomVar);
        assert_eq!(make(vec![c, g]).genotype_type(), GenotypeType::Mixed);
        assert_eq!(
            make(vec![a, Allele::no_call()]).genotype_type(),
            GenotypeType::NoCall
        );
        assert_eq!(make(vec![]).genotype_type(), GenotypeType::NoCall);
    }

    #[test]
    fn test_gq_from_confidence() {
        let g = GenotypeBuilder::new("s").gq(37).make();
        assert_eq!(g.gq(), Some(37));
        assert_eq!(g.log10_p_error(), Some(-3.7));
    }
}
