mod fields;
pub mod genotype;
pub mod lazy;

use std::borrow::Cow;
use std::fmt;

use getset::{CopyGetters, Getters};
use indexmap::{IndexMap, IndexSet};

use crate::errors::{Error, Result};
use crate::header::Sample;
use crate::types::{Text, Value};

pub(crate) use fields::FieldKind;
pub use genotype::{Genotype, GenotypeAllele, GenotypeBuilder, GenotypeType};
pub use lazy::{Genotypes, UndecodedGenotypes};

pub type InfoMap = IndexMap<String, Value>;
pub type GenotypeMap = IndexMap<Sample, Genotype>;

const NO_CALL_BASES: &[u8] = b".";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allele {
    bases: Text,
    reference: bool,
}

impl Allele {
    pub fn new(bases: impl Into<Text>, reference: bool) -> Self {
        Allele {
            bases: bases.into(),
            reference,
        }
    }

    pub fn reference(bases: impl AsRef<[u8]>) -> Self {
        Allele::new(bases.as_ref(), true)
    }

    pub fn alternate(bases: impl AsRef<[u8]>) -> Self {
        Allele::new(bases.as_ref(), false)
    }

    pub fn no_call() -> Self {
        Allele::new(NO_CALL_BASES, false)
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    pub fn is_reference(&self) -> bool {
        self.reference
    }

    pub fn is_no_call(&self) -> bool {
        !self.reference && self.bases == NO_CALL_BASES
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bases)
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())?;
        if self.reference {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// A decoded variant site. Site-level fields are eager; per-sample data
/// stays undecoded until [`VariantRecord::genotypes`] is called.
#[derive(Debug, Getters, CopyGetters)]
pub struct VariantRecord {
    #[getset(get = "pub")]
    contig: String,
    /// 1-based start.
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    stop: u64,
    #[getset(get_copy = "pub")]
    log10_p_error: Option<f64>,
    id: Option<String>,
    #[getset(get = "pub")]
    alleles: Vec<Allele>,
    filters: Option<IndexSet<String>>,
    #[getset(get = "pub")]
    info: InfoMap,
    genotypes: Genotypes,
}

impl VariantRecord {
    pub fn builder() -> VariantRecordBuilder {
        VariantRecordBuilder::default()
    }

    pub fn chrom(&self) -> &str {
        &self.contig
    }

    pub fn pos(&self) -> u64 {
        self.start
    }

    /// Returns the ID of this record, `None` if not set (`.` in VCF).
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn ref_allele(&self) -> &Allele {
        &self.alleles[0]
    }

    pub fn alt_alleles(&self) -> &[Allele] {
        &self.alleles[1..]
    }

    /// Phred-scaled QUAL.
    pub fn qual(&self) -> Option<f64> {
        self.log10_p_error.map(|e| -10.0 * e)
    }

    /// `None` when unfiltered, an empty set when passing.
    pub fn filters(&self) -> Option<&IndexSet<String>> {
        self.filters.as_ref()
    }

    pub fn is_filtered(&self) -> bool {
        self.filters.as_ref().map_or(false, |f| !f.is_empty())
    }

    pub fn info_value(&self, key: &str) -> Option<&Value> {
        self.info.get(key)
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.info.get(key).map_or(false, Value::is_flag)
    }

    pub fn is_snp(&self) -> bool {
        self.alleles.len() > 1 && self.alleles.iter().all(|a| a.len() == 1)
    }

    pub fn genotypes_are_decoded(&self) -> bool {
        matches!(self.genotypes, Genotypes::Decoded(_))
    }

    /// Per-sample genotypes, decoding the raw genotype block on first access.
    /// Decodes the genotype block on first access. Errors name this record's locus.
    pub fn genotypes(&mut self) -> Result<&GenotypeMap> {
        let (contig, start) = (&self.contig, self.start);
        self.genotypes
            .decode()
            .map_err(|e| e.at_site(format!("{}:{}", contig, start)))
    }

    pub fn genotype(&mut self, sample: &str) -> Result<Option<&Genotype>> {
        Ok(self.genotypes()?.get(sample))
    }

    pub fn raw_genotypes(&self) -> &Genotypes {
        &self.genotypes
    }
}

#[derive(Debug, Default)]
pub struct VariantRecordBuilder {
    contig: Option<String>,
    start: u64,
    stop: Option<u64>,
    log10_p_error: Option<f64>,
    id: Option<String>,
    alleles: Vec<Allele>,
    filters: Option<IndexSet<String>>,
    info: InfoMap,
    genotypes: Option<Genotypes>,
}

impl VariantRecordBuilder {
    pub fn contig(mut self, contig: impl Into<String>) -> Self {
        self.contig = Some(contig.into());
        self
    }

    /// 1-based start position.
    pub fn start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    /// Explicit 1-based inclusive stop, instead of deriving it from the REF length.
    pub fn stop(mut self, stop: u64) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn log10_p_error(mut self, log10_p_error: Option<f64>) -> Self {
        self.log10_p_error = log10_p_error;
        self
    }

    pub fn qual(self, phred: f64) -> Self {
        self.log10_p_error(Some(phred / -10.0))
    }

    pub fn id(mut self, id: Option<String>) -> Self {
        self.id = id.filter(|id| !id.is_empty() && id != ".");
        self
    }

    pub fn alleles(mut self, alleles: Vec<Allele>) -> Self {
        self.alleles = alleles;
        self
    }

    /// First entry is REF, the rest ALT.
    pub fn allele_strings(self, alleles: &[&str]) -> Self {
        let alleles = alleles
            .iter()
            .enumerate()
            .map(|(i, a)| Allele::new(a.as_bytes(), i == 0))
            .collect();
        self.alleles(alleles)
    }

    pub fn filters(mut self, filters: Option<IndexSet<String>>) -> Self {
        self.filters = filters;
        self
    }

    pub fn pass(self) -> Self {
        self.filters(Some(IndexSet::new()))
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filters
            .get_or_insert_with(IndexSet::new)
            .insert(filter.into());
        self
    }

    pub fn info(mut self, key: impl Into<String>, value: Value) -> Self {
        self.info.insert(key.into(), value);
        self
    }

    pub fn info_map(mut self, info: InfoMap) -> Self {
        self.info = info;
        self
    }

    pub fn genotype(mut self, genotype: Genotype) -> Self {
        let decoded = match self.genotypes.take() {
            Some(Genotypes::Decoded(map)) => map,
            _ => GenotypeMap::new(),
        };
        let mut map = decoded;
        map.insert(genotype.sample().clone(), genotype);
        self.genotypes = Some(Genotypes::Decoded(map));
        self
    }

    pub fn genotypes(mut self, genotypes: Genotypes) -> Self {
        self.genotypes = Some(genotypes);
        self
    }

    pub fn build(self) -> Result<VariantRecord> {
        let contig = self.contig.ok_or_else(|| Error::InvalidRecord {
            message: "record without contig".into(),
        })?;
        if self.start == 0 {
            return Err(Error::InvalidRecord {
                message: format!("record at {} has no 1-based start", contig),
            });
        }
        let ref_len = match self.alleles.first() {
            Some(r) if r.is_reference() && !r.is_empty() => r.len() as u64,
            _ => {
                return Err(Error::InvalidRecord {
                    message: format!(
                        "record at {}:{} needs a non-empty reference allele first",
                        contig, self.start
                    ),
                })
            }
        };
        let stop = self.stop.unwrap_or(self.start + ref_len - 1);
        if stop < self.start {
            return Err(Error::InvalidRecord {
                message: format!("record at {}:{} ends before it starts", contig, self.start),
            });
        }
        Ok(VariantRecord {
            stop,
            contig,
            start: self.start,
            log10_p_error: self.log10_p_error,
            id: self.id,
            alleles: self.alleles,
            filters: self.filters,
            info: self.info,
            genotypes: self
                .genotypes
                .unwrap_or_else(|| Genotypes::Decoded(GenotypeMap::new())),
        })
    }
}
