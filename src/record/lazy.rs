use std::fmt;

use itertools::Itertools;
use log::trace;

use crate::decoder::Decoder;
use crate::errors::{Error, Result};
use crate::header::HeaderRef;
use crate::record::{Allele, FieldKind, GenotypeBuilder, GenotypeMap};

/// The raw genotype block of one record, plus what is needed to decode it later.
#[derive(Clone)]
pub struct UndecodedGenotypes {
    bytes: Vec<u8>,
    n_format: usize,
    n_samples: usize,
    alleles: Vec<Allele>,
    header: HeaderRef,
}

impl fmt::Debug for UndecodedGenotypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndecodedGenotypes")
            .field("bytes", &self.bytes.len())
            .field("n_format", &self.n_format)
            .field("n_samples", &self.n_samples)
            .finish()
    }
}

impl UndecodedGenotypes {
    pub(crate) fn new(
        bytes: Vec<u8>,
        n_format: usize,
        n_samples: usize,
        alleles: Vec<Allele>,
        header: HeaderRef,
    ) -> Self {
        UndecodedGenotypes {
            bytes,
            n_format,
            n_samples,
            alleles,
            header,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn n_format(&self) -> usize {
        self.n_format
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Decodes all FORMAT columns into one genotype per header sample.
    pub fn decode(&self) -> Result<GenotypeMap> {
        if self.n_format == 0 && self.bytes.is_empty() {
            return Ok(GenotypeMap::new());
        }
        let samples = self.header.samples();
        if samples.len() != self.n_samples {
            return Err(Error::InvalidRecord {
                message: format!(
                    "genotype block has {} samples, header declares {}",
                    self.n_samples,
                    samples.len()
                ),
            });
        }
        let dictionary = self.header.dictionary();
        let mut builders = samples.iter().map(GenotypeBuilder::new).collect_vec();
        let mut decoder = Decoder::from_block(self.bytes.clone());
        for _ in 0..self.n_format {
            let offset = decoder.decode_typed_int()?.ok_or_else(|| Error::InvalidRecord {
                message: "missing FORMAT key offset".into(),
            })?;
            let key = dictionary.lookup(offset)?;
            decoder
                .decode_type_descriptor()
                .and_then(|descriptor| {
                    trace!("decoding FORMAT {} as {:?}", key, descriptor);
                    FieldKind::for_key(key).decode_column(
                        key,
                        descriptor,
                        &mut decoder,
                        &self.alleles,
                        &mut builders,
                    )
                })
                .map_err(|e| Error::Field {
                    key: key.to_owned(),
                    source: Box::new(e),
                })?;
        }
        decoder.ensure_fully_decoded("genotype")?;
        Ok(builders
            .into_iter()
            .map(GenotypeBuilder::make)
            .map(|g| (g.sample().clone(), g))
            .collect())
    }
}

/// Per-sample data of a record: raw bytes until first access, then a map.
#[derive(Debug, Clone)]
pub enum Genotypes {
    Undecoded(UndecodedGenotypes),
    Decoded(GenotypeMap),
}

impl Genotypes {
    /// Decodes in place on first call. A failed decode leaves the raw bytes untouched.
    pub fn decode(&mut self) -> Result<&GenotypeMap> {
        if let Genotypes::Undecoded(raw) = self {
            let map = raw.decode()?;
            *self = Genotypes::Decoded(map);
        }
        match self {
            Genotypes::Decoded(map) => Ok(map),
            Genotypes::Undecoded(_) => Err(Error::internal("genotypes still undecoded")),
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, Genotypes::Decoded(_))
    }
}
