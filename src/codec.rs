//! One variant record on the wire: two block sizes, the sites block and
//! the columnar genotype block.

use std::convert::TryFrom;
use std::io::Read;

use indexmap::IndexSet;
use itertools::Itertools;
use log::trace;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::errors::{Error, Result};
use crate::header::{HeaderRef, InfoType, PASS};
use crate::record::{
    Allele, FieldKind, Genotype, GenotypeMap, Genotypes, InfoMap, UndecodedGenotypes,
    VariantRecord, VariantRecordBuilder,
};
use crate::types::{TypeKind, Value};

pub const ALLELE_COUNT_SHIFT: u32 = 16;
pub const INFO_COUNT_MASK: u32 = 0xFFFF;
pub const FORMAT_COUNT_SHIFT: u32 = 24;
pub const SAMPLE_COUNT_MASK: u32 = 0x00FF_FFFF;

/// `(nAlleles << 16) | nInfo`
pub fn pack_allele_info_counts(n_alleles: usize, n_info: usize) -> Result<i32> {
    if n_alleles > (u32::MAX >> ALLELE_COUNT_SHIFT) as usize || n_info > INFO_COUNT_MASK as usize {
        return Err(Error::InvalidRecord {
            message: format!("{} alleles / {} INFO fields do not fit the packed counts", n_alleles, n_info),
        });
    }
    Ok(((n_alleles as u32) << ALLELE_COUNT_SHIFT | n_info as u32) as i32)
}

pub fn unpack_allele_info_counts(packed: i32) -> (usize, usize) {
    let packed = packed as u32;
    (
        (packed >> ALLELE_COUNT_SHIFT) as usize,
        (packed & INFO_COUNT_MASK) as usize,
    )
}

/// `(nFormat << 24) | nSamples`
pub fn pack_format_sample_counts(n_format: usize, n_samples: usize) -> Result<i32> {
    if n_format > (u32::MAX >> FORMAT_COUNT_SHIFT) as usize || n_samples > SAMPLE_COUNT_MASK as usize {
        return Err(Error::InvalidRecord {
            message: format!("{} FORMAT fields / {} samples do not fit the packed counts", n_format, n_samples),
        });
    }
    Ok(((n_format as u32) << FORMAT_COUNT_SHIFT | n_samples as u32) as i32)
}

pub fn unpack_format_sample_counts(packed: i32) -> (usize, usize) {
    let packed = packed as u32;
    (
        (packed >> FORMAT_COUNT_SHIFT) as usize,
        (packed & SAMPLE_COUNT_MASK) as usize,
    )
}

/// Normalizes the alleles of single-nucleotide sites after decoding.
pub trait AlleleClipper {
    fn clip(&self, alleles: Vec<Allele>) -> Vec<Allele>;
}

/// Leaves alleles as stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClipping;

impl AlleleClipper for NoClipping {
    fn clip(&self, alleles: Vec<Allele>) -> Vec<Allele> {
        alleles
    }
}

/// Fixed site fields plus the counts the genotype block is decoded with.
#[derive(Debug)]
pub struct SiteFields {
    pub builder: VariantRecordBuilder,
    pub alleles: Vec<Allele>,
    pub n_format: usize,
    pub n_samples: usize,
}

/// Encodes and decodes records against one header.
pub struct RecordCodec {
    header: HeaderRef,
    clipper: Box<dyn AlleleClipper + Send + Sync>,
}

impl std::fmt::Debug for RecordCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCodec").finish_non_exhaustive()
    }
}

fn decode_text(decoder: &mut Decoder, expected: &'static str) -> Result<Option<Vec<u8>>> {
    let descriptor = decoder.decode_type_descriptor()?;
    if descriptor.num_elements() == 0 {
        return Ok(None);
    }
    if descriptor.kind() != TypeKind::Char {
        return Err(Error::UnexpectedType {
            expected,
            found: descriptor.kind(),
        });
    }
    decoder.decode_raw_bytes(descriptor.num_elements()).map(Some)
}

fn to_i32(value: u64, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidRecord {
        message: format!("{} {} does not fit a 32 bit integer", what, value),
    })
}

impl RecordCodec {
    pub fn new(header: HeaderRef) -> Self {
        RecordCodec {
            header,
            clipper: Box::new(NoClipping),
        }
    }

    pub fn with_clipper(mut self, clipper: impl AlleleClipper + Send + Sync + 'static) -> Self {
        self.clipper = Box::new(clipper);
        self
    }

    pub fn header(&self) -> &HeaderRef {
        &self.header
    }

    /// Reads the next record from `stream`. `Ok(None)` on a clean end of stream.
    ///
    /// Once both block sizes are read the stream is always left at the next
    /// record boundary, even when the sites block fails to decode.
    pub fn read_record<R: Read + ?Sized>(
        &self,
        decoder: &mut Decoder,
        stream: &mut R,
        skip_genotypes: bool,
    ) -> Result<Option<VariantRecord>> {
        match decoder.read_next_block(8, stream) {
            Err(Error::TruncatedInput { available: 0, .. }) => return Ok(None),
            result => result?,
        }
        let sites_size = decoder.decode_int(TypeKind::Int32)?;
        let genotypes_size = decoder.decode_int(TypeKind::Int32)?;
        let (sites_size, genotypes_size) =
            match (usize::try_from(sites_size), usize::try_from(genotypes_size)) {
                (Ok(s), Ok(g)) => (s, g),
                _ => {
                    return Err(Error::InvalidRecord {
                        message: format!("negative block sizes {}/{}", sites_size, genotypes_size),
                    })
                }
            };
        trace!("record blocks: {} sites bytes, {} genotype bytes", sites_size, genotypes_size);

        decoder.read_next_block(sites_size, stream)?;
        let sites = match self.decode_sites(decoder) {
            Ok(sites) => sites,
            Err(e) => {
                decoder.skip_next_block(genotypes_size, stream)?;
                return Err(e);
            }
        };
        let genotypes = if skip_genotypes {
            decoder.skip_next_block(genotypes_size, stream)?;
            Genotypes::Decoded(GenotypeMap::new())
        } else {
            decoder.read_next_block(genotypes_size, stream)?;
            self.undecoded(decoder.take_block(), &sites)
        };
        sites.builder.genotypes(genotypes).build().map(Some)
    }

    /// Decodes a whole record from its two in-memory blocks.
    pub fn decode(&self, sites_block: Vec<u8>, genotype_block: Vec<u8>) -> Result<VariantRecord> {
        let sites = self.decode_sites(&mut Decoder::from_block(sites_block))?;
        let genotypes = self.undecoded(genotype_block, &sites);
        sites.builder.genotypes(genotypes).build()
    }

    fn undecoded(&self, bytes: Vec<u8>, sites: &SiteFields) -> Genotypes {
        Genotypes::Undecoded(UndecodedGenotypes::new(
            bytes,
            sites.n_format,
            sites.n_samples,
            sites.alleles.clone(),
            self.header.clone(),
        ))
    }

    /// Decodes the sites block currently held by `decoder`, which must be consumed exactly.
    pub fn decode_sites(&self, decoder: &mut Decoder) -> Result<SiteFields> {
        let contig = self
            .header
            .contigs()
            .resolve(decoder.decode_int(TypeKind::Int32)?)?
            .to_owned();
        let pos = decoder.decode_int(TypeKind::Int32)?;
        let ref_len = decoder.decode_int(TypeKind::Int32)?;
        if pos < 0 || ref_len < 1 {
            return Err(Error::InvalidRecord {
                message: format!("bad position {} or reference length {} on {}", pos, ref_len, contig),
            });
        }
        let start = pos as u64 + 1;
        self.decode_site_fields(decoder, contig.clone(), start, ref_len)
            .map_err(|e| e.at_site(format!("{}:{}", contig, start)))
    }

    /// Everything after CHROM/POS/rlen; errors are reported against that site.
    fn decode_site_fields(
        &self,
        decoder: &mut Decoder,
        contig: String,
        start: u64,
        ref_len: i32,
    ) -> Result<SiteFields> {
        let qual = decoder.decode_type_descriptor()?;
        let log10_p_error = if qual.num_elements() == 0 {
            None
        } else if qual.kind() != TypeKind::Float32 {
            return Err(Error::UnexpectedType {
                expected: "a FLOAT quality",
                found: qual.kind(),
            });
        } else if qual.num_elements() > 1 {
            return Err(Error::UnexpectedType {
                expected: "a single FLOAT quality",
                found: qual.kind(),
            });
        } else {
            decoder
                .decode_typed_value_with(qual)?
                .and_then(|v| v.float())
                .map(|q| q as f64 / -10.0)
        };

        let (n_alleles, n_info) = unpack_allele_info_counts(decoder.decode_int(TypeKind::Int32)?);
        let (n_format, n_samples) =
            unpack_format_sample_counts(decoder.decode_int(TypeKind::Int32)?);
        if n_alleles == 0 {
            return Err(Error::InvalidRecord {
                message: "record has no alleles".into(),
            });
        }

        let id = decode_text(decoder, "a CHAR ID")?
            .map(|id| String::from_utf8(id).map_err(|_| Error::InvalidUtf8 { context: "ID" }))
            .transpose()?;

        let mut alleles = Vec::with_capacity(n_alleles);
        for i in 0..n_alleles {
            let bases = decode_text(decoder, "a CHAR allele")?.ok_or_else(|| Error::InvalidRecord {
                message: format!("allele {} is empty", i),
            })?;
            alleles.push(Allele::new(bases, i == 0));
        }
        if alleles.iter().all(|a| a.len() == 1) {
            alleles = self.clipper.clip(alleles);
        }

        let filters = self.decode_filters(decoder)?;
        let info = self.decode_info(decoder, n_info)?;
        decoder.ensure_fully_decoded("sites")?;

        let builder = VariantRecord::builder()
            .contig(contig)
            .start(start)
            .stop(start + ref_len as u64 - 1)
            .log10_p_error(log10_p_error)
            .id(id)
            .alleles(alleles.clone())
            .filters(filters)
            .info_map(info);
        Ok(SiteFields {
            builder,
            alleles,
            n_format,
            n_samples,
        })
    }

    fn decode_filters(&self, decoder: &mut Decoder) -> Result<Option<IndexSet<String>>> {
        let descriptor = decoder.decode_type_descriptor()?;
        if descriptor.num_elements() == 0 {
            return Ok(None);
        }
        let dictionary = self.header.dictionary();
        let names = decoder
            .decode_raw_ints(descriptor)?
            .into_iter()
            .flatten()
            .map(|offset| dictionary.lookup(offset).map(str::to_owned))
            .collect::<Result<IndexSet<_>>>()?;
        if names.len() == 1 && names.contains(PASS) {
            Ok(Some(IndexSet::new()))
        } else {
            Ok(Some(names))
        }
    }

    fn decode_info(&self, decoder: &mut Decoder, n_info: usize) -> Result<InfoMap> {
        let dictionary = self.header.dictionary();
        let mut info = InfoMap::with_capacity(n_info);
        for _ in 0..n_info {
            let offset = decoder.decode_typed_int()?.ok_or_else(|| Error::InvalidRecord {
                message: "missing INFO key offset".into(),
            })?;
            let key = dictionary.lookup(offset)?;
            let value = decoder.decode_typed_value()?;
            if self.header.info_type(key) == Some(InfoType::Flag) {
                info.insert(key.to_owned(), Value::Flag);
            } else if let Some(value) = value {
                info.insert(key.to_owned(), value);
            }
        }
        Ok(info)
    }

    /// Encodes `record` including both leading block sizes.
    pub fn encode(&self, record: &VariantRecord) -> Result<Vec<u8>> {
        let (genotypes, n_format, n_samples) = self.encode_genotypes(record)?;
        let sites = self.encode_sites(record, n_format, n_samples)?;
        let mut encoder = Encoder::new();
        encoder.encode_raw_int(to_i32(sites.len() as u64, "sites block size")?, TypeKind::Int32);
        encoder.encode_raw_int(
            to_i32(genotypes.len() as u64, "genotype block size")?,
            TypeKind::Int32,
        );
        encoder.encode_raw_bytes(&sites);
        encoder.encode_raw_bytes(&genotypes);
        Ok(encoder.take_bytes())
    }

    pub fn encode_sites(&self, record: &VariantRecord, n_format: usize, n_samples: usize) -> Result<Vec<u8>> {
        let dictionary = self.header.dictionary();
        let mut encoder = Encoder::new();
        let contig = self.header.contigs().offset_of(record.contig())?;
        encoder.encode_raw_int(contig as i32, TypeKind::Int32);
        encoder.encode_raw_int(to_i32(record.start() - 1, "position")?, TypeKind::Int32);
        encoder.encode_raw_int(
            to_i32(record.stop() - record.start() + 1, "reference length")?,
            TypeKind::Int32,
        );
        match record.log10_p_error() {
            Some(e) => encoder.encode_typed_vector(&[Some((e * -10.0) as f32)], TypeKind::Float32)?,
            None => encoder.encode_typed_missing(TypeKind::Float32),
        }
        encoder.encode_raw_int(
            pack_allele_info_counts(record.alleles().len(), record.info().len())?,
            TypeKind::Int32,
        );
        encoder.encode_raw_int(pack_format_sample_counts(n_format, n_samples)?, TypeKind::Int32);

        encoder.encode_typed_string(record.id().unwrap_or(""))?;
        for allele in record.alleles() {
            encoder.encode_type_descriptor(allele.len(), TypeKind::Char)?;
            encoder.encode_raw_bytes(allele.bases());
        }

        match record.filters() {
            None => encoder.encode_typed_missing(TypeKind::Int8),
            Some(filters) if filters.is_empty() => {
                encoder.encode_typed_int(dictionary.offset_of(PASS)? as i32)?;
            }
            Some(filters) => {
                let offsets = filters
                    .iter()
                    .map(|f| dictionary.offset_of(f).map(|o| Some(o as i32)))
                    .collect::<Result<Vec<_>>>()?;
                encoder.encode_typed_ints(&offsets)?;
            }
        }

        for (key, value) in record.info() {
            encoder.encode_typed_int(dictionary.offset_of(key)? as i32)?;
            encoder.encode(Some(value)).map_err(|e| Error::InvalidRecord {
                message: format!("INFO field {}: {}", key, e),
            })?;
        }
        Ok(encoder.take_bytes())
    }

    /// Genotype block bytes with their FORMAT and sample counts.
    ///
    /// Still-undecoded genotypes are passed through unchanged.
    pub fn encode_genotypes(&self, record: &VariantRecord) -> Result<(Vec<u8>, usize, usize)> {
        let map = match record.raw_genotypes() {
            Genotypes::Undecoded(raw) => {
                return Ok((raw.bytes().to_vec(), raw.n_format(), raw.n_samples()))
            }
            Genotypes::Decoded(map) => map,
        };
        let samples = self.header.samples();
        if map.is_empty() {
            return Ok((vec![], 0, samples.len()));
        }
        if let Some(unknown) = map.keys().find(|s| self.header.sample_index(s).is_none()) {
            return Err(Error::InvalidRecord {
                message: format!("sample {} is not declared in the header", unknown),
            });
        }
        let per_sample = samples.iter().map(|s| map.get(s)).collect_vec();
        let keys = self.format_keys(map.values())?;

        let dictionary = self.header.dictionary();
        let mut encoder = Encoder::new();
        for key in &keys {
            encoder.encode_typed_int(dictionary.offset_of(key)? as i32)?;
            FieldKind::for_key(key)
                .encode_column(key, &per_sample, record.alleles(), &mut encoder)
                .map_err(|e| Error::Field {
                    key: key.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok((encoder.take_bytes(), keys.len(), samples.len()))
    }

    /// Keys used by any genotype, `GT` first, the rest in dictionary order.
    fn format_keys<'a>(&self, genotypes: impl Iterator<Item = &'a Genotype> + Clone) -> Result<Vec<String>> {
        let dictionary = self.header.dictionary();
        let mut keys: IndexSet<String> = ["GT", "DP", "GQ", "AD", "PL", "FT"]
            .iter()
            .filter(|key| {
                let kind = FieldKind::for_key(key);
                genotypes.clone().any(|g| kind.is_present(key, g))
            })
            .map(|key| key.to_string())
            .collect();
        for g in genotypes {
            keys.extend(g.attributes().keys().cloned());
        }
        let mut ordered = keys
            .into_iter()
            .map(|key| dictionary.offset_of(&key).map(|o| (key != "GT", o, key)))
            .collect::<Result<Vec<_>>>()?;
        ordered.sort();
        Ok(ordered.into_iter().map(|(_, _, key)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GenotypeBuilder;
    use crate::testing;

    fn codec() -> RecordCodec {
        RecordCodec::new(testing::header())
    }

    fn site() -> VariantRecordBuilder {
        VariantRecord::builder()
            .contig("chr2")
            .start(1000)
            .id(Some("rs42".into()))
            .allele_strings(&["A", "C"])
            .qual(30.0)
            .pass()
            .info("DP", Value::Integer(42))
            .info("DB", Value::Flag)
            .info("AF", Value::Float(0.5))
    }

    fn trio() -> Vec<Genotype> {
        let a = Allele::reference("A");
        let c = Allele::alternate("C");
        vec![
            GenotypeBuilder::new("NA12878")
                .alleles(vec![a.clone(), c.clone()])
                .gq(45)
                .depth(20)
                .allele_depths(vec![11, 9])
                .likelihoods(vec![300, 0, 450])
                .make(),
            GenotypeBuilder::new("NA12891")
                .alleles(vec![c.clone(), c.clone()])
                .phased(true)
                .depth(7)
                .attribute("HQ", Value::from(vec![30, 40]))
                .make(),
            GenotypeBuilder::new("NA12892")
                .alleles(vec![Allele::no_call(), Allele::no_call()])
                .make(),
        ]
    }

    fn split(bytes: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let sites = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        (bytes[8..8 + sites].to_vec(), bytes[8 + sites..].to_vec())
    }

    #[test]
    fn test_packed_counts() {
        let packed = pack_allele_info_counts(3, 5).unwrap();
        assert_eq!(packed, 0x0003_0005);
        assert_eq!(unpack_allele_info_counts(packed), (3, 5));
        let packed = pack_format_sample_counts(4, 2504).unwrap();
        assert_eq!(packed as u32, 0x0400_09C8);
        assert_eq!(unpack_format_sample_counts(packed), (4, 2504));
        assert_eq!(unpack_format_sample_counts(pack_format_sample_counts(255, 0xFF_FFFF).unwrap()), (255, 0xFF_FFFF));
        assert!(pack_allele_info_counts(1, 0x1_0000).is_err());
        assert!(pack_format_sample_counts(256, 1).is_err());
    }

    #[test]
    fn test_record_round_trip() {
        let codec = codec();
        let record = trio()
            .into_iter()
            .fold(site(), |b, g| b.genotype(g))
            .build()
            .unwrap();
        let bytes = codec.encode(&record).unwrap();
        let (sites, genotypes) = split(&bytes);
        let mut decoded = codec.decode(sites, genotypes).unwrap();

        assert_eq!(decoded.chrom(), "chr2");
        assert_eq!(decoded.pos(), 1000);
        assert_eq!(decoded.stop(), 1000);
        assert_eq!(decoded.id(), Some("rs42"));
        assert_eq!(decoded.alleles(), record.alleles());
        assert_eq!(decoded.qual(), Some(30.0));
        assert_eq!(decoded.filters(), Some(&IndexSet::new()));
        assert_eq!(decoded.info(), record.info());
        assert!(!decoded.genotypes_are_decoded());

        let genotypes = decoded.genotypes().unwrap();
        for expected in trio() {
            assert_eq!(&genotypes[expected.sample()], &expected);
        }
    }

    #[test]
    fn test_sites_layout() {
        let record = VariantRecord::builder()
            .contig("chr1")
            .start(10)
            .allele_strings(&["AT", "A"])
            .build()
            .unwrap();
        let sites = codec().encode_sites(&record, 0, 3).unwrap();
        assert_eq!(
            sites,
            vec![
                0, 0, 0, 0, // contig offset
                0, 0, 0, 9, // 0-based position
                0, 0, 0, 2, // reference length
                0x05, // missing qual
                0, 2, 0, 0, // 2 alleles, 0 INFO
                0, 0, 0, 3, // 0 FORMAT, 3 samples
                0x07, // no ID
                0x27, b'A', b'T', 0x17, b'A', // alleles
                0x01, // unfiltered
            ]
        );
    }

    #[test]
    fn test_filters() {
        let codec = codec();
        let decode_filters = |record: VariantRecord| {
            let sites = codec.encode_sites(&record, 0, 0).unwrap();
            let decoded = codec.decode(sites, vec![]).unwrap();
            decoded.filters().cloned()
        };
        let base = || {
            VariantRecord::builder()
                .contig("chr1")
                .start(1)
                .allele_strings(&["A"])
        };
        assert_eq!(decode_filters(base().build().unwrap()), None);
        assert_eq!(decode_filters(base().pass().build().unwrap()), Some(IndexSet::new()));
        let filtered = decode_filters(base().filter("q10").filter("LowQual").build().unwrap()).unwrap();
        assert_eq!(filtered.iter().collect_vec(), vec!["q10", "LowQual"]);
    }

    #[test]
    fn test_flag_info_is_coerced() {
        let codec = codec();
        let mut encoder = Encoder::new();
        encoder.encode_raw_int(0, TypeKind::Int32);
        encoder.encode_raw_int(0, TypeKind::Int32);
        encoder.encode_raw_int(1, TypeKind::Int32);
        encoder.encode_typed_missing(TypeKind::Float32);
        encoder.encode_raw_int(pack_allele_info_counts(1, 2).unwrap(), TypeKind::Int32);
        encoder.encode_raw_int(0, TypeKind::Int32);
        encoder.encode_typed_missing(TypeKind::Char);
        encoder.encode_typed_string("G").unwrap();
        encoder.encode_typed_missing(TypeKind::Int8);
        // DB written as 7, DP as null
        encoder.encode_typed_int(4).unwrap();
        encoder.encode_typed_int(7).unwrap();
        encoder.encode_typed_int(3).unwrap();
        encoder.encode_typed_missing(TypeKind::Int8);
        let record = codec.decode(encoder.take_bytes(), vec![]).unwrap();
        assert!(record.has_flag("DB"));
        assert_eq!(record.info_value("DP"), None);
        assert_eq!(record.info().len(), 1);
    }

    #[test]
    fn test_gt_offsets_index_alleles() {
        let codec = codec();
        let record = site().build().unwrap();
        let sites = codec.encode_sites(&record, 1, 3).unwrap();
        let mut encoder = Encoder::new();
        encoder.encode_typed_int(7).unwrap(); // GT
        encoder.encode_type_descriptor(2, TypeKind::Int8).unwrap();
        for gt in [[2, 2], [2, 4], [0, 0]] {
            for offset in gt {
                encoder.encode_raw_int(offset, TypeKind::Int8);
            }
        }
        let mut record = codec.decode(sites, encoder.take_bytes()).unwrap();
        let a = Allele::reference("A");
        let c = Allele::alternate("C");
        let genotypes = record.genotypes().unwrap();
        assert_eq!(genotypes["NA12878"].alleles(), &vec![a.clone(), a.clone()]);
        assert_eq!(genotypes["NA12891"].alleles(), &vec![a, c]);
        assert!(!genotypes["NA12892"].is_called());
    }

    #[test]
    fn test_corrupt_genotypes_only_fail_on_access() {
        let codec = codec();
        let record = site().build().unwrap();
        let sites = codec.encode_sites(&record, 1, 3).unwrap();
        // key offset 99 is not in the dictionary
        let mut record = codec.decode(sites, vec![0x11, 99, 0x11, 1, 1, 1]).unwrap();
        assert_eq!(record.chrom(), "chr2");
        assert_eq!(record.info_value("DP"), Some(&Value::Integer(42)));
        let err = record.genotypes().unwrap_err();
        assert!(matches!(err.root(), Error::DictionaryOffset { offset: 99, .. }));
        assert!(err.to_string().starts_with("at chr2:1000: "));
        assert!(!record.genotypes_are_decoded());
    }

    #[test]
    fn test_genotype_filter_decode_not_implemented() {
        let codec = codec();
        let g = GenotypeBuilder::new("NA12878")
            .alleles(vec![Allele::reference("A"), Allele::reference("A")])
            .filters(vec!["LowQual"])
            .make();
        let record = site().genotype(g).build().unwrap();
        let bytes = codec.encode(&record).unwrap();
        let (sites, genotypes) = split(&bytes);
        let mut decoded = codec.decode(sites, genotypes).unwrap();
        let err = decoded.genotypes().unwrap_err();
        assert!(matches!(err.root(), Error::NotImplemented { .. }));
        assert_eq!(
            err.to_string(),
            "at chr2:1000: FORMAT field FT: not implemented: \
             decoding of the per-sample genotype filter (FT) field"
        );
    }

    #[test]
    fn test_unknown_contig_and_trailing_bytes() {
        let codec = codec();
        let record = site().build().unwrap();
        let mut sites = codec.encode_sites(&record, 0, 0).unwrap();
        sites[3] = 5;
        let err = codec.decode(sites.clone(), vec![]).unwrap_err();
        assert!(matches!(err, Error::ContigOffset { offset: 5, size: 2 }));

        sites[3] = 1;
        sites.push(0);
        let err = codec.decode(sites, vec![]).unwrap_err();
        assert!(matches!(err.root(), Error::TrailingBytes { block: "sites", remaining: 1 }));
        assert_eq!(err.to_string(), "at chr2:1000: 1 undecoded bytes left in sites block");
    }

    #[test]
    fn test_qual_must_be_a_single_float() {
        let codec = codec();
        let mut encoder = Encoder::new();
        encoder.encode_raw_int(0, TypeKind::Int32);
        encoder.encode_raw_int(0, TypeKind::Int32);
        encoder.encode_raw_int(1, TypeKind::Int32);
        encoder
            .encode_typed_vector(&[Some(30.0f32), Some(40.0)], TypeKind::Float32)
            .unwrap();
        encoder.encode_raw_int(pack_allele_info_counts(1, 0).unwrap(), TypeKind::Int32);
        encoder.encode_raw_int(0, TypeKind::Int32);
        encoder.encode_typed_missing(TypeKind::Char);
        encoder.encode_typed_string("G").unwrap();
        encoder.encode_typed_missing(TypeKind::Int8);
        let err = codec.decode(encoder.take_bytes(), vec![]).unwrap_err();
        assert!(matches!(
            err.root(),
            Error::UnexpectedType {
                expected: "a single FLOAT quality",
                found: TypeKind::Float32
            }
        ));
        assert_eq!(
            err.to_string(),
            "at chr1:1: expected a single FLOAT quality but found Float32"
        );
    }

    #[test]
    fn test_read_record_stays_on_record_boundary() {
        let codec = codec();
        let good = codec.encode(&site().build().unwrap()).unwrap();
        let mut bad = good.clone();
        bad[11] = 9; // contig offset
        let stream_bytes = [bad, good].concat();
        let mut stream = &stream_bytes[..];
        let mut decoder = Decoder::new();
        assert!(codec.read_record(&mut decoder, &mut stream, false).is_err());
        let record = codec.read_record(&mut decoder, &mut stream, false).unwrap().unwrap();
        assert_eq!(record.pos(), 1000);
        assert!(codec.read_record(&mut decoder, &mut stream, false).unwrap().is_none());
    }

    #[test]
    fn test_read_record_skipping_genotypes() {
        let codec = codec();
        let record = trio().into_iter().fold(site(), |b, g| b.genotype(g)).build().unwrap();
        let bytes = codec.encode(&record).unwrap();
        let mut stream = &bytes[..];
        let mut decoder = Decoder::new();
        let mut decoded = codec.read_record(&mut decoder, &mut stream, true).unwrap().unwrap();
        assert!(stream.is_empty());
        assert!(decoded.genotypes_are_decoded());
        assert!(decoded.genotypes().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_record() {
        let codec = codec();
        let bytes = codec.encode(&site().build().unwrap()).unwrap();
        let mut stream = &bytes[..bytes.len() - 2];
        let err = codec
            .read_record(&mut Decoder::new(), &mut stream, false)
            .unwrap_err();
        assert!(err.is_truncated());
    }

    struct UpperCase;

    impl AlleleClipper for UpperCase {
        fn clip(&self, alleles: Vec<Allele>) -> Vec<Allele> {
            alleles
                .into_iter()
                .map(|a| Allele::new(a.bases().to_ascii_uppercase(), a.is_reference()))
                .collect()
        }
    }

    #[test]
    fn test_clipper_only_applies_to_single_base_sites() {
        let codec = codec().with_clipper(UpperCase);
        let snp = site().allele_strings(&["a", "c"]).build().unwrap();
        let sites = codec.encode_sites(&snp, 0, 0).unwrap();
        let decoded = codec.decode(sites, vec![]).unwrap();
        assert_eq!(decoded.ref_allele().bases(), b"A");

        let indel = site().allele_strings(&["ac", "a"]).build().unwrap();
        let sites = codec.encode_sites(&indel, 0, 0).unwrap();
        let decoded = codec.decode(sites, vec![]).unwrap();
        assert_eq!(decoded.ref_allele().bases(), b"ac");
    }
}
