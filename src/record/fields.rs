//! Per-FORMAT-field decoders and encoders for the columnar genotype block.
//!
//! Every field is written as one shared type descriptor followed by the
//! values of all samples, so each kind below handles a whole column.

use std::str::FromStr;

use itertools::Itertools;
use strum::{EnumString, IntoStaticStr};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::errors::{Error, Result};
use crate::header::PASS;
use crate::record::{Allele, Genotype, GenotypeAllele, GenotypeBuilder};
use crate::types::{TypeDescriptor, TypeKind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
pub(crate) enum FieldKind {
    #[strum(serialize = "GT")]
    Genotype,
    #[strum(serialize = "DP")]
    Depth,
    #[strum(serialize = "GQ")]
    GenotypeQuality,
    #[strum(serialize = "AD")]
    AlleleDepths,
    #[strum(serialize = "PL")]
    Likelihoods,
    #[strum(serialize = "FT")]
    GenotypeFilter,
    #[strum(disabled)]
    Generic,
}

/// Values of one field for every sample, before a shared type is picked.
enum Column {
    Ints(Vec<Vec<Option<i32>>>),
    Floats(Vec<Vec<Option<f32>>>),
    Strings(Vec<Option<String>>),
}

fn trim_missing<T>(mut values: Vec<Option<T>>) -> Vec<Option<T>> {
    while let Some(None) = values.last() {
        values.pop();
    }
    values
}

/// `Some` only if every value survived trailing-padding removal intact.
fn dense(values: &[Option<i32>]) -> Option<Vec<i32>> {
    values.iter().copied().collect()
}

fn decode_gt(offsets: Vec<Option<i32>>, alleles: &[Allele]) -> Result<(Vec<Allele>, bool)> {
    let mut phased = false;
    let mut called = Vec::with_capacity(offsets.len());
    for (i, offset) in offsets.into_iter().flatten().enumerate() {
        let gt = GenotypeAllele::from(offset);
        if i > 0 && gt.is_phased() {
            phased = true;
        }
        let allele = match gt.index() {
            None => Allele::no_call(),
            Some(idx) => alleles
                .get(idx as usize)
                .cloned()
                .ok_or(Error::AlleleOffset {
                    offset,
                    n_alleles: alleles.len(),
                })?,
        };
        called.push(allele);
    }
    Ok((called, phased))
}

fn encode_gt(genotype: &Genotype, alleles: &[Allele]) -> Result<Vec<Option<i32>>> {
    genotype
        .alleles()
        .iter()
        .enumerate()
        .map(|(i, allele)| {
            let phased = genotype.phased() && i > 0;
            if allele.is_no_call() {
                let missing = if phased {
                    GenotypeAllele::PhasedMissing
                } else {
                    GenotypeAllele::UnphasedMissing
                };
                return Ok(Some(missing.encode()));
            }
            let idx = alleles
                .iter()
                .position(|a| a == allele)
                .ok_or_else(|| Error::InvalidRecord {
                    message: format!(
                        "genotype allele {} of sample {} is not a site allele",
                        allele,
                        genotype.sample()
                    ),
                })? as i32;
            let gt = if phased {
                GenotypeAllele::Phased(idx)
            } else {
                GenotypeAllele::Unphased(idx)
            };
            Ok(Some(gt.encode()))
        })
        .collect()
}

fn genotype_filter_unsupported() -> Error {
    Error::NotImplemented {
        feature: "decoding of the per-sample genotype filter (FT) field",
    }
}

fn value_column(values: Vec<Option<&Value>>) -> Column {
    let has_strings = values.iter().flatten().any(|v| matches!(v, Value::String(_)));
    let has_floats = values
        .iter()
        .flatten()
        .any(|v| matches!(v, Value::Float(_) | Value::FloatArray(_)));
    if has_strings {
        Column::Strings(
            values
                .into_iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        Value::Integer(i) => i.to_string(),
                        Value::Float(f) => f.to_string(),
                        Value::Flag => "1".to_owned(),
                        Value::IntegerArray(a) => {
                            a.iter().map(|i| i.map_or(".".into(), |i| i.to_string())).join(",")
                        }
                        Value::FloatArray(a) => {
                            a.iter().map(|f| f.map_or(".".into(), |f| f.to_string())).join(",")
                        }
                    })
                })
                .collect(),
        )
    } else if has_floats {
        Column::Floats(
            values
                .into_iter()
                .map(|v| match v {
                    Some(v) => v
                        .floats()
                        .or_else(|| {
                            v.integers()
                                .map(|ints| ints.into_iter().map(|i| i.map(|i| i as f32)).collect())
                        })
                        .unwrap_or_default(),
                    None => vec![],
                })
                .collect(),
        )
    } else {
        Column::Ints(
            values
                .into_iter()
                .map(|v| match v {
                    Some(Value::Flag) => vec![Some(1)],
                    Some(v) => v.integers().unwrap_or_default(),
                    None => vec![],
                })
                .collect(),
        )
    }
}

impl Column {
    /// Shared descriptor, then each sample's values padded to the column width.
    fn encode(self, encoder: &mut Encoder) -> Result<()> {
        match self {
            Column::Ints(rows) => {
                let width = rows.iter().map(Vec::len).max().unwrap_or(0);
                let kind = TypeKind::for_integers(rows.iter().flatten().flatten().copied())?;
                encoder.encode_type_descriptor(width, kind)?;
                for row in rows {
                    let n = row.len();
                    for value in row {
                        encoder.encode_raw_value(value, kind)?;
                    }
                    encoder.encode_raw_missing_values(width - n, kind);
                }
            }
            Column::Floats(rows) => {
                let width = rows.iter().map(Vec::len).max().unwrap_or(0);
                encoder.encode_type_descriptor(width, TypeKind::Float32)?;
                for row in rows {
                    let n = row.len();
                    for value in row {
                        encoder.encode_raw_value(value, TypeKind::Float32)?;
                    }
                    encoder.encode_raw_missing_values(width - n, TypeKind::Float32);
                }
            }
            Column::Strings(rows) => {
                let width = rows
                    .iter()
                    .map(|s| s.as_ref().map_or(0, String::len))
                    .max()
                    .unwrap_or(0);
                encoder.encode_type_descriptor(width, TypeKind::Char)?;
                for row in rows {
                    encoder.encode_raw_string(row.as_deref().unwrap_or(""), width);
                }
            }
        }
        Ok(())
    }
}

impl FieldKind {
    pub(crate) fn for_key(key: &str) -> FieldKind {
        FieldKind::from_str(key).unwrap_or(FieldKind::Generic)
    }

    /// Whether `genotype` carries a value for this field.
    pub(crate) fn is_present(self, key: &str, genotype: &Genotype) -> bool {
        match self {
            FieldKind::Genotype => !genotype.alleles().is_empty(),
            FieldKind::Depth => genotype.depth().is_some(),
            FieldKind::GenotypeQuality => genotype.log10_p_error().is_some(),
            FieldKind::AlleleDepths => genotype.allele_depths().is_some(),
            FieldKind::Likelihoods => genotype.likelihoods().is_some(),
            FieldKind::GenotypeFilter => genotype.filters().is_some(),
            FieldKind::Generic => genotype.attribute(key).is_some(),
        }
    }

    /// Decodes this field's column into the per-sample builders.
    pub(crate) fn decode_column(
        self,
        key: &str,
        descriptor: TypeDescriptor,
        decoder: &mut Decoder,
        alleles: &[Allele],
        builders: &mut [GenotypeBuilder],
    ) -> Result<()> {
        if self == FieldKind::GenotypeFilter {
            return Err(genotype_filter_unsupported());
        }
        for builder in builders.iter_mut() {
            match self {
                FieldKind::Genotype => {
                    let (called, phased) = decode_gt(decoder.decode_raw_ints(descriptor)?, alleles)?;
                    builder.set_alleles(called, phased);
                }
                FieldKind::Depth => {
                    if let Some(dp) = decoder.decode_raw_ints(descriptor)?.into_iter().flatten().next() {
                        builder.set_depth(dp);
                    }
                }
                FieldKind::GenotypeQuality => {
                    if let Some(gq) = decoder.decode_raw_ints(descriptor)?.into_iter().flatten().next() {
                        builder.set_log10_p_error(gq as f64 / -10.0);
                    }
                }
                FieldKind::AlleleDepths | FieldKind::Likelihoods => {
                    let values = trim_missing(decoder.decode_raw_ints(descriptor)?);
                    if values.is_empty() {
                        continue;
                    }
                    match dense(&values) {
                        Some(v) if self == FieldKind::AlleleDepths => builder.set_allele_depths(v),
                        Some(v) => builder.set_likelihoods(v),
                        // interior missing values do not fit the fixed arrays
                        None => builder.set_attribute(key.to_owned(), Value::IntegerArray(values)),
                    }
                }
                FieldKind::Generic => {
                    if let Some(value) = decoder.decode_sample_value(descriptor)? {
                        builder.set_attribute(key.to_owned(), value);
                    }
                }
                FieldKind::GenotypeFilter => return Err(genotype_filter_unsupported()),
            }
        }
        Ok(())
    }

    /// Writes the shared descriptor and every sample's value for this field.
    pub(crate) fn encode_column(
        self,
        key: &str,
        genotypes: &[Option<&Genotype>],
        alleles: &[Allele],
        encoder: &mut Encoder,
    ) -> Result<()> {
        let ints = |f: &dyn Fn(&Genotype) -> Vec<Option<i32>>| {
            Column::Ints(genotypes.iter().map(|g| g.map(f).unwrap_or_default()).collect())
        };
        let column = match self {
            FieldKind::Genotype => Column::Ints(
                genotypes
                    .iter()
                    .map(|g| g.map_or(Ok(vec![]), |g| encode_gt(g, alleles)))
                    .collect::<Result<_>>()?,
            ),
            FieldKind::Depth => ints(&|g| g.depth().into_iter().map(Some).collect()),
            FieldKind::GenotypeQuality => ints(&|g| g.gq().into_iter().map(Some).collect()),
            FieldKind::AlleleDepths => ints(&|g| {
                g.allele_depths()
                    .iter()
                    .flatten()
                    .copied()
                    .map(Some)
                    .collect()
            }),
            FieldKind::Likelihoods => ints(&|g| {
                g.likelihoods()
                    .iter()
                    .flatten()
                    .copied()
                    .map(Some)
                    .collect()
            }),
            FieldKind::GenotypeFilter => Column::Strings(
                genotypes
                    .iter()
                    .map(|g| {
                        g.and_then(|g| g.filters().as_ref()).map(|f| {
                            if f.is_empty() {
                                PASS.to_owned()
                            } else {
                                f.iter().join(";")
                            }
                        })
                    })
                    .collect(),
            ),
            FieldKind::Generic => {
                value_column(genotypes.iter().map(|g| g.and_then(|g| g.attribute(key))).collect())
            }
        };
        column.encode(encoder)
    }
}
