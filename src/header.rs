use std::collections::HashMap;
use std::convert::TryFrom;
use std::str::FromStr;

use getset::Getters;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, warn};
use multimap::MultiMap;
use strum::EnumString;

use crate::errors::{Error, Result};
use crate::parser;

/// Literal filter-pass marker, always dictionary entry 0.
pub const PASS: &str = "PASS";
pub(crate) const DICTIONARY_KEY: &str = "dictionary";
const FIXED_COLUMNS: &[&str] = &["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

pub type Sample = String;

/// Shared, read-only handle on a parsed header.
#[cfg(not(feature = "sync"))]
pub type HeaderRef = std::rc::Rc<Header>;
#[cfg(feature = "sync")]
pub type HeaderRef = std::sync::Arc<Header>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumString)]
pub enum InfoType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum InfoNumber {
    Count(usize),
    Alleles,
    AlternateAlleles,
    Genotypes,
    Unknown,
}

#[derive(Debug, Clone)]
pub enum HeaderValue {
    String(String),
    Info(HeaderInfo),
    Filter(HeaderFilter),
    Format(HeaderFormat),
    Contig(HeaderContig),
}

impl HeaderValue {
    fn id(&self) -> Option<&str> {
        match self {
            HeaderValue::String(_) | HeaderValue::Contig(_) => None,
            HeaderValue::Info(i) => Some(i.id.as_str()),
            HeaderValue::Filter(f) => Some(f.id.as_str()),
            HeaderValue::Format(f) => Some(f.id.as_str()),
        }
    }
}

type Fields<'a> = HashMap<&'a str, String>;

fn required(h: &mut Fields, key: &str, line: &str) -> Result<String> {
    h.remove(key)
        .ok_or_else(|| Error::malformed_header(format!("{} line without {}", line, key)))
}

fn number_and_type(h: &mut Fields, line: &str) -> Result<(InfoNumber, InfoType)> {
    let number = required(h, "Number", line)?;
    let number = parser::info_number(&number)
        .map(|(_, n)| n)
        .map_err(|_| Error::malformed_header(format!("invalid Number={} in {} line", number, line)))?;
    let kind = required(h, "Type", line)?;
    let kind = InfoType::from_str(&kind)
        .map_err(|_| Error::malformed_header(format!("invalid Type={} in {} line", kind, line)))?;
    Ok((number, kind))
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderInfo {
    id: String,
    number: InfoNumber,
    kind: InfoType,
    description: String,
    additional: HashMap<String, String>,
}

impl<'a> TryFrom<Vec<(&'a str, String)>> for HeaderInfo {
    type Error = Error;

    fn try_from(data: Vec<(&'a str, String)>) -> Result<Self> {
        let mut h: Fields = data.into_iter().collect();
        let id = required(&mut h, "ID", "INFO")?;
        let (number, kind) = number_and_type(&mut h, "INFO")?;
        Ok(HeaderInfo {
            id,
            number,
            kind,
            description: h.remove("Description").unwrap_or_default(),
            additional: h.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderFormat {
    id: String,
    number: InfoNumber,
    kind: InfoType,
    description: String,
}

impl<'a> TryFrom<Vec<(&'a str, String)>> for HeaderFormat {
    type Error = Error;

    fn try_from(data: Vec<(&'a str, String)>) -> Result<Self> {
        let mut h: Fields = data.into_iter().collect();
        let id = required(&mut h, "ID", "FORMAT")?;
        let (number, kind) = number_and_type(&mut h, "FORMAT")?;
        Ok(HeaderFormat {
            id,
            number,
            kind,
            description: h.remove("Description").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderContig {
    id: String,
    length: Option<usize>,
    additional: HashMap<String, String>,
}

impl<'a> TryFrom<Vec<(&'a str, String)>> for HeaderContig {
    type Error = Error;

    fn try_from(data: Vec<(&'a str, String)>) -> Result<Self> {
        let mut h: Fields = data.into_iter().collect();
        Ok(HeaderContig {
            id: required(&mut h, "ID", "contig")?,
            length: h.remove("length").and_then(|s| s.parse().ok()),
            additional: h.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderFilter {
    id: String,
    description: String,
}

impl<'a> TryFrom<Vec<(&'a str, String)>> for HeaderFilter {
    type Error = Error;

    fn try_from(data: Vec<(&'a str, String)>) -> Result<Self> {
        let mut h: Fields = data.into_iter().collect();
        Ok(HeaderFilter {
            id: required(&mut h, "ID", "FILTER")?,
            description: h.remove("Description").unwrap_or_default(),
        })
    }
}

/// Offset ↔ string table for FILTER/INFO/FORMAT keys.
///
/// Offsets are dense and zero based; entry 0 is [`PASS`] unless an explicit
/// `##dictionary=` line says otherwise.
#[derive(Debug, Clone)]
pub struct Dictionary {
    entries: Vec<String>,
    offsets: HashMap<String, usize>,
}

impl Dictionary {
    pub fn new(entries: Vec<String>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::malformed_header("empty dictionary"));
        }
        let offsets = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.clone(), i))
            .collect();
        Ok(Dictionary { entries, offsets })
    }

    /// Builds the dictionary from the header's meta lines, in declaration order.
    pub fn from_header(lines: &[(String, HeaderValue)]) -> Result<Self> {
        if let Some((_, value)) = lines.iter().find(|(key, _)| key == DICTIONARY_KEY) {
            let entries = match value {
                HeaderValue::String(s) => s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect_vec(),
                _ => vec![],
            };
            return Dictionary::new(entries);
        }
        let ids = lines.iter().filter_map(|(_, value)| value.id()).collect_vec();
        if ids.is_empty() {
            return Err(Error::malformed_header(
                "no FILTER, INFO or FORMAT lines to build a dictionary from",
            ));
        }
        let entries = std::iter::once(PASS)
            .chain(ids)
            .unique()
            .map(str::to_owned)
            .collect_vec();
        Dictionary::new(entries)
    }

    pub fn lookup(&self, offset: i32) -> Result<&str> {
        usize::try_from(offset)
            .ok()
            .and_then(|o| self.entries.get(o))
            .map(String::as_str)
            .ok_or(Error::DictionaryOffset {
                offset: offset as i64,
                size: self.entries.len(),
            })
    }

    pub fn offset_of(&self, key: &str) -> Result<usize> {
        self.offsets.get(key).copied().ok_or_else(|| Error::UnknownKey {
            key: key.to_owned(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// Contig names in header order; records store an offset into this table.
#[derive(Debug, Clone, Default)]
pub struct ContigTable {
    contigs: Vec<HeaderContig>,
    offsets: HashMap<String, usize>,
}

impl ContigTable {
    pub fn new(contigs: Vec<HeaderContig>) -> Self {
        let offsets = contigs
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        ContigTable { contigs, offsets }
    }

    pub fn resolve(&self, offset: i32) -> Result<&str> {
        usize::try_from(offset)
            .ok()
            .and_then(|o| self.contigs.get(o))
            .map(|c| c.id.as_str())
            .ok_or(Error::ContigOffset {
                offset: offset as i64,
                size: self.contigs.len(),
            })
    }

    pub fn offset_of(&self, name: &str) -> Result<usize> {
        self.offsets.get(name).copied().ok_or_else(|| Error::UnknownKey {
            key: name.to_owned(),
        })
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderContig> {
        self.contigs.iter()
    }
}

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Header {
    meta: MultiMap<String, HeaderValue>,
    #[getset(skip)]
    raw_lines: Vec<String>,
    info: IndexMap<String, HeaderInfo>,
    format: IndexMap<String, HeaderFormat>,
    filters: IndexMap<String, HeaderFilter>,
    contigs: ContigTable,
    dictionary: Dictionary,
    samples: Vec<Sample>,
}

fn structured(line: &str, value: &str) -> Result<Vec<(String, String)>> {
    parser::keys_and_values(value)
        .map(|(_, kv)| kv.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
        .map_err(|_| Error::malformed_header(format!("cannot parse {}", line)))
}

fn borrowed(kv: &[(String, String)]) -> Vec<(&str, String)> {
    kv.iter().map(|(k, v)| (k.as_str(), v.clone())).collect()
}

impl Header {
    /// Parses header text: `##` meta lines followed by the `#CHROM` line.
    pub fn from_text(text: &str) -> Result<Header> {
        let mut lines: Vec<(String, HeaderValue)> = Vec::new();
        let mut raw_lines = Vec::new();
        let mut samples = None;
        for line in text.trim_end_matches('\0').lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if line.starts_with("##") {
                let (_, (key, value)) = parser::meta_line(line)
                    .map_err(|_| Error::malformed_header(format!("cannot parse {}", line)))?;
                let parsed = match key {
                    "INFO" => HeaderValue::Info(HeaderInfo::try_from(borrowed(&structured(
                        line, value,
                    )?))?),
                    "FORMAT" => HeaderValue::Format(HeaderFormat::try_from(borrowed(
                        &structured(line, value)?,
                    ))?),
                    "FILTER" => HeaderValue::Filter(HeaderFilter::try_from(borrowed(
                        &structured(line, value)?,
                    ))?),
                    "contig" => HeaderValue::Contig(HeaderContig::try_from(borrowed(
                        &structured(line, value)?,
                    ))?),
                    _ => HeaderValue::String(value.to_owned()),
                };
                if key != DICTIONARY_KEY {
                    raw_lines.push(line.to_owned());
                }
                lines.push((key.to_owned(), parsed));
            } else if line.starts_with("#CHROM") {
                samples = Some(
                    line.split('\t')
                        .skip(FIXED_COLUMNS.len() + 1)
                        .map(str::to_owned)
                        .collect_vec(),
                );
            } else {
                return Err(Error::malformed_header(format!(
                    "unexpected line in header: {}",
                    line
                )));
            }
        }
        if samples.is_none() {
            warn!("header has no #CHROM line, assuming no samples");
        }

        let dictionary = Dictionary::from_header(&lines)?;
        let mut info = IndexMap::new();
        let mut format = IndexMap::new();
        let mut filters = IndexMap::new();
        let mut contigs = Vec::new();
        let mut meta = MultiMap::new();
        for (key, value) in lines {
            match &value {
                HeaderValue::Info(i) => {
                    info.insert(i.id.clone(), i.clone());
                }
                HeaderValue::Format(f) => {
                    format.insert(f.id.clone(), f.clone());
                }
                HeaderValue::Filter(f) => {
                    filters.insert(f.id.clone(), f.clone());
                }
                HeaderValue::Contig(c) => contigs.push(c.clone()),
                HeaderValue::String(_) => {}
            }
            meta.insert(key, value);
        }
        let header = Header {
            meta,
            raw_lines,
            info,
            format,
            filters,
            contigs: ContigTable::new(contigs),
            dictionary,
            samples: samples.unwrap_or_default(),
        };
        debug!(
            "parsed header: {} dictionary entries, {} contigs, {} samples",
            header.dictionary.len(),
            header.contigs.len(),
            header.samples.len()
        );
        Ok(header)
    }

    /// Header text with an explicit `##dictionary=` line.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for line in &self.raw_lines {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(&format!(
            "##{}={}\n",
            DICTIONARY_KEY,
            self.dictionary.iter().join(",")
        ));
        text.push_str(&FIXED_COLUMNS.join("\t"));
        if !self.samples.is_empty() {
            text.push_str("\tFORMAT\t");
            text.push_str(&self.samples.join("\t"));
        }
        text.push('\n');
        text
    }

    pub fn info_type(&self, key: &str) -> Option<InfoType> {
        self.info.get(key).map(|i| i.kind)
    }

    pub fn sample_index(&self, sample: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "##fileformat=VCFv4.1
##FILTER=<ID=LowQual,Description=\"Low quality\">
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">
##contig=<ID=chr1,length=248956422>
##contig=<ID=chr2,length=242193529>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA12878\tNA12891
";

    #[test]
    fn test_header_from_text() {
        let header = Header::from_text(HEADER).unwrap();
        assert_eq!(header.samples(), &vec!["NA12878", "NA12891"]);
        assert_eq!(header.contigs().len(), 2);
        assert_eq!(header.contigs().resolve(1).unwrap(), "chr2");
        assert_eq!(header.info_type("DB"), Some(InfoType::Flag));
        assert_eq!(
            header.info().get("DP").map(|i| *i.number()),
            Some(InfoNumber::Count(1))
        );
        assert_eq!(header.meta().get_vec("contig").map(Vec::len), Some(2));
    }

    #[test]
    fn test_dictionary_declaration_order_without_duplicates() {
        let header = Header::from_text(HEADER).unwrap();
        let entries = header.dictionary().iter().collect_vec();
        assert_eq!(entries, vec!["PASS", "LowQual", "DP", "DB", "GT"]);
    }

    #[test]
    fn test_explicit_dictionary_line_wins() {
        let text = "##dictionary=PASS,GT,DP\n##INFO=<ID=DP,Number=1,Type=Integer,Description=\"x\">\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
        let header = Header::from_text(text).unwrap();
        assert_eq!(header.dictionary().offset_of("DP").unwrap(), 2);
    }

    #[test]
    fn test_dictionary_offsets() {
        let header = Header::from_text(HEADER).unwrap();
        let dictionary = header.dictionary();
        for o in 0..dictionary.len() as i32 {
            assert!(dictionary.lookup(o).is_ok());
        }
        let err = dictionary.lookup(dictionary.len() as i32).unwrap_err();
        assert!(err.is_format_error());
        assert!(dictionary.lookup(-1).is_err());
        assert!(matches!(
            dictionary.offset_of("AF").unwrap_err(),
            Error::UnknownKey { .. }
        ));
    }

    #[test]
    fn test_no_id_lines_is_malformed() {
        let text = "##fileformat=VCFv4.1\n##contig=<ID=chr1>\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
        assert!(matches!(
            Header::from_text(text).unwrap_err(),
            Error::MalformedHeader { .. }
        ));
        assert!(matches!(
            Dictionary::new(vec![]).unwrap_err(),
            Error::MalformedHeader { .. }
        ));
    }

    #[test]
    fn test_contig_offset_out_of_range() {
        let header = Header::from_text(HEADER).unwrap();
        assert!(matches!(
            header.contigs().resolve(2).unwrap_err(),
            Error::ContigOffset { offset: 2, size: 2 }
        ));
    }

    #[test]
    fn test_to_text_round_trip() {
        let header = Header::from_text(HEADER).unwrap();
        let text = header.to_text();
        assert!(text.contains("##dictionary=PASS,LowQual,DP,DB,GT\n"));
        let reparsed = Header::from_text(&text).unwrap();
        assert_eq!(reparsed.samples(), header.samples());
        assert_eq!(
            reparsed.dictionary().iter().collect_vec(),
            header.dictionary().iter().collect_vec()
        );
    }

    #[test]
    fn test_missing_type_is_malformed() {
        let text = "##INFO=<ID=DP,Number=1,Description=\"x\">\n";
        assert!(matches!(
            Header::from_text(text).unwrap_err(),
            Error::MalformedHeader { .. }
        ));
    }
}
