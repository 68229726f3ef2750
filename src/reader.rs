use std::io::{self, Read};
use std::mem::size_of;
use std::path::Path;

use log::{debug, warn};

use crate::codec::RecordCodec;
use crate::decoder::{read_block, Decoder};
use crate::errors::{Error, Result};
use crate::header::{Header, HeaderRef};
use crate::parser;
use crate::record::VariantRecord;

pub(crate) const BCF_MAJOR_VERSION: u8 = 2;
pub(crate) const BCF_MINOR_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Skip genotype blocks entirely; records come with an empty genotype map.
    pub skip_genotypes: bool,
}

impl ReaderOptions {
    pub fn sites_only() -> Self {
        ReaderOptions {
            skip_genotypes: true,
        }
    }
}

/// Iterates the records of a BCF2 stream.
///
/// A record that fails to decode is reported once and iteration continues
/// at the next record; I/O errors and truncation end the iteration.
pub struct BcfRecords<R: Read> {
    header: HeaderRef,
    codec: RecordCodec,
    decoder: Decoder,
    options: ReaderOptions,
    index: usize,
    done: bool,
    inner: R,
}

impl<R: Read> BcfRecords<R> {
    pub fn header(&self) -> &Header {
        self.header.as_ref()
    }

    pub fn header_ref(&self) -> HeaderRef {
        self.header.clone()
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }
}

impl BcfRecords<Box<dyn Read>> {
    /// Opens a plain or compressed BCF2 file.
    pub fn from_path<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let (reader, format) = niffler::from_path(path).map_err(|e| match e {
            niffler::Error::IOError(e) => Error::Io(e),
            other => Error::Io(io::Error::new(io::ErrorKind::Other, other.to_string())),
        })?;
        debug!("opened BCF2 stream with {:?} compression", format);
        Self::new(reader, options)
    }
}

fn read_exactly<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedInput {
            expected: buf.len(),
            available: 0,
        },
        _ => Error::Io(e),
    })
}

impl<R: Read> BcfRecords<R> {
    /// Reads magic, version and header from `reader`.
    pub fn new(mut reader: R, options: ReaderOptions) -> Result<Self> {
        let mut input = [0u8; 5];
        read_exactly(&mut reader, &mut input)?;
        let (_, version) = parser::bcf_version(&input).map_err(|_| Error::BadMagic {
            found: input.to_vec(),
        })?;
        if version.major != BCF_MAJOR_VERSION {
            return Err(Error::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
            });
        }
        if version.minor != BCF_MINOR_VERSION {
            warn!(
                "BCF minor version {} differs from {}, decoding anyway",
                version.minor, BCF_MINOR_VERSION
            );
        }

        let mut input = [0u8; size_of::<u32>()];
        read_exactly(&mut reader, &mut input)?;
        let (_, header_length) = parser::header_length(&input).map_err(|_| Error::TruncatedInput {
            expected: size_of::<u32>(),
            available: input.len(),
        })?;

        let mut input = Vec::new();
        read_block(&mut reader, header_length as usize, &mut input)?;
        let text = std::str::from_utf8(&input).map_err(|_| Error::InvalidUtf8 { context: "header" })?;
        let header = HeaderRef::new(Header::from_text(text)?);

        Ok(Self {
            codec: RecordCodec::new(header.clone()),
            header,
            decoder: Decoder::new(),
            options,
            index: 0,
            done: false,
            inner: reader,
        })
    }
}

impl<R: Read> Iterator for BcfRecords<R> {
    type Item = Result<VariantRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.codec.read_record(
            &mut self.decoder,
            &mut self.inner,
            self.options.skip_genotypes,
        );
        match result {
            Ok(Some(record)) => {
                self.index += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                // the stream position is unknown after these
                if e.is_truncated() || matches!(e, Error::Io(_)) {
                    self.done = true;
                }
                let index = self.index;
                self.index += 1;
                let (locus, source) = match e {
                    Error::Site { locus, source } => (Some(locus), source),
                    e => (None, Box::new(e)),
                };
                Some(Err(Error::Record {
                    index,
                    locus,
                    source,
                }))
            }
        }
    }
}
