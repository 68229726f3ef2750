use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::codec::RecordCodec;
use crate::errors::{Error, Result};
use crate::header::HeaderRef;
use crate::parser::BCF_MAGIC;
use crate::reader::{BCF_MAJOR_VERSION, BCF_MINOR_VERSION};
use crate::record::VariantRecord;

/// Writes magic, header and records of a BCF2 stream.
#[derive(Debug)]
pub struct BcfWriter<W: Write> {
    codec: RecordCodec,
    written: usize,
    inner: W,
}

impl BcfWriter<BufWriter<File>> {
    pub fn to_path<P: AsRef<Path>>(path: P, header: HeaderRef) -> Result<Self> {
        Self::new(BufWriter::new(File::create(path)?), header)
    }
}

impl<W: Write> BcfWriter<W> {
    /// Writes the file preamble. The header text always carries a `##dictionary=` line.
    pub fn new(mut inner: W, header: HeaderRef) -> Result<Self> {
        let mut text = header.to_text().into_bytes();
        text.push(0);
        inner.write_all(BCF_MAGIC)?;
        inner.write_all(&[BCF_MAJOR_VERSION, BCF_MINOR_VERSION])?;
        inner.write_all(&(text.len() as u32).to_be_bytes())?;
        inner.write_all(&text)?;
        debug!("wrote BCF2 header of {} bytes", text.len());
        Ok(BcfWriter {
            codec: RecordCodec::new(header),
            written: 0,
            inner,
        })
    }

    pub fn write(&mut self, record: &VariantRecord) -> Result<()> {
        let bytes = self.codec.encode(record).map_err(|e| Error::Record {
            index: self.written,
            locus: Some(format!("{}:{}", record.contig(), record.start())),
            source: Box::new(e),
        })?;
        self.inner.write_all(&bytes)?;
        self.written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        debug!("wrote {} records", self.written);
        Ok(self.inner)
    }
}
