//! Reading and writing of BCF2 variant files, plus allele-frequency
//! estimation over per-sample genotype likelihoods.
//!
//! Records come back from [`BcfRecords`] with their genotype block left
//! undecoded until first access.
pub mod af;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod header;
pub(crate) mod parser;
pub mod primitive;
pub mod reader;
pub mod record;
pub mod types;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::RecordCodec;
pub use errors::{Error, Result};
pub use header::{Header, HeaderRef};
pub use reader::{BcfRecords, ReaderOptions};
pub use record::{Allele, Genotype, VariantRecord};
pub use types::Value;
pub use writer::BcfWriter;
