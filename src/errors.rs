use thiserror::Error;

use crate::types::TypeKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The low nibble of a type descriptor byte names no known primitive type.
    #[error("unknown BCF2 type id {type_id} in type descriptor byte {byte:#04x}")]
    UnknownTypeId { type_id: u8, byte: u8 },

    #[error("expected {expected} but found {found:?}")]
    UnexpectedType {
        expected: &'static str,
        found: TypeKind,
    },

    #[error("dictionary offset {offset} out of range (dictionary has {size} entries)")]
    DictionaryOffset { offset: i64, size: usize },

    #[error("contig offset {offset} out of range (header declares {size} contigs)")]
    ContigOffset { offset: i64, size: usize },

    #[error("GT allele offset {offset} does not index any of the {n_alleles} site alleles")]
    AlleleOffset { offset: i32, n_alleles: usize },

    /// The value would be written as, or past, the type's missing pattern.
    #[error("integer {value} cannot be written as {kind:?}")]
    IntegerOutOfRange { value: i64, kind: TypeKind },

    #[error("invalid record: {message}")]
    InvalidRecord { message: String },

    #[error("key {key:?} is not declared in the header dictionary")]
    UnknownKey { key: String },

    #[error("invalid UTF-8 in {context}")]
    InvalidUtf8 { context: &'static str },

    #[error("not a BCF2 stream: bad magic {found:?}")]
    BadMagic { found: Vec<u8> },

    #[error("unsupported BCF version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("{remaining} undecoded bytes left in {block} block")]
    TrailingBytes {
        block: &'static str,
        remaining: usize,
    },

    #[error("truncated input: expected {expected} bytes, only {available} available")]
    TruncatedInput { expected: usize, available: usize },

    #[error("malformed header: {message}")]
    MalformedHeader { message: String },

    #[error("not implemented: {feature}")]
    NotImplemented { feature: &'static str },

    #[error("internal consistency error: {message}")]
    InternalConsistency { message: String },

    #[error("error in record #{index}{}: {source}", .locus.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    Record {
        index: usize,
        locus: Option<String>,
        #[source]
        source: Box<Error>,
    },

    #[error("at {locus}: {source}")]
    Site {
        locus: String,
        #[source]
        source: Box<Error>,
    },

    #[error("FORMAT field {key}: {source}")]
    Field {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn malformed_header(message: impl Into<String>) -> Self {
        Error::MalformedHeader {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::InternalConsistency {
            message: message.into(),
        }
    }

    /// Attaches a `contig:pos` locus unless one is already present.
    pub fn at_site(self, locus: impl Into<String>) -> Self {
        match self {
            e @ Error::Site { .. } | e @ Error::Record { .. } => e,
            e => Error::Site {
                locus: locus.into(),
                source: Box::new(e),
            },
        }
    }

    /// Strips any `Record`, `Site` or `Field` context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Record { source, .. } | Error::Site { source, .. } | Error::Field { source, .. } => {
                source.root()
            }
            e => e,
        }
    }

    /// Corrupt or version-mismatched binary content.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self.root(),
            Error::UnknownTypeId { .. }
                | Error::UnexpectedType { .. }
                | Error::DictionaryOffset { .. }
                | Error::ContigOffset { .. }
                | Error::AlleleOffset { .. }
                | Error::InvalidRecord { .. }
                | Error::UnknownKey { .. }
                | Error::InvalidUtf8 { .. }
                | Error::BadMagic { .. }
                | Error::UnsupportedVersion { .. }
                | Error::TrailingBytes { .. }
        )
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.root(), Error::TruncatedInput { .. })
    }
}
