//! Buffer writer mirroring [`Decoder`](crate::decoder::Decoder).
//!
//! Integer values are written with the narrowest type that covers the
//! largest magnitude in the vector, so anything written here decodes again
//! without special cases. Integers that would collide with a missing
//! pattern are rejected instead of written.

use std::convert::TryFrom;

use crate::errors::{Error, Result};
use crate::primitive::{encode_float, encode_int, encode_missing, encode_missing_n};
use crate::types::{TypeDescriptor, TypeKind, Value, MAX_INLINE_ELEMENTS, MISSING_CHAR};

/// A scalar that can be written raw as an element of a typed vector.
pub trait RawElement: Copy {
    fn encode_raw(self, kind: TypeKind, out: &mut Vec<u8>) -> Result<()>;
}

impl RawElement for i32 {
    fn encode_raw(self, kind: TypeKind, out: &mut Vec<u8>) -> Result<()> {
        if kind.is_integer() {
            kind.check_integer(self)?;
        }
        encode_int(self, kind, out);
        Ok(())
    }
}

impl RawElement for f32 {
    fn encode_raw(self, kind: TypeKind, out: &mut Vec<u8>) -> Result<()> {
        match kind {
            TypeKind::Float32 => {
                encode_float(self, out);
                Ok(())
            }
            _ => (self.round() as i32).encode_raw(kind, out),
        }
    }
}

#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Hands out the encoded bytes and resets the buffer.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Writes `value` with a type chosen from its shape. Returns the type used.
    pub fn encode(&mut self, value: Option<&Value>) -> Result<TypeKind> {
        match value {
            None => {
                self.encode_typed_missing(TypeKind::Int8);
                Ok(TypeKind::Int8)
            }
            Some(Value::Integer(v)) => self.encode_typed_ints(&[Some(*v)]),
            Some(Value::IntegerArray(values)) => self.encode_typed_ints(values),
            Some(Value::Float(v)) => {
                self.encode_typed_vector(&[Some(*v)], TypeKind::Float32)?;
                Ok(TypeKind::Float32)
            }
            Some(Value::FloatArray(values)) => {
                self.encode_typed_vector(values, TypeKind::Float32)?;
                Ok(TypeKind::Float32)
            }
            Some(Value::String(s)) => {
                self.encode_typed_string(s)?;
                Ok(TypeKind::Char)
            }
            // any non-reserved value marks a flag as present
            Some(Value::Flag) => self.encode_typed_ints(&[Some(1)]),
        }
    }

    /// Descriptor byte, plus the overflow count when `count` does not fit inline.
    pub fn encode_type_descriptor(&mut self, count: usize, kind: TypeKind) -> Result<()> {
        self.buffer.push(TypeDescriptor::encode(count, kind));
        if count > MAX_INLINE_ELEMENTS {
            let count = i32::try_from(count).map_err(|_| Error::IntegerOutOfRange {
                value: count as i64,
                kind: TypeKind::Int32,
            })?;
            self.encode_typed_int(count)?;
        }
        Ok(())
    }

    /// Zero-element descriptor, decoded as `null`.
    pub fn encode_typed_missing(&mut self, kind: TypeKind) {
        self.buffer.push(TypeDescriptor::encode(0, kind));
    }

    pub fn encode_typed_int(&mut self, value: i32) -> Result<TypeKind> {
        self.encode_typed_ints(&[Some(value)])
    }

    pub fn encode_typed_ints(&mut self, values: &[Option<i32>]) -> Result<TypeKind> {
        let kind = TypeKind::for_integers(values.iter().flatten().copied())?;
        self.encode_typed_vector(values, kind)?;
        Ok(kind)
    }

    pub fn encode_typed_vector<T: RawElement>(
        &mut self,
        values: &[Option<T>],
        kind: TypeKind,
    ) -> Result<()> {
        self.encode_type_descriptor(values.len(), kind)?;
        for value in values {
            self.encode_raw_value(*value, kind)?;
        }
        Ok(())
    }

    pub fn encode_typed_string(&mut self, s: &str) -> Result<()> {
        if s.is_empty() {
            self.encode_typed_missing(TypeKind::Char);
        } else {
            self.encode_type_descriptor(s.len(), TypeKind::Char)?;
            self.buffer.extend_from_slice(s.as_bytes());
        }
        Ok(())
    }

    /// Untyped fixed-width integer.
    pub fn encode_raw_int(&mut self, value: i32, kind: TypeKind) {
        encode_int(value, kind, &mut self.buffer);
    }

    pub fn encode_raw_value<T: RawElement>(&mut self, value: Option<T>, kind: TypeKind) -> Result<()> {
        match value {
            Some(v) => v.encode_raw(kind, &mut self.buffer)?,
            None => self.encode_raw_missing_value(kind),
        }
        Ok(())
    }

    pub fn encode_raw_missing_value(&mut self, kind: TypeKind) {
        encode_missing(kind, &mut self.buffer);
    }

    pub fn encode_raw_missing_values(&mut self, n: usize, kind: TypeKind) {
        encode_missing_n(n, kind, &mut self.buffer);
    }

    /// `s` right-padded with NULs to `width` bytes.
    pub fn encode_raw_string(&mut self, s: &str, width: usize) {
        let bytes = s.as_bytes();
        let n = bytes.len().min(width);
        self.buffer.extend_from_slice(&bytes[..n]);
        self.buffer
            .extend(std::iter::repeat(MISSING_CHAR).take(width - n));
    }

    pub fn encode_raw_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}
