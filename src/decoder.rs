//! Stream-oriented reader for BCF2 typed values.
//!
//! Bytes are pulled from the underlying stream one block at a time; all
//! typed decoding then happens against the in-memory block.

use std::io::{self, Read};

use crate::errors::{Error, Result};
use crate::primitive::{decode_float, decode_int, decode_int_raw};
use crate::types::{TypeDescriptor, TypeKind, Value, MISSING_CHAR};

#[derive(Debug, Default)]
pub struct Decoder {
    block: Vec<u8>,
    cursor: usize,
}

/// Fills `buf` with exactly `size` bytes of `stream`.
///
/// The buffer grows with the bytes actually read, so a corrupt size on the
/// wire costs no more memory than the stream holds.
pub(crate) fn read_block<R: Read + ?Sized>(
    stream: &mut R,
    size: usize,
    buf: &mut Vec<u8>,
) -> Result<()> {
    buf.clear();
    (&mut *stream).take(size as u64).read_to_end(buf)?;
    if buf.len() < size {
        return Err(Error::TruncatedInput {
            expected: size,
            available: buf.len(),
        });
    }
    Ok(())
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_block(block: Vec<u8>) -> Self {
        Decoder { block, cursor: 0 }
    }

    /// Replaces the current block with exactly `size` bytes from `stream`.
    pub fn read_next_block<R: Read + ?Sized>(&mut self, size: usize, stream: &mut R) -> Result<()> {
        self.cursor = 0;
        read_block(stream, size, &mut self.block)
    }

    /// Advances `stream` by exactly `size` bytes without keeping them.
    pub fn skip_next_block<R: Read + ?Sized>(&mut self, size: usize, stream: &mut R) -> Result<()> {
        let skipped = io::copy(&mut (&mut *stream).take(size as u64), &mut io::sink())?;
        self.block.clear();
        self.cursor = 0;
        if (skipped as usize) < size {
            return Err(Error::TruncatedInput {
                expected: size,
                available: skipped as usize,
            });
        }
        Ok(())
    }

    pub fn set_block(&mut self, block: Vec<u8>) {
        self.block = block;
        self.cursor = 0;
    }

    /// Hands out the current block, leaving the decoder empty.
    pub fn take_block(&mut self) -> Vec<u8> {
        self.cursor = 0;
        std::mem::take(&mut self.block)
    }

    pub fn remaining(&self) -> usize {
        self.block.len() - self.cursor
    }

    pub fn block_is_fully_decoded(&self) -> bool {
        self.remaining() == 0
    }

    /// Fails with `TrailingBytes` unless the whole block was consumed.
    pub(crate) fn ensure_fully_decoded(&self, block: &'static str) -> Result<()> {
        if self.block_is_fully_decoded() {
            Ok(())
        } else {
            Err(Error::TrailingBytes {
                block,
                remaining: self.remaining(),
            })
        }
    }

    fn input(&self) -> &[u8] {
        &self.block[self.cursor..]
    }

    fn consume(&mut self, rest_len: usize) {
        self.cursor = self.block.len() - rest_len;
    }

    /// Untyped fixed-width integer read.
    pub fn decode_int(&mut self, kind: TypeKind) -> Result<i32> {
        let (rest, value) = decode_int_raw(self.input(), kind)?;
        let rest_len = rest.len();
        self.consume(rest_len);
        Ok(value)
    }

    fn decode_raw_byte(&mut self) -> Result<u8> {
        match self.input().first() {
            Some(&b) => {
                self.cursor += 1;
                Ok(b)
            }
            None => Err(Error::TruncatedInput {
                expected: 1,
                available: 0,
            }),
        }
    }

    /// Reads a descriptor byte, following the overflow escape to the real count.
    pub fn decode_type_descriptor(&mut self) -> Result<TypeDescriptor> {
        let (count, kind) = TypeDescriptor::decode(self.decode_raw_byte()?)?;
        let num_elements = if TypeDescriptor::is_overflow(count) {
            let (inner_count, size_kind) = TypeDescriptor::decode(self.decode_raw_byte()?)?;
            if !size_kind.is_integer() {
                return Err(Error::UnexpectedType {
                    expected: "an integer element count",
                    found: size_kind,
                });
            }
            if inner_count != 1 {
                return Err(Error::UnexpectedType {
                    expected: "a single element count",
                    found: size_kind,
                });
            }
            let n = self.decode_int(size_kind)?;
            if n < 0 {
                return Err(Error::InvalidRecord {
                    message: format!("negative element count {}", n),
                });
            }
            n as usize
        } else {
            count as usize
        };
        Ok(TypeDescriptor { kind, num_elements })
    }

    /// Decodes the next typed value.
    ///
    /// `None` means explicit absence (zero elements) or a single missing scalar.
    pub fn decode_typed_value(&mut self) -> Result<Option<Value>> {
        let descriptor = self.decode_type_descriptor()?;
        self.decode_typed_value_with(descriptor)
    }

    /// Decodes the payload of a value whose descriptor is already known.
    pub fn decode_typed_value_with(&mut self, descriptor: TypeDescriptor) -> Result<Option<Value>> {
        let TypeDescriptor { kind, num_elements } = descriptor;
        if num_elements == 0 {
            return Ok(None);
        }
        match kind {
            TypeKind::Char => {
                let bytes = self.decode_raw_bytes(num_elements)?;
                Ok(Some(Value::String(into_string(bytes)?)))
            }
            TypeKind::Float32 => {
                let mut values = self.decode_raw_floats(descriptor)?;
                if num_elements == 1 {
                    Ok(values.pop().flatten().map(Value::Float))
                } else {
                    Ok(Some(Value::FloatArray(values)))
                }
            }
            _ => {
                let mut values = self.decode_raw_ints(descriptor)?;
                if num_elements == 1 {
                    Ok(values.pop().flatten().map(Value::Integer))
                } else {
                    Ok(Some(Value::IntegerArray(values)))
                }
            }
        }
    }

    /// A typed single integer, e.g. a dictionary offset.
    pub fn decode_typed_int(&mut self) -> Result<Option<i32>> {
        let descriptor = self.decode_type_descriptor()?;
        if !descriptor.kind.is_integer() {
            return Err(Error::UnexpectedType {
                expected: "a typed integer",
                found: descriptor.kind,
            });
        }
        Ok(self.decode_raw_ints(descriptor)?.into_iter().next().flatten())
    }

    /// One per-sample value of a genotype field column. Padding (trailing
    /// missing values, trailing NULs) is stripped; nothing left means `None`.
    pub fn decode_sample_value(&mut self, descriptor: TypeDescriptor) -> Result<Option<Value>> {
        match descriptor.kind {
            TypeKind::Char => {
                let bytes = self.decode_raw_bytes(descriptor.num_elements)?;
                let s = into_string(trim_nul(bytes))?;
                Ok(if s.is_empty() {
                    None
                } else {
                    Some(Value::String(s))
                })
            }
            TypeKind::Float32 => {
                let values = trim_missing(self.decode_raw_floats(descriptor)?);
                Ok(match values.as_slice() {
                    [] => None,
                    [Some(v)] => Some(Value::Float(*v)),
                    _ => Some(Value::FloatArray(values)),
                })
            }
            _ => {
                let values = trim_missing(self.decode_raw_ints(descriptor)?);
                Ok(match values.as_slice() {
                    [] => None,
                    [Some(v)] => Some(Value::Integer(*v)),
                    _ => Some(Value::IntegerArray(values)),
                })
            }
        }
    }

    pub(crate) fn decode_raw_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let input = self.input();
        if input.len() < n {
            return Err(Error::TruncatedInput {
                expected: n,
                available: input.len(),
            });
        }
        let bytes = input[..n].to_vec();
        self.cursor += n;
        Ok(bytes)
    }

    pub(crate) fn decode_raw_ints(&mut self, descriptor: TypeDescriptor) -> Result<Vec<Option<i32>>> {
        let TypeDescriptor { kind, num_elements } = descriptor;
        if !kind.is_integer() {
            return Err(Error::UnexpectedType {
                expected: "an integer vector",
                found: kind,
            });
        }
        let mut values = Vec::with_capacity(num_elements.min(self.remaining() / kind.size_in_bytes()));
        let mut input = self.input();
        for _ in 0..num_elements {
            let (rest, value) = decode_int(input, kind)?;
            values.push(value);
            input = rest;
        }
        let rest_len = input.len();
        self.consume(rest_len);
        Ok(values)
    }

    pub(crate) fn decode_raw_floats(&mut self, descriptor: TypeDescriptor) -> Result<Vec<Option<f32>>> {
        let TypeDescriptor { kind, num_elements } = descriptor;
        if kind != TypeKind::Float32 {
            return Err(Error::UnexpectedType {
                expected: "a float vector",
                found: kind,
            });
        }
        let mut values = Vec::with_capacity(num_elements.min(self.remaining() / kind.size_in_bytes()));
        let mut input = self.input();
        for _ in 0..num_elements {
            let (rest, value) = decode_float(input)?;
            values.push(value);
            input = rest;
        }
        let rest_len = input.len();
        self.consume(rest_len);
        Ok(values)
    }
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 {
        context: "typed CHAR value",
    })
}

fn trim_nul(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.last() == Some(&MISSING_CHAR) {
        bytes.pop();
    }
    bytes
}

fn trim_missing<T>(mut values: Vec<Option<T>>) -> Vec<Option<T>> {
    while let Some(None) = values.last() {
        values.pop();
    }
    values
}
