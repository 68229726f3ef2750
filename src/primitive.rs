//! Fixed-width big-endian encoding of the BCF2 primitive types.
//!
//! Every primitive has a reserved bit pattern meaning "missing"; reads turn
//! that pattern into `None` and writes of `None` always emit it.

use nom::number::complete::{be_f32, be_i16, be_i32, be_i8, be_u32};
use nom::IResult;

use crate::errors::{Error, Result};
use crate::types::{TypeKind, MISSING_FLOAT, MISSING_INT_16, MISSING_INT_32, MISSING_INT_8};

fn truncated(expected: usize, input: &[u8]) -> Error {
    Error::TruncatedInput {
        expected,
        available: input.len(),
    }
}

/// Runs a complete-input nom parser, turning a short read into `TruncatedInput`.
pub(crate) fn run<'a, O>(
    expected: usize,
    input: &'a [u8],
    parser: impl FnOnce(&'a [u8]) -> IResult<&'a [u8], O>,
) -> Result<(&'a [u8], O)> {
    parser(input).map_err(|_| truncated(expected, input))
}

pub fn encode_int(value: i32, kind: TypeKind, out: &mut Vec<u8>) {
    match kind {
        TypeKind::Int8 | TypeKind::Char => out.push(value as u8),
        TypeKind::Int16 => out.extend_from_slice(&(value as i16).to_be_bytes()),
        TypeKind::Int32 => out.extend_from_slice(&value.to_be_bytes()),
        TypeKind::Float32 => encode_float(value as f32, out),
    }
}

/// Reads one integer of the given width, sign-extending 1 and 2 byte values.
/// The missing pattern is returned as its literal number.
pub fn decode_int_raw(input: &[u8], kind: TypeKind) -> Result<(&[u8], i32)> {
    let size = kind.size_in_bytes();
    match kind {
        TypeKind::Int8 => run(size, input, be_i8).map(|(i, v)| (i, v as i32)),
        TypeKind::Int16 => run(size, input, be_i16).map(|(i, v)| (i, v as i32)),
        TypeKind::Int32 => run(size, input, be_i32),
        found => Err(Error::UnexpectedType {
            expected: "an integer type",
            found,
        }),
    }
}

pub fn decode_int(input: &[u8], kind: TypeKind) -> Result<(&[u8], Option<i32>)> {
    let (input, value) = decode_int_raw(input, kind)?;
    let missing = match kind {
        TypeKind::Int8 => value as u8 == MISSING_INT_8,
        TypeKind::Int16 => value as u16 == MISSING_INT_16,
        _ => value as u32 == MISSING_INT_32,
    };
    Ok((input, if missing { None } else { Some(value) }))
}

pub fn encode_float(value: f32, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_bits().to_be_bytes());
}

pub fn decode_float(input: &[u8]) -> Result<(&[u8], Option<f32>)> {
    let (rest, bits) = run(4, input, be_u32)?;
    if bits == MISSING_FLOAT {
        Ok((rest, None))
    } else {
        let (_, value) = run(4, input, be_f32)?;
        Ok((rest, Some(value)))
    }
}

/// Writes the missing pattern of `kind`.
pub fn encode_missing(kind: TypeKind, out: &mut Vec<u8>) {
    let pattern = kind.missing_pattern();
    match kind.size_in_bytes() {
        1 => out.push(pattern as u8),
        2 => out.extend_from_slice(&(pattern as u16).to_be_bytes()),
        _ => out.extend_from_slice(&pattern.to_be_bytes()),
    }
}

pub fn encode_missing_n(n: usize, kind: TypeKind, out: &mut Vec<u8>) {
    for _ in 0..n {
        encode_missing(kind, out);
    }
}
