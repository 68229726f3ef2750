use std::convert::TryFrom;

use num_enum::TryFromPrimitive;

use crate::errors::{Error, Result};

pub(crate) const MISSING_INT_8: u8 = 0x80;
pub(crate) const MISSING_INT_16: u16 = 0x8000;
pub(crate) const MISSING_INT_32: u32 = 0x8000_0000;
pub(crate) const MISSING_FLOAT: u32 = 0x7F80_0001;
pub(crate) const MISSING_CHAR: u8 = 0x00;

/// Inline counts above this spill into a separately typed integer.
pub const MAX_INLINE_ELEMENTS: usize = 14;
pub(crate) const OVERFLOW_ELEMENTS: u8 = 15;

pub type Text = Vec<u8>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum TypeKind {
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    // Reserved4 = 4,
    Float32 = 5,
    // Reserved6 = 6,
    Char = 7,
}

impl TypeKind {
    pub fn size_in_bytes(self) -> usize {
        match self {
            TypeKind::Int8 | TypeKind::Char => 1,
            TypeKind::Int16 => 2,
            TypeKind::Int32 | TypeKind::Float32 => 4,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, TypeKind::Int8 | TypeKind::Int16 | TypeKind::Int32)
    }

    /// The raw bit pattern reserved for "missing", right-aligned.
    pub fn missing_pattern(self) -> u32 {
        match self {
            TypeKind::Int8 => MISSING_INT_8 as u32,
            TypeKind::Int16 => MISSING_INT_16 as u32,
            TypeKind::Int32 => MISSING_INT_32,
            TypeKind::Float32 => MISSING_FLOAT,
            TypeKind::Char => MISSING_CHAR as u32,
        }
    }

    /// Inclusive value range of an integer type, with the missing pattern carved out.
    pub fn integer_range(self) -> Option<(i32, i32)> {
        match self {
            TypeKind::Int8 => Some((-(i8::MAX as i32), i8::MAX as i32)),
            TypeKind::Int16 => Some((-(i16::MAX as i32), i16::MAX as i32)),
            TypeKind::Int32 => Some((-i32::MAX, i32::MAX)),
            _ => None,
        }
    }

    /// `value` itself when this integer type can store it without hitting the
    /// missing pattern.
    pub fn check_integer(self, value: i32) -> Result<i32> {
        match self.integer_range() {
            Some((lo, hi)) if lo <= value && value <= hi => Ok(value),
            _ => Err(Error::IntegerOutOfRange {
                value: value as i64,
                kind: self,
            }),
        }
    }

    /// Smallest integer type that can hold `value`. `i32::MIN` is the 32-bit
    /// missing pattern and fits none.
    pub fn for_integer(value: i32) -> Result<TypeKind> {
        [TypeKind::Int8, TypeKind::Int16, TypeKind::Int32]
            .iter()
            .copied()
            .find(|kind| kind.check_integer(value).is_ok())
            .ok_or(Error::IntegerOutOfRange {
                value: value as i64,
                kind: TypeKind::Int32,
            })
    }

    /// Smallest integer type covering every value, i.e. the one fitting the
    /// largest magnitude. Missing entries do not widen the type.
    pub fn for_integers<I: IntoIterator<Item = i32>>(values: I) -> Result<TypeKind> {
        values
            .into_iter()
            .try_fold(TypeKind::Int8, |widest, v| -> Result<TypeKind> {
                Ok(widest.max(TypeKind::for_integer(v)?))
            })
    }
}

/// One decoded type descriptor: the element count (overflow already resolved)
/// and the primitive type of each element.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TypeDescriptor {
    pub(crate) kind: TypeKind,
    pub(crate) num_elements: usize,
}

impl TypeDescriptor {
    pub fn new(kind: TypeKind, num_elements: usize) -> Self {
        TypeDescriptor { kind, num_elements }
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Packs count (clamped to the overflow marker) and type id into one byte.
    ///
    /// ```
    /// use gatk_bcf2::types::{TypeDescriptor, TypeKind};
    /// assert_eq!(TypeDescriptor::encode(3, TypeKind::Int16), 0x32);
    /// assert_eq!(TypeDescriptor::encode(20, TypeKind::Char), 0xF7);
    /// ```
    pub fn encode(count: usize, kind: TypeKind) -> u8 {
        let count = if count > MAX_INLINE_ELEMENTS {
            OVERFLOW_ELEMENTS
        } else {
            count as u8
        };
        (count << 4) | kind as u8
    }

    /// Splits a descriptor byte into its inline count nibble and type.
    /// A count of 15 means the real count follows as a typed integer.
    pub fn decode(byte: u8) -> Result<(u8, TypeKind)> {
        let type_id = byte & 0b1111;
        let count = (byte >> 4) & 0b1111;
        let kind =
            TypeKind::try_from(type_id).map_err(|_| Error::UnknownTypeId { type_id, byte })?;
        Ok((count, kind))
    }

    pub fn is_overflow(count_nibble: u8) -> bool {
        count_nibble == OVERFLOW_ELEMENTS
    }
}

/// A decoded typed value. Absence (`null` on the wire) is modelled as `None`
/// around a `Value`, never as a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i32),
    Float(f32),
    String(String),
    /// Presence-only INFO flag.
    Flag,
    IntegerArray(Vec<Option<i32>>),
    FloatArray(Vec<Option<f32>>),
}

impl Value {
    pub fn integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn integers(&self) -> Option<Vec<Option<i32>>> {
        match self {
            Value::Integer(v) => Some(vec![Some(*v)]),
            Value::IntegerArray(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn floats(&self) -> Option<Vec<Option<f32>>> {
        match self {
            Value::Float(v) => Some(vec![Some(*v)]),
            Value::FloatArray(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Multi-valued strings travel as one comma separated CHAR vector.
    pub fn string_list(&self) -> Option<Vec<&str>> {
        self.string().map(|s| s.split(',').collect())
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, Value::Flag)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntegerArray(v.into_iter().map(Some).collect())
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::FloatArray(v.into_iter().map(Some).collect())
    }
}
