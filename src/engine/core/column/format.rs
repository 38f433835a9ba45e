use std::fmt;
use std::marker::PhantomData;

use crate::engine::core::column::compression::{ColumnCodec, CompressMode, codec_for};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    U8 = 0,
    U16 = 1,
    U32 = 2,
    U64 = 3,
}

impl ScalarType {
    pub const fn width(self) -> usize {
        match self {
            ScalarType::U8 => 1,
            ScalarType::U16 => 2,
            ScalarType::U32 => 4,
            ScalarType::U64 => 8,
        }
    }

    pub const fn max_value(self) -> u64 {
        match self {
            ScalarType::U8 => u8::MAX as u64,
            ScalarType::U16 => u16::MAX as u64,
            ScalarType::U32 => u32::MAX as u64,
            ScalarType::U64 => u64::MAX,
        }
    }
}

impl TryFrom<u8> for ScalarType {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(ScalarType::U8),
            1 => Ok(ScalarType::U16),
            2 => Ok(ScalarType::U32),
            3 => Ok(ScalarType::U64),
            other => Err(other),
        }
    }
}

impl From<ScalarType> for u8 {
    fn from(s: ScalarType) -> u8 {
        s as u8
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// Rust types that can live in a column. Values travel through the hot buffer
/// and the codecs as `u64` bit patterns.
pub trait ColumnValue: Copy + Default + fmt::Debug + Send + Sync + 'static + sealed::Sealed {
    const SCALAR: ScalarType;

    fn to_bits(self) -> u64;

    /// Callers guarantee `bits <= Self::SCALAR.max_value()`.
    fn from_bits(bits: u64) -> Self;
}

macro_rules! impl_column_value {
    ($t:ty, $scalar:expr) => {
        impl ColumnValue for $t {
            const SCALAR: ScalarType = $scalar;

            #[inline]
            fn to_bits(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                bits as $t
            }
        }
    };
}

impl_column_value!(u8, ScalarType::U8);
impl_column_value!(u16, ScalarType::U16);
impl_column_value!(u32, ScalarType::U32);
impl_column_value!(u64, ScalarType::U64);

/// Typed handle to one column of a [`RowSchema`](super::row_schema::RowSchema).
pub struct ColumnId<T: ColumnValue> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnValue> ColumnId<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index
    }
}

impl<T: ColumnValue> Clone for ColumnId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ColumnValue> Copy for ColumnId<T> {}

impl<T: ColumnValue> fmt::Debug for ColumnId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnId<{:?}>({})", T::SCALAR, self.index)
    }
}

impl<T: ColumnValue> PartialEq for ColumnId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T: ColumnValue> Eq for ColumnId<T> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub index: usize,
    pub scalar: ScalarType,
    /// Byte offset of this column inside one logical row.
    pub row_offset: usize,
}

impl ColumnDescriptor {
    #[inline]
    pub fn width(&self) -> usize {
        self.scalar.width()
    }

    #[inline]
    pub fn codec(&self, mode: CompressMode) -> &'static dyn ColumnCodec {
        codec_for(self.scalar, mode)
    }
}
