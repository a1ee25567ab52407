use std::{
    cmp::Ordering,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use derive_more::{Display, From, Into};

use crate::policy::MappingError;

/// An integral offset produced by dereferencing a cursor.
pub type Offset = isize;

/// A random-access cursor over integral offsets.
///
/// Dereferencing a cursor yields an offset value, not a memory address.
pub trait Cursor: Copy {
    /// Moves the cursor by `k` logical steps.
    fn advance(self, k: isize) -> Self;
    /// Returns the current offset.
    fn get(self) -> Offset;
    /// Number of steps needed to get from `self` to `end`.
    fn distance(self, end: Self) -> isize;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct NumericIndex(pub Offset);

impl NumericIndex {
    #[inline]
    pub const fn new(value: Offset) -> Self {
        Self(value)
    }

    /// Returns the offset `k` steps ahead without moving the cursor.
    #[inline]
    pub const fn at(self, k: isize) -> Offset {
        self.0 + k
    }
}

impl Cursor for NumericIndex {
    #[inline]
    fn advance(self, k: isize) -> Self {
        Self(self.0 + k)
    }

    #[inline]
    fn get(self) -> Offset {
        self.0
    }

    #[inline]
    fn distance(self, end: Self) -> isize {
        end.0 - self.0
    }
}

impl Add<isize> for NumericIndex {
    type Output = Self;

    #[inline]
    fn add(self, rhs: isize) -> Self::Output {
        self.advance(rhs)
    }
}

impl Sub<isize> for NumericIndex {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: isize) -> Self::Output {
        self.advance(-rhs)
    }
}

impl AddAssign<isize> for NumericIndex {
    #[inline]
    fn add_assign(&mut self, rhs: isize) {
        self.0 += rhs;
    }
}

impl SubAssign<isize> for NumericIndex {
    #[inline]
    fn sub_assign(&mut self, rhs: isize) {
        self.0 -= rhs;
    }
}

impl Sub for NumericIndex {
    type Output = isize;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        rhs.distance(self)
    }
}

/// A cursor that moves `stride` offsets per step.
///
/// Comparison treats the right-hand side as a loop bound: a cursor equals an end offset with the
/// same value, and also equals an off-stride end rounded up by its remainder, so that
/// `cursor != end` terminates loops over such ranges.
#[derive(Debug, Clone, Copy, Display)]
#[display("{value}/{stride}")]
pub struct StridedIndex {
    value: Offset,
    stride: isize,
}

impl Default for StridedIndex {
    #[inline]
    fn default() -> Self {
        Self {
            value: 0,
            stride: 1,
        }
    }
}

impl StridedIndex {
    /// Creates a strided cursor.
    ///
    /// # Panics
    /// Panics if `stride` is less than 1.
    #[inline]
    pub fn new(value: Offset, stride: isize) -> Self {
        match Self::try_new(value, stride) {
            Ok(index) => index,
            Err(err) => panic!("{err}"),
        }
    }

    #[inline]
    pub fn try_new(value: Offset, stride: isize) -> Result<Self, MappingError> {
        match stride {
            1.. => Ok(Self { value, stride }),
            _ => Err(MappingError::Stride(stride)),
        }
    }

    #[inline]
    pub const fn stride(self) -> isize {
        self.stride
    }

    /// Returns the offset `k` steps ahead without moving the cursor.
    #[inline]
    pub const fn at(self, k: isize) -> Offset {
        self.value + k * self.stride
    }
}

impl Cursor for StridedIndex {
    #[inline]
    fn advance(self, k: isize) -> Self {
        let value = self.value + k * self.stride;
        Self { value, ..self }
    }

    #[inline]
    fn get(self) -> Offset {
        self.value
    }

    /// Whole strides from `self` to `end`, counting a partial remainder as one more stride.
    /// A gap shorter than one stride counts as zero.
    #[inline]
    fn distance(self, end: Self) -> isize {
        let gap = end.value - self.value;
        if gap < self.stride {
            return 0;
        }
        match gap % self.stride {
            0 => gap / self.stride,
            _ => gap / self.stride + 1,
        }
    }
}

impl PartialEq for StridedIndex {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            || self.value == other.value + other.value.rem_euclid(self.stride)
    }
}

impl PartialOrd for StridedIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self == other {
            true => Some(Ordering::Equal),
            false => Some(self.value.cmp(&other.value)),
        }
    }
}

impl Add<isize> for StridedIndex {
    type Output = Self;

    #[inline]
    fn add(self, rhs: isize) -> Self::Output {
        self.advance(rhs)
    }
}

impl Sub<isize> for StridedIndex {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: isize) -> Self::Output {
        self.advance(-rhs)
    }
}

impl AddAssign<isize> for StridedIndex {
    #[inline]
    fn add_assign(&mut self, rhs: isize) {
        *self = self.advance(rhs);
    }
}

impl SubAssign<isize> for StridedIndex {
    #[inline]
    fn sub_assign(&mut self, rhs: isize) {
        *self = self.advance(-rhs);
    }
}

impl Sub for StridedIndex {
    type Output = isize;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        rhs.distance(self)
    }
}
