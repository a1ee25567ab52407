use std::ops::Range;

use derive_more::Display;

use crate::{
    iter::{Cursor, NumericIndex, Offset, StridedIndex},
    policy::MappingError,
};

/// A sliceable range of logical indices; the extent of one dimension of an iteration space.
pub trait Segment: Sized {
    type Cursor: Cursor;

    fn begin(&self) -> Self::Cursor;

    fn end(&self) -> Self::Cursor;

    /// Returns the sub-segment of at most `size` elements starting `offset` elements in.
    /// The result is clamped to the extent of `self`, so it may be shorter or empty.
    fn slice(&self, offset: usize, size: usize) -> Self;

    /// Number of elements in the segment.
    #[inline]
    fn len(&self) -> usize {
        self.begin().distance(self.end()).max(0) as usize
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The offset of the `k`-th element.
    #[inline]
    fn at(&self, k: usize) -> Offset {
        self.begin().advance(k as isize).get()
    }

    #[inline]
    fn iter(&self) -> SegmentIter<Self::Cursor> {
        SegmentIter {
            cursor: self.begin(),
            remaining: self.len(),
        }
    }
}

/// Clamps `[offset, offset + size)` to `[0, len)`.
#[inline]
fn clamp(offset: usize, size: usize, len: usize) -> (usize, usize) {
    let lo = offset.min(len);
    let hi = offset.saturating_add(size).min(len);
    (lo, hi)
}

#[derive(Debug, Clone)]
pub struct SegmentIter<C> {
    cursor: C,
    remaining: usize,
}

impl<C: Cursor> Iterator for SegmentIter<C> {
    type Item = Offset;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.cursor.get();
        self.cursor = self.cursor.advance(1);
        self.remaining -= 1;
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<C: Cursor> ExactSizeIterator for SegmentIter<C> {}

/// The contiguous offsets `[begin, end)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("[{begin}, {end})")]
pub struct RangeSegment {
    begin: Offset,
    end: Offset,
}

impl RangeSegment {
    /// Creates a range segment. An `end` before `begin` gives an empty segment.
    #[inline]
    pub fn new(begin: Offset, end: Offset) -> Self {
        let end = end.max(begin);
        Self { begin, end }
    }
}

impl From<Range<Offset>> for RangeSegment {
    #[inline]
    fn from(value: Range<Offset>) -> Self {
        Self::new(value.start, value.end)
    }
}

impl Segment for RangeSegment {
    type Cursor = NumericIndex;

    #[inline]
    fn begin(&self) -> Self::Cursor {
        NumericIndex(self.begin)
    }

    #[inline]
    fn end(&self) -> Self::Cursor {
        NumericIndex(self.end)
    }

    #[inline]
    fn slice(&self, offset: usize, size: usize) -> Self {
        let (lo, hi) = clamp(offset, size, self.len());
        let begin = self.begin + lo as isize;
        let end = self.begin + hi as isize;
        Self { begin, end }
    }
}

/// The offsets `begin, begin + stride, ...` below `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("[{begin}, {end}) by {stride}")]
pub struct StridedSegment {
    begin: Offset,
    end: Offset,
    stride: isize,
}

impl StridedSegment {
    /// Creates a strided segment.
    ///
    /// # Panics
    /// Panics if `stride` is less than 1.
    #[inline]
    pub fn new(begin: Offset, end: Offset, stride: isize) -> Self {
        match Self::try_new(begin, end, stride) {
            Ok(segment) => segment,
            Err(err) => panic!("{err}"),
        }
    }

    #[inline]
    pub fn try_new(begin: Offset, end: Offset, stride: isize) -> Result<Self, MappingError> {
        let _ = StridedIndex::try_new(begin, stride)?;
        let end = end.max(begin);
        Ok(Self { begin, end, stride })
    }

    #[inline]
    pub const fn stride(&self) -> isize {
        self.stride
    }
}

impl Segment for StridedSegment {
    type Cursor = StridedIndex;

    #[inline]
    fn begin(&self) -> Self::Cursor {
        StridedIndex::new(self.begin, self.stride)
    }

    #[inline]
    fn end(&self) -> Self::Cursor {
        StridedIndex::new(self.end, self.stride)
    }

    #[inline]
    fn slice(&self, offset: usize, size: usize) -> Self {
        let (lo, hi) = clamp(offset, size, self.len());
        let begin = self.begin().at(lo as isize);
        let end = self.begin().at(hi as isize);
        Self { begin, end, ..*self }
    }
}
