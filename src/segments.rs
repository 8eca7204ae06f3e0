//! Segmented buffers: many addressable byte ranges inside one allocation
//!
//! A [`SegmentedBuffer`] pairs one contiguous backing region with a table of
//! `(offset, length)` segments. Tables supplied by callers are validated
//! once, at construction, and copied so later mutation of the caller's
//! memory cannot move a segment out of bounds. Buffers produced by this crate
//! (batch compression/decompression) skip the validation.
//!
//! A [`BufferCollection`] strings several segmented buffers together and
//! indexes across them without flattening.

use crate::error::{Result, SZStreamError};
use bytes::Bytes;
use std::sync::Arc;

/// Size in bytes of one serialized segment record
pub const SEGMENT_RECORD_SIZE: usize = 16;

/// One `(offset, length)` range into a backing buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Segment {
    pub offset: u64,
    pub length: u64,
}

impl Segment {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// One past the last byte, or `None` on overflow
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Parse a packed table of native-endian `(u64 offset, u64 length)` records
    pub fn parse_table(raw: &[u8]) -> Result<Vec<Segment>> {
        if raw.len() % SEGMENT_RECORD_SIZE != 0 {
            return Err(SZStreamError::misuse(format!(
                "segments array size is not a multiple of {}",
                SEGMENT_RECORD_SIZE
            )));
        }
        Ok(raw
            .chunks_exact(SEGMENT_RECORD_SIZE)
            .map(|record| {
                let mut offset = [0u8; 8];
                let mut length = [0u8; 8];
                offset.copy_from_slice(&record[..8]);
                length.copy_from_slice(&record[8..]);
                Segment {
                    offset: u64::from_ne_bytes(offset),
                    length: u64::from_ne_bytes(length),
                }
            })
            .collect())
    }

    /// Serialize segments into the packed record format
    pub fn encode_table(segments: &[Segment]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(segments.len() * SEGMENT_RECORD_SIZE);
        for segment in segments {
            raw.extend_from_slice(&segment.offset.to_ne_bytes());
            raw.extend_from_slice(&segment.length.to_ne_bytes());
        }
        raw
    }
}

/// Backing memory of a segmented buffer
#[derive(Debug, Clone)]
pub enum Backing<'a> {
    /// Reference-counted memory owned by the buffer and its views
    Owned(Bytes),
    /// Caller memory that must outlive the buffer and its views
    Borrowed(&'a [u8]),
}

impl<'a> Backing<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Owned(bytes) => &bytes[..],
            Backing::Borrowed(slice) => slice,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Backing::Owned(_))
    }

    /// Sub-range sharing the same memory; `start..end` must be in bounds
    fn slice(&self, start: usize, end: usize) -> Backing<'a> {
        match self {
            Backing::Owned(bytes) => Backing::Owned(bytes.slice(start..end)),
            Backing::Borrowed(slice) => {
                let slice: &'a [u8] = *slice;
                Backing::Borrowed(&slice[start..end])
            }
        }
    }
}

/// View of one segment; keeps the backing memory alive
#[derive(Debug, Clone)]
pub struct BufferSegment<'a> {
    data: Backing<'a>,
    offset: u64,
}

impl<'a> BufferSegment<'a> {
    /// Offset of this segment within its parent buffer
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Copy the segment into a new buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Shared handle to the segment's memory; copies only for borrowed backing
    pub fn to_shared(&self) -> Bytes {
        match &self.data {
            Backing::Owned(bytes) => bytes.clone(),
            Backing::Borrowed(slice) => Bytes::copy_from_slice(slice),
        }
    }
}

impl AsRef<[u8]> for BufferSegment<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// One allocation holding independently addressable segments
#[derive(Debug, Clone)]
pub struct SegmentedBuffer<'a> {
    backing: Backing<'a>,
    segments: Box<[Segment]>,
}

impl<'a> SegmentedBuffer<'a> {
    /// Borrow `data`, with segments given as a packed native-endian record table
    pub fn new(data: &'a [u8], raw_segments: &[u8]) -> Result<Self> {
        let segments = Segment::parse_table(raw_segments)?;
        Self::validated(Backing::Borrowed(data), segments)
    }

    /// Borrow `data` with an already decoded segment list
    pub fn from_slice(data: &'a [u8], segments: &[Segment]) -> Result<Self> {
        Self::validated(Backing::Borrowed(data), segments.to_vec())
    }

    /// Take ownership of `data`, validating `segments` against it
    pub fn from_owned(data: impl Into<Bytes>, segments: &[Segment]) -> Result<Self> {
        Self::validated(Backing::Owned(data.into()), segments.to_vec())
    }

    fn validated(backing: Backing<'a>, segments: Vec<Segment>) -> Result<Self> {
        let size = backing.len() as u64;
        for (index, segment) in segments.iter().enumerate() {
            match segment.end() {
                Some(end) if end <= size => {}
                _ => {
                    return Err(SZStreamError::BoundsViolation(format!(
                        "segment {} (offset {}, length {}) references memory outside {} byte buffer",
                        index, segment.offset, segment.length, size
                    )))
                }
            }
        }
        Ok(Self {
            backing,
            segments: segments.into_boxed_slice(),
        })
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Size of the backing buffer in bytes
    pub fn size(&self) -> usize {
        self.backing.len()
    }

    pub fn backing(&self) -> &Backing<'a> {
        &self.backing
    }

    /// The whole backing region, including bytes not covered by any segment
    pub fn as_slice(&self) -> &[u8] {
        self.backing.as_slice()
    }

    /// The segment table
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The segment table in its packed record format
    pub fn segments_raw(&self) -> Vec<u8> {
        Segment::encode_table(&self.segments)
    }

    /// View of segment `index`
    pub fn item_at(&self, index: usize) -> Result<BufferSegment<'a>> {
        let segment = self
            .segments
            .get(index)
            .ok_or(SZStreamError::IndexOutOfRange {
                index,
                len: self.segments.len(),
            })?;
        // Bounds were established at construction
        let start = segment.offset as usize;
        let end = start + segment.length as usize;
        Ok(BufferSegment {
            data: self.backing.slice(start, end),
            offset: segment.offset,
        })
    }

    /// Iterate over every segment in order
    pub fn iter(&self) -> impl Iterator<Item = BufferSegment<'a>> + '_ {
        (0..self.segments.len()).filter_map(move |i| self.item_at(i).ok())
    }

    /// Copy the entire backing region
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl SegmentedBuffer<'static> {
    /// Wrap memory produced by this crate; segments are known to be in bounds
    pub(crate) fn from_trusted(data: Bytes, segments: Vec<Segment>) -> Self {
        debug_assert!(segments
            .iter()
            .all(|s| s.end().map_or(false, |end| end <= data.len() as u64)));
        SegmentedBuffer {
            backing: Backing::Owned(data),
            segments: segments.into_boxed_slice(),
        }
    }
}

/// Ordered, logically concatenated sequence of segmented buffers
#[derive(Debug, Clone)]
pub struct BufferCollection<'a> {
    buffers: Vec<Arc<SegmentedBuffer<'a>>>,
    /// `first_elements[i]` = segment count of buffers `0..=i`
    first_elements: Vec<usize>,
}

impl<'a> BufferCollection<'a> {
    pub fn new<I>(buffers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<SegmentedBuffer<'a>>>,
    {
        let buffers: Vec<_> = buffers.into_iter().collect();
        if buffers.is_empty() {
            return Err(SZStreamError::misuse("must pass at least 1 buffer"));
        }

        let mut first_elements = Vec::with_capacity(buffers.len());
        let mut offset = 0usize;
        for buffer in &buffers {
            if buffer.is_empty() || buffer.size() == 0 {
                return Err(SZStreamError::misuse("segmented buffers cannot be empty"));
            }
            offset += buffer.len();
            first_elements.push(offset);
        }

        Ok(Self {
            buffers,
            first_elements,
        })
    }

    /// Total number of segments across all buffers
    pub fn len(&self) -> usize {
        self.first_elements.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all segment lengths
    pub fn size(&self) -> u64 {
        self.buffers
            .iter()
            .flat_map(|buffer| buffer.segments().iter())
            .map(|segment| segment.length)
            .sum()
    }

    pub fn buffers(&self) -> &[Arc<SegmentedBuffer<'a>>] {
        &self.buffers
    }

    /// View of segment `index`, counting across buffer boundaries
    pub fn item_at(&self, index: usize) -> Result<BufferSegment<'a>> {
        let len = self.len();
        if index >= len {
            return Err(SZStreamError::IndexOutOfRange { index, len });
        }

        let buffer_index = self.first_elements.partition_point(|&end| end <= index);
        let preceding = match buffer_index {
            0 => 0,
            i => self.first_elements[i - 1],
        };
        self.buffers[buffer_index].item_at(index - preceding)
    }

    /// Iterate over every segment of every buffer in order
    pub fn iter(&self) -> impl Iterator<Item = BufferSegment<'a>> + '_ {
        self.buffers.iter().flat_map(|buffer| buffer.iter())
    }
}
