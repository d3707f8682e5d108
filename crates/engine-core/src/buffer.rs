//! Refcounted byte slices and the read/write buffers built on top of them.
//!
//! An immutable, shareable slice and a buffer that is an ordered sequence of slices
//! with a running total length maps directly onto `bytes::Bytes` plus a `VecDeque`,
//! without needing a trait-object view over owned storage.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};

/// An immutable, cheaply-cloneable view over a contiguous byte range.
///
/// Cloning a `Slice` bumps a refcount rather than copying bytes: slices are views,
/// never copies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Slice(Bytes);

impl Slice {
    pub fn new(bytes: Bytes) -> Self {
        Slice(bytes)
    }

    pub fn from_static(bytes: &'static [u8]) -> Self {
        Slice(Bytes::from_static(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Splits off the first `at` bytes as a new slice sharing the same backing storage.
    pub fn split_to(&mut self, at: usize) -> Slice {
        Slice(self.0.split_to(at))
    }
}

impl From<Vec<u8>> for Slice {
    fn from(v: Vec<u8>) -> Self {
        Slice(Bytes::from(v))
    }
}

impl From<Bytes> for Slice {
    fn from(b: Bytes) -> Self {
        Slice(b)
    }
}

/// An ordered run of [`Slice`]s with a running total length, used for both read
/// accumulation and write batching.
#[derive(Clone, Debug, Default)]
pub struct SliceBuffer {
    slices: VecDeque<Slice>,
    total_len: usize,
}

impl SliceBuffer {
    pub fn new() -> Self {
        SliceBuffer::default()
    }

    pub fn len(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub fn push_back(&mut self, slice: Slice) {
        if slice.is_empty() {
            return;
        }
        self.total_len += slice.len();
        self.slices.push_back(slice);
    }

    /// Removes and returns up to `max_len` bytes from the front, splitting a slice if
    /// the boundary falls inside it.
    pub fn take_front(&mut self, max_len: usize) -> SliceBuffer {
        let mut out = SliceBuffer::new();
        let mut remaining = max_len.min(self.total_len);
        while remaining > 0 {
            let Some(mut front) = self.slices.pop_front() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                self.total_len -= front.len();
                out.push_back(front);
            } else {
                let tail = front.split_to(remaining);
                self.total_len -= remaining;
                out.push_back(tail);
                self.slices.push_front(front);
                remaining = 0;
            }
        }
        out
    }

    pub fn slices(&self) -> impl Iterator<Item = &Slice> {
        self.slices.iter()
    }

    /// Copies every slice into one contiguous buffer. Intended for tests and small
    /// payloads; callers on the hot path should iterate [`SliceBuffer::slices`] instead.
    pub fn to_contiguous(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len);
        for slice in &self.slices {
            out.extend_from_slice(slice.as_bytes());
        }
        out
    }

    /// Exposes the buffer as a `bytes::Buf` chain for vectored writes.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.slices.iter().map(|s| s.as_bytes())
    }

    pub fn remaining(&self) -> usize {
        self.total_len
    }
}

impl Extend<Slice> for SliceBuffer {
    fn extend<T: IntoIterator<Item = Slice>>(&mut self, iter: T) {
        for slice in iter {
            self.push_back(slice);
        }
    }
}

/// Adapts [`SliceBuffer`] to `bytes::Buf` so it can feed directly into `AsyncWriteExt`
/// helpers that accept a `Buf`, without materializing a contiguous copy.
pub struct SliceBufferCursor<'a> {
    buffer: &'a SliceBuffer,
    slice_index: usize,
    offset: usize,
}

impl<'a> SliceBufferCursor<'a> {
    pub fn new(buffer: &'a SliceBuffer) -> Self {
        SliceBufferCursor {
            buffer,
            slice_index: 0,
            offset: 0,
        }
    }
}

impl<'a> Buf for SliceBufferCursor<'a> {
    fn remaining(&self) -> usize {
        self.buffer
            .slices
            .iter()
            .skip(self.slice_index)
            .map(|s| s.len())
            .sum::<usize>()
            .saturating_sub(self.offset)
    }

    fn chunk(&self) -> &[u8] {
        match self.buffer.slices.get(self.slice_index) {
            Some(slice) => &slice.as_bytes()[self.offset..],
            None => &[],
        }
    }

    fn advance(&mut self, mut cnt: usize) {
        while cnt > 0 {
            let Some(slice) = self.buffer.slices.get(self.slice_index) else {
                break;
            };
            let avail = slice.len() - self.offset;
            if cnt < avail {
                self.offset += cnt;
                cnt = 0;
            } else {
                cnt -= avail;
                self.slice_index += 1;
                self.offset = 0;
            }
        }
    }
}
