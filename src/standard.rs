//! Conventional modulo-indexed byte ring.
//!
//! Works on every platform; the occupied bytes may be split in two at the physical end of the storage.

use crate::error::{Error, Result};
use num::Zero;

#[derive(Debug, Clone)]
pub struct StandardRing {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl StandardRing {
    /// Creates a ring holding exactly `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity.is_zero() {
            return Err(Error::InvalidCapacity { requested: capacity, page_size: 1 });
        }
        Ok(Self { buf: vec![0; capacity].into_boxed_slice(), head: 0, len: 0 })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize { self.buf.len() }

    #[inline(always)]
    pub fn len(&self) -> usize {
        let len = self.len;
        debug_assert!(len <= self.capacity(), "len:{} > capacity:{}", len, self.capacity());
        len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool { self.len().is_zero() }

    #[inline(always)]
    pub fn is_full(&self) -> bool { self.len() == self.capacity() }

    #[inline(always)]
    pub fn free_len(&self) -> usize { self.capacity() - self.len() }

    #[inline(always)]
    pub fn head(&self) -> usize { self.head }

    #[inline(always)]
    pub fn tail(&self) -> usize { (self.head + self.len) % self.capacity() }

    /// Returns the occupied bytes as two segments; the second is empty unless the data wraps.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        let head = self.head();
        let first_len = self.len().min(self.capacity() - head);
        let (front, back) = (&self.buf[head..head + first_len], &self.buf[..self.len() - first_len]);
        (front, back)
    }

    /// Copies as many bytes of `data` as fit and returns how many were taken.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free_len());
        let tail = self.tail();
        let first = n.min(self.capacity() - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        self.buf[..n - first].copy_from_slice(&data[first..n]);
        self.len += n;
        n
    }

    /// Moves up to `out.len()` bytes out of the ring and returns how many were moved.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len());
        let (front, back) = self.as_slices();
        let first = n.min(front.len());
        out[..first].copy_from_slice(&front[..first]);
        out[first..n].copy_from_slice(&back[..n - first]);
        self.head = (self.head + n) % self.capacity();
        self.len -= n;
        n
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
