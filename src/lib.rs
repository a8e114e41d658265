//! Byte ring buffers for streaming data from a producer to a consumer.
//!
//! [`MirroredRing`] maps its storage twice, back to back, in virtual memory. A read or write that runs past the
//! physical end of the storage continues at its start through the second mapping, so every operation is a single
//! flat copy and [`MirroredRing::peek`] always returns one contiguous slice.
//!
//! [`StandardRing`] is the portable modulo-indexed alternative.
//!
//! ```
//! use mirror_ring::MirroredRing;
//!
//! let mut ring = MirroredRing::new(4096)?;
//! assert_eq!(ring.write(b"hello ")?, 6);
//! assert_eq!(ring.write(b"world")?, 5);
//! assert_eq!(ring.peek()?, b"hello world");
//!
//! let mut out = [0; 6];
//! assert_eq!(ring.read(&mut out)?, 6);
//! assert_eq!(&out, b"hello ");
//! # Ok::<(), mirror_ring::Error>(())
//! ```

mod config;
mod error;
mod mirrored;
mod standard;

#[cfg(all(feature = "bytes", any(unix, windows)))]
mod bytes;
#[cfg(feature = "io")]
mod io;
#[cfg(feature = "serde")]
mod serde;
#[cfg(all(feature = "tokio-io", any(unix, windows)))]
mod tokio;

pub use config::{CapacityPolicy, RingConfig};
pub use error::{Error, Half, Result};
pub use mirrored::{MAX_CAPACITY, MAX_VIRTUAL_SIZE};
pub use standard::StandardRing;

#[cfg(any(unix, windows))]
use mirrored::MirroredRegion;
#[cfg(any(unix, windows))]
use num::Zero;

/// The operations shared by both ring designs.
///
/// Counts are partial: `write` takes what fits and `read` returns what is there.
pub trait ByteRing {
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    fn read(&mut self, out: &mut [u8]) -> Result<usize>;

    fn len(&self) -> Result<usize>;

    fn capacity(&self) -> Result<usize>;

    fn reset(&mut self) -> Result<()>;

    #[inline]
    fn is_empty(&self) -> Result<bool> { Ok(self.len()? == 0) }

    #[inline]
    fn is_full(&self) -> Result<bool> { Ok(self.len()? == self.capacity()?) }

    #[inline]
    fn free_len(&self) -> Result<usize> { Ok(self.capacity()? - self.len()?) }
}

/// A byte ring whose storage is mirrored in virtual memory.
///
/// The ring is either active or closed. [`close`](Self::close) releases the mapping; afterwards every operation
/// except `close` and [`is_closed`](Self::is_closed) returns [`Error::Closed`]. Dropping an active ring releases the
/// mapping as well.
#[cfg(any(unix, windows))]
#[derive(Debug)]
pub struct MirroredRing {
    region: Option<MirroredRegion>,
    capacity: usize,
    head: usize,
    len: usize,
}

#[cfg(any(unix, windows))]
impl MirroredRing {
    /// Creates a ring of at least `capacity` bytes, rounded up to the platform page size.
    pub fn new(capacity: usize) -> Result<Self> { Self::with_config(RingConfig::new(capacity)) }

    pub fn with_config(config: RingConfig) -> Result<Self> {
        let capacity = config.resolve()?;
        let region = MirroredRegion::allocate(capacity)?;
        log::debug!("created mirrored ring of {capacity} bytes (requested {})", config.capacity);
        Ok(Self { region: Some(region), capacity, head: 0, len: 0 })
    }

    #[inline(always)]
    fn region(&self) -> Result<&MirroredRegion> { self.region.as_ref().ok_or(Error::Closed) }

    #[inline(always)]
    fn region_mut(&mut self) -> Result<&mut MirroredRegion> { self.region.as_mut().ok_or(Error::Closed) }

    /// Advances a cursor inside `[0, capacity)` by at most `capacity` bytes.
    #[inline(always)]
    fn wrap(&self, cursor: usize) -> usize {
        debug_assert!(cursor < 2 * self.capacity);
        if cursor >= self.capacity { cursor - self.capacity } else { cursor }
    }

    #[inline(always)]
    pub fn is_closed(&self) -> bool { self.region.is_none() }

    #[inline(always)]
    pub fn capacity(&self) -> Result<usize> {
        self.region()?;
        Ok(self.capacity)
    }

    /// Number of bytes written but not yet read.
    #[inline(always)]
    pub fn len(&self) -> Result<usize> {
        self.region()?;
        let len = self.len;
        debug_assert!(len <= self.capacity, "len:{} > capacity:{}", len, self.capacity);
        Ok(len)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> Result<bool> { Ok(self.len()?.is_zero()) }

    #[inline(always)]
    pub fn is_full(&self) -> Result<bool> { Ok(self.len()? == self.capacity) }

    /// Number of bytes that can be written before the ring is full.
    #[inline(always)]
    pub fn free_len(&self) -> Result<usize> { Ok(self.capacity - self.len()?) }

    /// Read cursor, always in `0..capacity`.
    #[inline(always)]
    pub fn head(&self) -> Result<usize> {
        self.region()?;
        debug_assert!(self.head < self.capacity);
        Ok(self.head)
    }

    /// Write cursor, always in `0..capacity`.
    #[inline(always)]
    pub fn tail(&self) -> Result<usize> { Ok(self.wrap(self.head()? + self.len)) }

    /// Returns every unread byte as one slice without consuming it.
    #[inline(always)]
    pub fn peek(&self) -> Result<&[u8]> {
        let region = self.region()?;
        Ok(region.slice_at(self.head, self.len))
    }

    /// Returns the free space after the write cursor as one slice.
    ///
    /// Bytes placed there become readable after [`commit`](Self::commit).
    #[inline(always)]
    pub fn spare_mut(&mut self) -> Result<&mut [u8]> {
        let tail = self.tail()?;
        let free = self.capacity - self.len;
        Ok(self.region_mut()?.slice_mut_at(tail, free))
    }

    /// Makes the first `n` bytes of [`spare_mut`](Self::spare_mut) readable.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the free space.
    #[inline(always)]
    pub fn commit(&mut self, n: usize) -> Result<()> {
        let free = self.free_len()?;
        assert!(n <= free, "cannot commit {n} bytes with only {free} free");
        self.len += n;
        Ok(())
    }

    /// Discards the first `n` unread bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the number of unread bytes.
    #[inline(always)]
    pub fn consume(&mut self, n: usize) -> Result<()> {
        let len = self.len()?;
        assert!(n <= len, "cannot consume {n} bytes with only {len} readable");
        self.head = self.wrap(self.head + n);
        self.len -= n;
        Ok(())
    }

    /// Copies as much of `data` as fits and returns how many bytes were taken.
    ///
    /// A full ring takes nothing and returns `Ok(0)`.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let spare = self.spare_mut()?;
        let n = spare.len().min(data.len());
        if n.is_zero() {
            return Ok(0);
        }
        spare[..n].copy_from_slice(&data[..n]);
        self.commit(n)?;
        Ok(n)
    }

    /// Moves up to `out.len()` bytes out of the ring and returns how many were moved.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let available = self.peek()?;
        let n = available.len().min(out.len());
        if n.is_zero() {
            return Ok(0);
        }
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n)?;
        Ok(n)
    }

    /// Forgets all unread bytes. The mapping is kept.
    pub fn reset(&mut self) -> Result<()> {
        self.region()?;
        self.head = 0;
        self.len = 0;
        Ok(())
    }

    /// Releases the mapping. Closing a closed ring does nothing.
    ///
    /// The ring is closed afterwards even if the release reports an error.
    pub fn close(&mut self) -> Result<()> {
        let Some(region) = self.region.take() else {
            return Ok(());
        };
        self.head = 0;
        self.len = 0;
        log::debug!("closing mirrored ring of {} bytes", self.capacity);
        region.release()
    }
}

#[cfg(any(unix, windows))]
impl ByteRing for MirroredRing {
    #[inline]
    fn write(&mut self, data: &[u8]) -> Result<usize> { MirroredRing::write(self, data) }

    #[inline]
    fn read(&mut self, out: &mut [u8]) -> Result<usize> { MirroredRing::read(self, out) }

    #[inline]
    fn len(&self) -> Result<usize> { MirroredRing::len(self) }

    #[inline]
    fn capacity(&self) -> Result<usize> { MirroredRing::capacity(self) }

    #[inline]
    fn reset(&mut self) -> Result<()> { MirroredRing::reset(self) }
}

impl ByteRing for StandardRing {
    #[inline]
    fn write(&mut self, data: &[u8]) -> Result<usize> { Ok(StandardRing::write(self, data)) }

    #[inline]
    fn read(&mut self, out: &mut [u8]) -> Result<usize> { Ok(StandardRing::read(self, out)) }

    #[inline]
    fn len(&self) -> Result<usize> { Ok(StandardRing::len(self)) }

    #[inline]
    fn capacity(&self) -> Result<usize> { Ok(StandardRing::capacity(self)) }

    #[inline]
    fn reset(&mut self) -> Result<()> {
        StandardRing::reset(self);
        Ok(())
    }
}
