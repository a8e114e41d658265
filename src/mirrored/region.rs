//! Ownership of an installed mirror.
//!
//! A `MirroredRegion` owns a virtual memory range that is twice the size of its backing store. The second half of
//! the range maps the same pages as the first, so a slice that starts in the first half and runs past its end keeps
//! reading the bytes at the start of the store. All raw pointer handling of the crate lives here and in the platform
//! backends; everything above works with ordinary slices.

use super::*;
use crate::error::{Error, Result};
use core::{mem::ManuallyDrop, ptr::NonNull, slice};
use log::{debug, error};
use num::Integer;

/// An installed mirror of `capacity` bytes.
///
/// # Invariants
///
/// - `ptr` is the base of a live mapping of `2 * capacity` bytes, and `capacity` is a non-zero multiple of the
///   allocation granularity.
/// - The range `[ptr, ptr + capacity)` is mirrored to `[ptr + capacity, ptr + 2 * capacity)`.
/// - The mapping is released exactly once, by [`MirroredRegion::release`] or on drop.
#[derive(Debug)]
pub(crate) struct MirroredRegion {
    ptr: NonNull<u8>,
    capacity: usize,
}

impl MirroredRegion {
    /// Provisions a backing store of `capacity` bytes, reserves twice that much address space and maps the store
    /// into both halves.
    ///
    /// Each step rolls back what earlier steps acquired, so an error leaves nothing behind.
    pub(crate) fn allocate(capacity: usize) -> Result<Self> {
        debug_assert!(
            capacity > 0 && capacity <= MAX_CAPACITY && capacity.is_multiple_of(allocation_granularity()),
            "capacity must be a positive multiple of allocation_granularity() no larger than MAX_CAPACITY"
        );
        let store = provision(capacity)?;
        let reservation = reserve(capacity * 2)?;
        let ptr = install(reservation, &store)?;
        // The views keep the pages alive, the handle is no longer needed.
        drop(store);
        debug!("allocated {capacity}-byte mirrored region at {ptr:p}");
        Ok(Self { ptr, capacity })
    }

    /// Returns the byte length of the backing store.
    #[inline]
    pub(crate) fn capacity(&self) -> usize { self.capacity }

    /// Returns the byte length of the whole virtual range.
    #[inline]
    pub(crate) fn virtual_size(&self) -> usize {
        let v_size = self.capacity * 2;
        debug_assert!(v_size.is_even());
        v_size
    }

    /// Returns `len` bytes of the virtual range starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics if `[start, start + len)` is out of bounds of the virtual range.
    #[inline(always)]
    pub(crate) fn slice_at(&self, start: usize, len: usize) -> &[u8] {
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.virtual_size()),
            "slice bounds out of virtual capacity"
        );
        unsafe { slice::from_raw_parts(self.ptr.add(start).as_ptr(), len) }
    }

    /// Mutable counterpart of [`slice_at`](Self::slice_at).
    ///
    /// Writing through the returned slice also changes the aliased bytes in the other half.
    ///
    /// # Panics
    ///
    /// Panics if `[start, start + len)` is out of bounds of the virtual range.
    #[inline(always)]
    pub(crate) fn slice_mut_at(&mut self, start: usize, len: usize) -> &mut [u8] {
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.virtual_size()),
            "slice bounds out of virtual capacity"
        );
        unsafe { slice::from_raw_parts_mut(self.ptr.add(start).as_ptr(), len) }
    }

    #[cfg(test)]
    #[inline(always)]
    pub(crate) fn as_ptr(&self) -> *const u8 { self.ptr.as_ptr() }

    /// Unmaps both halves and the address reservation.
    pub(crate) fn release(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        unsafe { super::release(this.ptr, this.capacity) }.map_err(|source| Error::Release { source })
    }
}

impl Drop for MirroredRegion {
    fn drop(&mut self) {
        if let Err(err) = unsafe { super::release(self.ptr, self.capacity) } {
            error!("failed to release {}-byte mirrored region at {:p}: {err}", self.capacity, self.ptr);
        }
    }
}

// The region is uniquely owned and has no interior mutability.
unsafe impl Send for MirroredRegion {}
unsafe impl Sync for MirroredRegion {}
