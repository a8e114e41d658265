//! Unix mirrored memory allocation.
//!
//! | step      | Linux / Android          | other Unix                   |
//! |-----------|--------------------------|------------------------------|
//! | provision | `memfd_create`           | `shm_open` + `shm_unlink`    |
//! | reserve   | `mmap(PROT_NONE)`        | `mmap(PROT_NONE)`            |
//! | install   | `mmap(MAP_FIXED)` twice  | `mmap(MAP_FIXED)` twice      |
//! | release   | `munmap`                 | `munmap`                     |

use crate::error::{Error, Half, Result};
use log::{debug, error, warn};
use nix::{
    sys::mman::{MapFlags, ProtFlags, mmap, mmap_anonymous, munmap},
    unistd::{SysconfVar, ftruncate, sysconf},
};
use std::{
    ffi::c_void,
    io,
    mem::ManuallyDrop,
    num::NonZeroUsize,
    os::fd::{AsFd, OwnedFd},
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the platform page size, caching it after the first query.
pub(crate) fn allocation_granularity() -> usize {
    const UNINIT_ALLOCATION_GRANULARITY: usize = 0;
    static ALLOCATION_GRANULARITY: AtomicUsize = AtomicUsize::new(UNINIT_ALLOCATION_GRANULARITY);
    let cached_val = ALLOCATION_GRANULARITY.load(Ordering::Acquire);
    if cached_val != UNINIT_ALLOCATION_GRANULARITY {
        return cached_val;
    }
    let updated_val = match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => size as usize,
        other => {
            warn!("sysconf(PAGE_SIZE) returned {other:?}, assuming {FALLBACK_PAGE_SIZE} bytes");
            FALLBACK_PAGE_SIZE
        }
    };
    match ALLOCATION_GRANULARITY.compare_exchange(
        UNINIT_ALLOCATION_GRANULARITY,
        updated_val,
        Ordering::Release,
        Ordering::Acquire,
    ) {
        Ok(_) => updated_val,
        Err(val_from_other_thread) => val_from_other_thread,
    }
}

/// An anonymous, mappable memory object of a fixed byte length.
///
/// The descriptor is closed on drop; mappings installed from it keep the pages alive.
#[derive(Debug)]
pub(crate) struct BackingStore {
    fd: OwnedFd,
    size: usize,
}

impl BackingStore {
    #[inline]
    pub(crate) fn size(&self) -> usize { self.size }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn create_mem_fd() -> io::Result<OwnedFd> {
    use nix::sys::memfd::{MFdFlags, memfd_create};
    Ok(memfd_create("mirror_ring", MFdFlags::MFD_CLOEXEC)?)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn create_mem_fd() -> io::Result<OwnedFd> {
    use nix::{
        errno::Errno,
        fcntl::OFlag,
        sys::{
            mman::{shm_open, shm_unlink},
            stat::Mode,
        },
    };
    const ATTEMPTS: usize = 8;
    let mut last_err = Errno::EEXIST;
    for _ in 0..ATTEMPTS {
        let suffix: String = std::iter::repeat_with(fastrand::alphanumeric).take(8).collect();
        let name = format!("/mirror_ring-{suffix}");
        match shm_open(name.as_str(), OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL, Mode::from_bits_truncate(0o600)) {
            Ok(fd) => {
                shm_unlink(name.as_str())?;
                return Ok(fd);
            }
            Err(Errno::EEXIST) => last_err = Errno::EEXIST,
            Err(errno) => return Err(errno.into()),
        }
    }
    Err(last_err.into())
}

/// Creates a backing store of exactly `size` bytes.
pub(crate) fn provision(size: usize) -> Result<BackingStore> {
    let allocation_failed = |source: io::Error| Error::Allocation { size, source };
    if size == 0 {
        return Err(allocation_failed(io::ErrorKind::InvalidInput.into()));
    }
    let len: nix::libc::off_t = size.try_into().map_err(|_| allocation_failed(io::ErrorKind::InvalidInput.into()))?;
    let fd = create_mem_fd().map_err(allocation_failed)?;
    ftruncate(fd.as_fd(), len).map_err(|errno| allocation_failed(errno.into()))?;
    debug!("provisioned {size}-byte backing store");
    Ok(BackingStore { fd, size })
}

/// A `PROT_NONE` range of address space, unmapped on drop unless consumed by [`install`].
#[derive(Debug)]
pub(crate) struct Reservation {
    base: NonNull<c_void>,
    len: usize,
}

impl Reservation {
    #[inline]
    pub(crate) fn base(&self) -> NonNull<c_void> { self.base }

    #[inline]
    pub(crate) fn len(&self) -> usize { self.len }

    fn into_base(self) -> NonNull<c_void> { ManuallyDrop::new(self).base }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        // Also removes any view already installed inside the range.
        match unsafe { munmap(self.base, self.len) } {
            Ok(()) => debug!("released {} bytes of reserved address space at {:p}", self.len, self.base),
            Err(errno) => error!("failed to release reservation at {:p}: {errno}", self.base),
        }
    }
}

/// Reserves `size` bytes of contiguous, inaccessible address space.
pub(crate) fn reserve(size: usize) -> Result<Reservation> {
    let reservation_failed = |source: io::Error| Error::Reservation { size, source };
    let len = NonZeroUsize::new(size).ok_or_else(|| reservation_failed(io::ErrorKind::InvalidInput.into()))?;
    let flags = {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            MapFlags::MAP_PRIVATE | MapFlags::MAP_NORESERVE
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        {
            MapFlags::MAP_PRIVATE
        }
    };
    let base = unsafe { mmap_anonymous(None, len, ProtFlags::PROT_NONE, flags) }
        .map_err(|errno| reservation_failed(errno.into()))?;
    debug!("reserved {size} bytes of address space at {base:p}");
    Ok(Reservation { base, len: size })
}

/// Maps `store` over both halves of `reservation`.
///
/// On failure the reservation is dropped, which unmaps the whole range and with it any half that was already
/// installed.
pub(crate) fn install(reservation: Reservation, store: &BackingStore) -> Result<NonNull<u8>> {
    let physical_size = store.size();
    debug_assert_eq!(reservation.len(), physical_size * 2, "reservation must be twice the backing store");
    let mapping_failed = |half: Half, source: io::Error| {
        warn!("mapping the {half} half of the mirror failed, rolling back: {source}");
        Error::Mapping { half, source }
    };
    let length =
        NonZeroUsize::new(physical_size).ok_or_else(|| mapping_failed(Half::Low, io::ErrorKind::InvalidInput.into()))?;
    let low_half_addr = reservation.base();
    let high_half_addr = unsafe { low_half_addr.byte_add(physical_size) };
    let map_view = |addr: NonNull<c_void>| unsafe {
        mmap(
            Some(addr.addr()),
            length,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
            store.fd.as_fd(),
            0,
        )
    };
    let check_view = |half: Half, view: NonNull<c_void>, expected: NonNull<c_void>| {
        if view == expected {
            Ok(())
        } else {
            Err(mapping_failed(half, io::Error::other(format!("view landed at {view:p} instead of {expected:p}"))))
        }
    };
    let low_view = map_view(low_half_addr).map_err(|errno| mapping_failed(Half::Low, errno.into()))?;
    check_view(Half::Low, low_view, low_half_addr)?;
    let high_view = map_view(high_half_addr).map_err(|errno| mapping_failed(Half::High, errno.into()))?;
    check_view(Half::High, high_view, high_half_addr)?;
    debug!("installed {physical_size}-byte mirror at {low_view:p} and {high_view:p}");
    Ok(reservation.into_base().cast())
}

/// Unmaps both halves of a mirror created by [`install`].
///
/// # Safety
///
/// `ptr` and `physical_size` must describe a live mirror, and it must not be used afterwards.
pub(crate) unsafe fn release(ptr: NonNull<u8>, physical_size: usize) -> io::Result<()> {
    unsafe { munmap(ptr.cast(), physical_size * 2) }?;
    debug!("released {physical_size}-byte mirror at {ptr:p}");
    Ok(())
}
