//! Windows mirrored memory allocation built on placeholders.
//!
//! Requires Windows 10 (version 1803) or newer for `VirtualAlloc2` and `MapViewOfFile3`.

use crate::error::{Error, Half, Result};
use log::{debug, error, warn};
use std::{
    ffi::c_void,
    io,
    mem::{ManuallyDrop, MaybeUninit},
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};
use windows::{
    Win32::{
        Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE},
        System::{
            Memory::{
                CreateFileMappingW, MEM_PRESERVE_PLACEHOLDER, MEM_RELEASE, MEM_REPLACE_PLACEHOLDER, MEM_RESERVE,
                MEM_RESERVE_PLACEHOLDER, MEM_UNMAP_NONE, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile3, PAGE_NOACCESS,
                PAGE_READWRITE, SEC_COMMIT, UnmapViewOfFile2, VIRTUAL_FREE_TYPE, VirtualAlloc2, VirtualFree,
            },
            SystemInformation::{GetSystemInfo, SYSTEM_INFO},
            Threading::GetCurrentProcess,
        },
    },
    core::PCWSTR,
};

/// Returns the allocation granularity, caching it after the first query.
///
/// Views can only be placed at multiples of this value, so it plays the role of the page size.
pub(crate) fn allocation_granularity() -> usize {
    const UNINIT_ALLOCATION_GRANULARITY: usize = 0;
    static ALLOCATION_GRANULARITY: AtomicUsize = AtomicUsize::new(UNINIT_ALLOCATION_GRANULARITY);
    let cached_val = ALLOCATION_GRANULARITY.load(Ordering::Acquire);
    // fast path
    if cached_val != UNINIT_ALLOCATION_GRANULARITY {
        return cached_val;
    }
    // slow path
    let updated_val = unsafe {
        let mut system_info = MaybeUninit::<SYSTEM_INFO>::uninit();
        GetSystemInfo(system_info.as_mut_ptr());
        system_info.assume_init().dwAllocationGranularity as usize
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

#[inline]
fn into_view(addr: *mut c_void) -> MEMORY_MAPPED_VIEW_ADDRESS { MEMORY_MAPPED_VIEW_ADDRESS { Value: addr } }

/// A pagefile-backed section of a fixed byte length, closed on drop.
#[derive(Debug)]
pub(crate) struct BackingStore {
    section: HANDLE,
    size: usize,
}

impl BackingStore {
    #[inline]
    pub(crate) fn size(&self) -> usize { self.size }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        if let Err(err) = unsafe { CloseHandle(self.section) } {
            error!("failed to close backing store handle: {err}");
        }
    }
}

/// Creates a backing store of exactly `size` bytes.
pub(crate) fn provision(size: usize) -> Result<BackingStore> {
    if size == 0 {
        return Err(Error::Allocation { size, source: io::ErrorKind::InvalidInput.into() });
    }
    let max_size_low = size as u32;
    let max_size_high = ((size as u64) >> 32) as u32;
    let section = unsafe {
        CreateFileMappingW(
            INVALID_HANDLE_VALUE,
            None,
            PAGE_READWRITE | SEC_COMMIT,
            max_size_high,
            max_size_low,
            PCWSTR::null(),
        )
    }
    .map_err(|err| Error::Allocation { size, source: err.into() })?;
    debug!("provisioned {size}-byte backing store");
    Ok(BackingStore { section, size })
}

/// Two adjacent placeholders covering `2 * half` bytes.
///
/// Dropping it frees whatever is still a placeholder and unmaps a low view that was already installed.
#[derive(Debug)]
pub(crate) struct Reservation {
    base: NonNull<c_void>,
    half: usize,
    low_mapped: bool,
}

impl Reservation {
    #[inline]
    pub(crate) fn base(&self) -> NonNull<c_void> { self.base }

    #[inline]
    pub(crate) fn len(&self) -> usize { self.half * 2 }

    #[inline]
    fn high(&self) -> NonNull<c_void> { unsafe { self.base.byte_add(self.half) } }

    fn into_base(self) -> NonNull<c_void> { ManuallyDrop::new(self).base }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        unsafe {
            let low = if self.low_mapped {
                UnmapViewOfFile2(GetCurrentProcess(), into_view(self.base.as_ptr()), MEM_UNMAP_NONE)
            } else {
                VirtualFree(self.base.as_ptr(), 0, MEM_RELEASE)
            };
            let high = VirtualFree(self.high().as_ptr(), 0, MEM_RELEASE);
            match (low, high) {
                (Ok(()), Ok(())) => debug!("released {} bytes of reserved address space at {:p}", self.len(), self.base),
                (low, high) => error!("failed to release reservation at {:p}: low {low:?}, high {high:?}", self.base),
            }
        }
    }
}

/// Reserves `size` bytes of address space as two placeholders of `size / 2` bytes each.
pub(crate) fn reserve(size: usize) -> Result<Reservation> {
    let reservation_failed = |source: io::Error| Error::Reservation { size, source };
    if size == 0 || size % 2 != 0 {
        return Err(reservation_failed(io::ErrorKind::InvalidInput.into()));
    }
    let half = size / 2;
    unsafe {
        let placeholder = VirtualAlloc2(
            Some(GetCurrentProcess()),
            None, // let the system choose an address
            size,
            MEM_RESERVE | MEM_RESERVE_PLACEHOLDER,
            PAGE_NOACCESS.0,
            None,
        );
        let Some(base) = NonNull::new(placeholder) else {
            return Err(reservation_failed(io::Error::last_os_error()));
        };
        // Splitting off the low half leaves the high half as a second placeholder.
        if let Err(err) = VirtualFree(base.as_ptr(), half, VIRTUAL_FREE_TYPE(MEM_RELEASE.0 | MEM_PRESERVE_PLACEHOLDER.0))
        {
            let _ = VirtualFree(base.as_ptr(), 0, MEM_RELEASE);
            return Err(reservation_failed(err.into()));
        }
        debug!("reserved {size} bytes of address space at {base:p}");
        Ok(Reservation { base, half, low_mapped: false })
    }
}

/// Maps `store` over both placeholders of `reservation`.
///
/// On failure the reservation is dropped, which unmaps the low view if it was installed and frees the remaining
/// placeholders.
pub(crate) fn install(mut reservation: Reservation, store: &BackingStore) -> Result<NonNull<u8>> {
    let physical_size = store.size();
    debug_assert_eq!(reservation.len(), physical_size * 2, "reservation must be twice the backing store");
    let mapping_failed = |half: Half, source: io::Error| {
        warn!("mapping the {half} half of the mirror failed, rolling back: {source}");
        Error::Mapping { half, source }
    };
    let map_view = |half: Half, addr: NonNull<c_void>| unsafe {
        let view = MapViewOfFile3(
            store.section,
            Some(GetCurrentProcess()),
            Some(addr.as_ptr().cast_const()),
            0,
            physical_size,
            MEM_REPLACE_PLACEHOLDER,
            PAGE_READWRITE.0,
            None,
        );
        match NonNull::new(view.Value) {
            Some(view) if view == addr => Ok(view),
            Some(view) => {
                let _ = UnmapViewOfFile2(GetCurrentProcess(), into_view(view.as_ptr()), MEM_UNMAP_NONE);
                Err(mapping_failed(half, io::Error::other(format!("view landed at {view:p} instead of {addr:p}"))))
            }
            None => Err(mapping_failed(half, io::Error::last_os_error())),
        }
    };
    let low_view = map_view(Half::Low, reservation.base())?;
    reservation.low_mapped = true;
    let high_view = map_view(Half::High, reservation.high())?;
    debug!("installed {physical_size}-byte mirror at {low_view:p} and {high_view:p}");
    Ok(reservation.into_base().cast())
}

/// Unmaps both views of a mirror created by [`install`].
///
/// # Safety
///
/// `ptr` and `physical_size` must describe a live mirror, and it must not be used afterwards.
pub(crate) unsafe fn release(ptr: NonNull<u8>, physical_size: usize) -> io::Result<()> {
    unsafe {
        let current_process = GetCurrentProcess();
        let low = ptr.as_ptr().cast::<c_void>();
        let high = ptr.byte_add(physical_size).as_ptr().cast::<c_void>();
        // Unmapping without MEM_PRESERVE_PLACEHOLDER also frees the address range.
        let unmap_low_result = UnmapViewOfFile2(current_process, into_view(low), MEM_UNMAP_NONE);
        let unmap_high_result = UnmapViewOfFile2(current_process, into_view(high), MEM_UNMAP_NONE);
        unmap_low_result?;
        unmap_high_result?;
    }
    debug!("released {physical_size}-byte mirror at {ptr:p}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::slice;
    use windows::Win32::System::Memory::{MEM_FREE, MEMORY_BASIC_INFORMATION, VirtualQuery};

    fn mirror(physical_size: usize) -> NonNull<u8> {
        let store = provision(physical_size).unwrap();
        let reservation = reserve(physical_size * 2).unwrap();
        install(reservation, &store).unwrap()
    }

    #[test]
    fn provision_rejects_zero() {
        assert!(matches!(provision(0), Err(Error::Allocation { size: 0, .. })));
    }

    #[test]
    fn reserve_then_drop() {
        let reservation = reserve(allocation_granularity() * 4).unwrap();
        assert_eq!(reservation.len(), allocation_granularity() * 4);
    }

    #[test]
    fn mirrored_write_read() {
        let physical_size = allocation_granularity() * 2;
        let ptr = mirror(physical_size);
        unsafe {
            let full_slice = slice::from_raw_parts_mut(ptr.as_ptr(), physical_size * 2);
            let test_data = (0..physical_size).map(|i| (i % 251) as u8).collect::<Vec<u8>>();
            full_slice[..physical_size].copy_from_slice(&test_data);
            assert_eq!(&full_slice[physical_size..], test_data.as_slice());
            full_slice[physical_size..].fill(7);
            assert!(full_slice[..physical_size].iter().all(|&b| b == 7));
            release(ptr, physical_size).unwrap();
        }
    }

    #[test]
    fn install_fails_when_the_store_is_too_small() {
        let physical_size = allocation_granularity();
        let store = provision(physical_size).unwrap();
        let reservation = reserve(physical_size * 4).unwrap();
        let base = reservation.base();
        // Claims more bytes than the section holds; shares the handle, so it must not close it.
        let oversized = ManuallyDrop::new(BackingStore { section: store.section, size: physical_size * 2 });
        let err = install(reservation, &oversized).unwrap_err();
        assert!(matches!(err, Error::Mapping { half: Half::Low, .. }));

        let mut info = MaybeUninit::<MEMORY_BASIC_INFORMATION>::uninit();
        let written = unsafe {
            VirtualQuery(Some(base.as_ptr().cast_const()), info.as_mut_ptr(), size_of::<MEMORY_BASIC_INFORMATION>())
        };
        assert_ne!(written, 0);
        let info = unsafe { info.assume_init() };
        assert_eq!(info.State, MEM_FREE, "range at {base:p} still reserved after rollback");
    }
}
