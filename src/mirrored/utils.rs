use num::Integer;

/// Largest virtual range a mirror may span.
pub const MAX_VIRTUAL_SIZE: usize = isize::MAX as usize;

/// Largest capacity a mirror may hold; its doubled virtual range must still fit in `isize`.
pub const MAX_CAPACITY: usize = MAX_VIRTUAL_SIZE / 2;

/// Rounds `bytes` up to the physical size of a mirror built from `page_size` pages.
///
/// Returns `None` if `bytes` is zero or the result would exceed [`MAX_CAPACITY`].
pub(crate) fn mirrored_allocation_unit(bytes: usize, page_size: usize) -> Option<usize> {
    debug_assert!(page_size.is_power_of_two(), "page size must be a power of two");
    if bytes == 0 {
        return None;
    }
    let blocks = Integer::div_ceil(&bytes, &page_size);
    blocks.checked_mul(page_size).filter(|&physical| physical <= MAX_CAPACITY)
}
