//! Mirrored memory regions.
#[cfg(any(unix, windows))]
mod region;
mod utils;

#[cfg(any(unix, windows))]
pub(crate) use region::MirroredRegion;
pub(crate) use utils::mirrored_allocation_unit;
pub use utils::{MAX_CAPACITY, MAX_VIRTUAL_SIZE};

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use unix::*;

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub(crate) use windows::*;
