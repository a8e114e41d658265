//! Error types for ring construction and use.

use std::{fmt, io};
use thiserror::Error;

/// One of the two views of a mirrored mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    /// The view at the base address.
    Low,
    /// The mirror view at `base + capacity`.
    High,
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Half::Low => f.write_str("low"),
            Half::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The requested capacity is zero, too large, or not page aligned under [`CapacityPolicy::Strict`].
    ///
    /// [`CapacityPolicy::Strict`]: crate::CapacityPolicy::Strict
    #[error("capacity {requested} cannot be used with page size {page_size}")]
    InvalidCapacity { requested: usize, page_size: usize },

    #[error("page size {page_size} is not a power-of-two multiple of the allocation granularity {granularity}")]
    InvalidPageSize { page_size: usize, granularity: usize },

    #[error("failed to allocate a {size}-byte backing store")]
    Allocation {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to reserve {size} bytes of address space")]
    Reservation {
        size: usize,
        #[source]
        source: io::Error,
    },

    /// Installing one half of the mirror failed. Every partial mapping has been removed.
    #[error("failed to map the {half} half of the mirror")]
    Mapping {
        half: Half,
        #[source]
        source: io::Error,
    },

    #[error("failed to release the mirrored mapping")]
    Release {
        #[source]
        source: io::Error,
    },

    #[error("ring buffer is closed")]
    Closed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Closed => io::Error::new(io::ErrorKind::BrokenPipe, err),
            other => io::Error::other(other),
        }
    }
}
