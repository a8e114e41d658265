//! Construction parameters for [`MirroredRing`](crate::MirroredRing).

use crate::error::{Error, Result};
use crate::mirrored::mirrored_allocation_unit;

/// What to do with a capacity that is not a multiple of the page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum CapacityPolicy {
    /// Round up to the next multiple of the page size.
    #[default]
    RoundUp,
    /// Reject the capacity with [`Error::InvalidCapacity`].
    Strict,
}

/// Requested capacity, page size and rounding policy of a mirrored ring.
///
/// ```
/// use mirror_ring::{CapacityPolicy, RingConfig};
///
/// let config = RingConfig::new(10_000).policy(CapacityPolicy::RoundUp);
/// assert_eq!(config.resolve_with_granularity(4096).unwrap(), 12_288);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RingConfig {
    /// Requested capacity in bytes.
    pub capacity: usize,
    /// Page size to align the capacity to. `None` uses the platform allocation granularity.
    #[cfg_attr(feature = "serde", serde(default))]
    pub page_size: Option<usize>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub policy: CapacityPolicy,
}

impl RingConfig {
    #[must_use]
    pub fn new(capacity: usize) -> Self { Self { capacity, page_size: None, policy: CapacityPolicy::default() } }

    /// Aligns the capacity to `page_size` instead of the platform granularity.
    ///
    /// The value must be a power of two and a multiple of the platform granularity.
    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: CapacityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Computes the capacity a ring built from this configuration on this platform will have.
    #[cfg(any(unix, windows))]
    pub fn resolve(&self) -> Result<usize> { self.resolve_with_granularity(crate::mirrored::allocation_granularity()) }

    /// Computes the final capacity as if the platform allocation granularity were `granularity`.
    pub fn resolve_with_granularity(&self, granularity: usize) -> Result<usize> {
        if !granularity.is_power_of_two() {
            return Err(Error::InvalidPageSize { page_size: self.page_size.unwrap_or(granularity), granularity });
        }
        let page_size = match self.page_size {
            None => granularity,
            Some(page_size) => {
                if !page_size.is_power_of_two() || !page_size.is_multiple_of(granularity) {
                    return Err(Error::InvalidPageSize { page_size, granularity });
                }
                page_size
            }
        };
        let invalid = || Error::InvalidCapacity { requested: self.capacity, page_size };
        if self.policy == CapacityPolicy::Strict && !self.capacity.is_multiple_of(page_size) {
            return Err(invalid());
        }
        mirrored_allocation_unit(self.capacity, page_size).ok_or_else(invalid)
    }
}

impl From<usize> for RingConfig {
    fn from(capacity: usize) -> Self { Self::new(capacity) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_is_the_default() {
        let config = RingConfig::new(1);
        assert_eq!(config.policy, CapacityPolicy::RoundUp);
        assert_eq!(config.resolve_with_granularity(4096).unwrap(), 4096);
        assert_eq!(RingConfig::new(4097).resolve_with_granularity(4096).unwrap(), 8192);
    }

    #[test]
    fn strict_accepts_exact_multiples_only() {
        let strict = |capacity| RingConfig::new(capacity).policy(CapacityPolicy::Strict).resolve_with_granularity(4096);
        assert_eq!(strict(8192).unwrap(), 8192);
        assert!(matches!(strict(8000), Err(Error::InvalidCapacity { requested: 8000, page_size: 4096 })));
    }

    #[test]
    fn zero_capacity_is_rejected_under_both_policies() {
        for policy in [CapacityPolicy::RoundUp, CapacityPolicy::Strict] {
            let err = RingConfig::new(0).policy(policy).resolve_with_granularity(4096).unwrap_err();
            assert!(matches!(err, Error::InvalidCapacity { requested: 0, .. }));
        }
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        let err = RingConfig::new(usize::MAX).resolve_with_granularity(4096).unwrap_err();
        assert!(matches!(err, Error::InvalidCapacity { .. }));
    }

    #[test]
    fn explicit_page_size_overrides_granularity() {
        let config = RingConfig::new(5000).page_size(16384);
        assert_eq!(config.resolve_with_granularity(4096).unwrap(), 16384);
        let strict = config.policy(CapacityPolicy::Strict);
        assert!(matches!(
            strict.resolve_with_granularity(4096),
            Err(Error::InvalidCapacity { requested: 5000, page_size: 16384 })
        ));
    }

    #[test]
    fn page_size_must_be_a_power_of_two_multiple_of_granularity() {
        for bad in [0, 3000, 6144, 2048] {
            let err = RingConfig::new(4096).page_size(bad).resolve_with_granularity(4096).unwrap_err();
            assert!(matches!(err, Error::InvalidPageSize { page_size, granularity: 4096 } if page_size == bad));
        }
    }

    #[test]
    fn granularity_must_be_a_power_of_two() {
        for bad in [0, 3000] {
            let err = RingConfig::new(5000).resolve_with_granularity(bad).unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidPageSize { page_size, granularity } if page_size == bad && granularity == bad
            ));
            let err = RingConfig::new(5000).page_size(4096).resolve_with_granularity(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidPageSize { page_size: 4096, granularity } if granularity == bad));
        }
    }

    #[test]
    fn from_capacity() {
        assert_eq!(RingConfig::from(123), RingConfig::new(123));
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn resolve_uses_platform_granularity() {
        let ag = crate::mirrored::allocation_granularity();
        assert_eq!(RingConfig::new(1).resolve().unwrap(), ag);
    }
}
