use thiserror::Error;

/// Upper bound on requested capacity (2^30 slots).
///
/// Generous enough that no realistic caller hits it, small enough that a
/// caller fat-fingering a capacity argument fails fast instead of allocating
/// an unreasonable amount of memory.
const MAX_CAPACITY: usize = 1 << 30;

/// Error returned when constructing a buffer with an invalid capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    /// The requested capacity was zero or exceeded [`MAX_CAPACITY`].
    #[error("requested capacity {requested} is outside the supported range [1, {}]", MAX_CAPACITY)]
    OutOfRange {
        /// The capacity the caller asked for.
        requested: usize,
    },
}

/// Capacity and index mask for a ring, rounded up to the next power of two.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    capacity: usize,
    mask: u64,
}

impl Config {
    /// Validates `requested_capacity` and rounds it up to the next power of two.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::OutOfRange`] if `requested_capacity` is `0`
    /// or greater than `2^30`.
    pub fn new(requested_capacity: usize) -> Result<Self, CapacityError> {
        if requested_capacity == 0 || requested_capacity > MAX_CAPACITY {
            return Err(CapacityError::OutOfRange {
                requested: requested_capacity,
            });
        }

        let capacity = requested_capacity.next_power_of_two();
        Ok(Self {
            capacity,
            mask: (capacity - 1) as u64,
        })
    }

    /// Returns the rounded-up capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the mask used to fold a sequence number down to a slot index.
    #[inline]
    pub const fn mask(&self) -> u64 {
        self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_power_of_two() {
        assert_eq!(Config::new(1).unwrap().capacity(), 1);
        assert_eq!(Config::new(3).unwrap().capacity(), 4);
        assert_eq!(Config::new(4).unwrap().capacity(), 4);
        assert_eq!(Config::new(5).unwrap().capacity(), 8);
        assert_eq!(Config::new(1000).unwrap().capacity(), 1024);
    }

    #[test]
    fn mask_is_capacity_minus_one() {
        let config = Config::new(5).unwrap();
        assert_eq!(config.capacity(), 8);
        assert_eq!(config.mask(), 7);
    }

    #[test]
    fn rejects_zero() {
        assert_eq!(
            Config::new(0),
            Err(CapacityError::OutOfRange { requested: 0 })
        );
    }

    #[test]
    fn rejects_too_large() {
        let requested = MAX_CAPACITY + 1;
        assert_eq!(
            Config::new(requested),
            Err(CapacityError::OutOfRange { requested })
        );
    }
}
