use bitcoin::Sequence;
use bitcoin::absolute;

/// Which transaction field a lock value belongs to.
#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub enum LockType {
    /// nLockTime
    Absolute,
    /// nSequence
    Relative,
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub enum LockError {
    /// One value is a block height, the other a median-time-past timestamp.
    AbsoluteMix { a: u32, b: u32 },
    /// One value counts blocks, the other 512-second intervals.
    RelativeMix { a: u32, b: u32 },
    /// The value does not encode a relative locktime (disable flag set).
    BadBip68 { value: u32 },
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub enum RelativeUnits {
    Blocks,
    Seconds,
}

/// Decode the BIP-68 lock class of an nSequence value.
pub fn relative_units(value: u32) -> Result<RelativeUnits, LockError> {
    let sequence = Sequence::from_consensus(value);
    if !sequence.is_relative_lock_time() {
        return Err(LockError::BadBip68 { value });
    }
    if sequence.is_time_locked() {
        Ok(RelativeUnits::Seconds)
    } else {
        Ok(RelativeUnits::Blocks)
    }
}

/// Whether an nLockTime value is a block height (below the consensus
/// threshold) rather than a timestamp.
pub fn is_height_lock(value: u32) -> bool {
    absolute::LockTime::from_consensus(value).is_block_height()
}

/// Merge two optional lock values by maximum, refusing to mix units.
pub fn max_lock(
    a: Option<u32>,
    b: Option<u32>,
    lock_type: LockType,
) -> Result<Option<u32>, LockError> {
    match (a, b) {
        (None, None) => Ok(None),
        (Some(value), None) | (None, Some(value)) => {
            if lock_type == LockType::Relative {
                relative_units(value)?;
            }
            Ok(Some(value))
        }
        (Some(a), Some(b)) => {
            match lock_type {
                LockType::Absolute => {
                    if is_height_lock(a) != is_height_lock(b) {
                        return Err(LockError::AbsoluteMix { a, b });
                    }
                }
                LockType::Relative => {
                    if relative_units(a)? != relative_units(b)? {
                        return Err(LockError::RelativeMix { a, b });
                    }
                }
            }
            Ok(Some(a.max(b)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1 << 22 marks a time-based relative lock
    const TIME_LOCK: u32 = 0x0040_0000;

    #[test]
    fn merges_by_maximum() {
        assert_eq!(
            max_lock(Some(10), Some(20), LockType::Absolute),
            Ok(Some(20))
        );
        assert_eq!(max_lock(Some(5), None, LockType::Relative), Ok(Some(5)));
        assert_eq!(max_lock(None, None, LockType::Absolute), Ok(None));
    }

    #[test]
    fn commutative_and_idempotent() {
        for (a, b) in [(Some(3), Some(9)), (None, Some(7)), (Some(4), None)] {
            assert_eq!(
                max_lock(a, b, LockType::Absolute),
                max_lock(b, a, LockType::Absolute)
            );
        }
        assert_eq!(
            max_lock(Some(42), Some(42), LockType::Relative),
            Ok(Some(42))
        );
    }

    #[test]
    fn rejects_absolute_height_time_mix() {
        assert_eq!(
            max_lock(Some(100), Some(500_000_000), LockType::Absolute),
            Err(LockError::AbsoluteMix {
                a: 100,
                b: 500_000_000
            })
        );
        assert!(max_lock(Some(500_000_000), Some(500_000_001), LockType::Absolute).is_ok());
    }

    #[test]
    fn rejects_relative_unit_mix() {
        assert_eq!(
            max_lock(Some(10), Some(TIME_LOCK | 5), LockType::Relative),
            Err(LockError::RelativeMix {
                a: 10,
                b: TIME_LOCK | 5
            })
        );
        assert!(max_lock(Some(TIME_LOCK | 5), Some(TIME_LOCK | 9), LockType::Relative).is_ok());
    }

    #[test]
    fn rejects_disabled_sequence_numbers() {
        assert_eq!(
            max_lock(Some(1 << 31), None, LockType::Relative),
            Err(LockError::BadBip68 { value: 1 << 31 })
        );
    }
}
