/// Maximum locktime value accepted by `after()` and `older()`.
pub const MAX_LOCKTIME_VALUE: u32 = 0x7FFF_FFFF;

/// Minimum locktime value accepted by `after()` and `older()`.
///
/// Consensus allows 0, but the Script fragments use the value as a boolean,
/// so 0 would compile to an unsatisfiable branch.
pub const MIN_LOCKTIME_VALUE: u32 = 1;

/// Check that a locktime value is within the accepted range.
pub fn check_locktime_value(value: u32) -> Result<(), u32> {
    if value < MIN_LOCKTIME_VALUE || value > MAX_LOCKTIME_VALUE {
        return Err(value);
    }
    Ok(())
}
