use crate::error::ConstructError;

/// Validates a requested ring size and returns the index mask (`N - 1`) used
/// for `position & mask` slot lookups.
///
/// Rejects anything that isn't a power of two, and anything smaller than two
/// slots (a one-slot ring can't distinguish "empty" from "full" under the
/// stamp protocol without extra bookkeeping this crate doesn't carry).
pub(crate) fn validate(requested: usize) -> Result<usize, ConstructError> {
    if requested < 2 || !requested.is_power_of_two() {
        return Err(ConstructError::InvalidCapacity { requested });
    }
    Ok(requested - 1)
}
