use thiserror::Error;

/// Errors reported synchronously at ring construction.
///
/// Runtime operations (`Put`, `Get`, `Consume`, `Close`) have no error channel
/// of their own — see the crate-level docs for why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConstructError {
    /// `capacity` was zero, not a power of two, or smaller than the minimum
    /// of two slots.
    #[error("ring capacity {requested} is not a power of two >= 2")]
    InvalidCapacity {
        /// The capacity the caller asked for.
        requested: usize,
    },
}
