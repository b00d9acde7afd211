use readerwriter::ReadError;
use thiserror::Error;

use crate::position::Position;

/// Represents an error in accumulator modification, proof verification, update or parsing.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum UtreexoError {
    /// This error occurs when the recomputed roots do not match the roots of the accumulator,
    /// or when the proof carries too few or too many hashes.
    #[error("Merkle proof is invalid")]
    InvalidProof,

    /// This error occurs when a position is out of range for the current number of leaves,
    /// is duplicated, or is not among the expected targets.
    #[error("Target {0} is invalid")]
    InvalidTarget(Position),

    /// This error occurs when parallel slices are expected to have the same length, but don't.
    #[error("Expected {expected} items, got {actual}")]
    InvalidSlice {
        /// Length implied by the other argument.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// This error occurs when the binary encoding of a proof or a stump is malformed.
    #[error("Malformed encoding: {0}")]
    ParseError(ReadError),

    /// This error occurs when the accumulator would exceed the addressable number of leaves.
    #[error("Accumulator cannot hold more leaves")]
    TooManyLeaves,

    /// This error occurs when a block height does not fit in a leaf's header code.
    #[error("Block height {0} is too large")]
    InvalidHeight(u32),
}

impl From<ReadError> for UtreexoError {
    fn from(e: ReadError) -> UtreexoError {
        UtreexoError::ParseError(e)
    }
}

/// Checks that two parallel slices have the same length.
pub(crate) fn check_lengths<A, B>(expected: &[A], actual: &[B]) -> Result<(), UtreexoError> {
    if expected.len() != actual.len() {
        return Err(UtreexoError::InvalidSlice {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    Ok(())
}
