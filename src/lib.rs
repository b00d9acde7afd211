#![deny(missing_docs)]
//! Implementation of the Utreexo dynamic hash-based accumulator.
//!
//! The accumulator is a forest of perfect merkle trees, one per set bit of the
//! number of leaves. Validators keep only the roots (the `Stump`) and verify
//! batched inclusion proofs supplied by provers (e.g. a `Forest`).
//! Deleting a leaf moves its sibling subtree one row up, into the place of
//! their parent, so live leaves can sit on any row and cached proofs follow
//! them with `Proof::update`.

mod errors;
mod forest;
mod leaf;
pub mod position;
mod proof;
mod serialization;
mod stump;


// Public API
pub use self::errors::UtreexoError;
pub use self::forest::Forest;
pub use self::leaf::{LeafData, OutPoint};
pub use self::position::{Position, MAX_LEAVES};
pub use self::proof::Proof;
pub use self::stump::{Stump, UpdateData};
pub use merkle::{Hash, Hasher, MerkleItem};

/// Utreexo-labeled hasher for the merkle tree nodes.
pub fn utreexo_hasher<M: MerkleItem>() -> Hasher<M> {
    Hasher::new(b"Utreexo")
}
