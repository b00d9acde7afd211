#![deny(missing_docs)]

//! Hashing primitives for merkle binary trees.
//!
//! All hashes are computed with a labeled merlin transcript, so that
//! leaves and inner nodes of different trees never collide.
use core::marker::PhantomData;
use merlin::Transcript;
use readerwriter::*;
use std::fmt;
use subtle::{Choice, ConstantTimeEq};

/// Merkle hash of a node.
///
/// The all-zero hash is reserved: it marks an empty (deleted) subtree
/// and is never produced by a [Hasher] in practice.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; 32]);

/// MerkleItem defines an item in the Merkle tree.
pub trait MerkleItem: Sized {
    /// Commits the hash of the item to Transcript.
    fn commit(&self, t: &mut Transcript);
}

/// Precomputed hash instance.
pub struct Hasher<M: MerkleItem> {
    t: Transcript,
    phantom: PhantomData<M>,
}

impl Hash {
    /// Returns the empty hash (all zeroes).
    pub const fn empty() -> Self {
        Hash([0u8; 32])
    }

    /// Returns true if this hash marks an empty subtree.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Hash(empty)")
        } else {
            write!(f, "Hash({})", hex::encode(&self.0))
        }
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl ConstantTimeEq for Hash {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0[..].ct_eq(&other.0[..])
    }
}

/// The only reason for this impl is to let untyped containers
/// name a hasher: `Hasher::<()>::new(label)`.
impl MerkleItem for () {
    fn commit(&self, t: &mut Transcript) {
        t.append_message(b"", b"");
    }
}

impl<T> MerkleItem for &T
where
    T: MerkleItem,
{
    fn commit(&self, t: &mut Transcript) {
        T::commit(*self, t)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl core::ops::Deref for Hash {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl core::ops::DerefMut for Hash {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<M: MerkleItem> Clone for Hasher<M> {
    fn clone(&self) -> Self {
        Self {
            t: self.t.clone(),
            phantom: self.phantom,
        }
    }
}

impl<M: MerkleItem> Hasher<M> {
    /// Creates a new hasher instance.
    pub fn new(label: &'static [u8]) -> Self {
        Self {
            t: Transcript::new(label),
            phantom: PhantomData,
        }
    }

    /// Computes hash of the leaf node in a merkle tree.
    pub fn leaf(&self, item: &M) -> Hash {
        let mut t = self.t.clone();
        item.commit(&mut t);
        let mut hash = Hash::default();
        t.challenge_bytes(b"merkle.leaf", &mut hash);
        hash
    }

    /// Computes hash of the inner node in a merkle tree (that contains left/right child nodes).
    pub fn intermediate(&self, left: &Hash, right: &Hash) -> Hash {
        let mut t = self.t.clone();
        t.append_message(b"L", &left);
        t.append_message(b"R", &right);
        let mut hash = Hash::default();
        t.challenge_bytes(b"merkle.node", &mut hash);
        hash
    }
}

impl Encodable for Hash {
    fn encode(&self, w: &mut impl Writer) -> Result<(), WriteError> {
        w.write(b"hash", &self.0)
    }
}

impl ExactSizeEncodable for Hash {
    fn encoded_size(&self) -> usize {
        32
    }
}

impl Decodable for Hash {
    fn decode(reader: &mut impl Reader) -> Result<Self, ReadError> {
        reader.read_u8x32().map(Hash)
    }
}

impl serde::Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BytesVisitor;

        impl<'de> serde::de::Visitor<'de> for BytesVisitor {
            type Value = Hash;

            fn expecting(&self, formatter: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                formatter.write_str("a valid 32-byte string")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Hash, E>
            where
                E: serde::de::Error,
            {
                if v.len() == 32 {
                    let mut buf = [0u8; 32];
                    buf[0..32].copy_from_slice(v);
                    Ok(Hash(buf))
                } else {
                    Err(serde::de::Error::invalid_length(v.len(), &self))
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Hash, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut buf = [0u8; 32];
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                if seq.next_element::<u8>()?.is_some() {
                    return Err(serde::de::Error::invalid_length(33, &self));
                }
                Ok(Hash(buf))
            }
        }

        deserializer.deserialize_bytes(BytesVisitor)
    }
}
