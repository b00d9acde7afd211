use serde::de::{SeqAccess, Visitor};
use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

use merkle::Hash;
use readerwriter::{Decodable, Encodable, ExactSizeEncodable, ReadError, Reader, WriteError, Writer};

use crate::errors::UtreexoError;
use crate::position::{num_roots, MAX_LEAVES};
use crate::proof::Proof;
use crate::stump::Stump;

impl Encodable for Proof {
    /// Encodes the proof as length-prefixed targets followed by length-prefixed hashes.
    ///
    /// ```ascii
    ///    +----------------+-------------+-----+---------------+----------+-----
    ///    | n targets: u64 | target: u64 | ... | n hashes: u64 | 32 bytes | ...
    ///    +----------------+-------------+-----+---------------+----------+-----
    /// ```
    fn encode(&self, w: &mut impl Writer) -> Result<(), WriteError> {
        w.write_vec(b"targets", &self.targets, |w, t| w.write_u64(b"target", *t))?;
        w.write_vec(b"hashes", &self.hashes, |w, h| h.encode(w))
    }
}

impl ExactSizeEncodable for Proof {
    fn encoded_size(&self) -> usize {
        8 + 8 * self.targets.len() + 8 + 32 * self.hashes.len()
    }
}

impl Decodable for Proof {
    fn decode(reader: &mut impl Reader) -> Result<Self, ReadError> {
        let n = reader.read_count(8)?;
        let targets = reader.read_vec(n, |r| r.read_u64())?;
        let n = reader.read_count(32)?;
        let hashes = reader.read_vec(n, |r| Hash::decode(r))?;
        Ok(Proof { targets, hashes })
    }
}

impl Encodable for Stump {
    /// Encodes the number of leaves followed by the length-prefixed roots.
    fn encode(&self, w: &mut impl Writer) -> Result<(), WriteError> {
        w.write_u64(b"num_leaves", self.num_leaves)?;
        w.write_vec(b"roots", &self.roots, |w, h| h.encode(w))
    }
}

impl ExactSizeEncodable for Stump {
    fn encoded_size(&self) -> usize {
        8 + 8 + 32 * self.roots.len()
    }
}

impl Decodable for Stump {
    fn decode(reader: &mut impl Reader) -> Result<Self, ReadError> {
        let num_leaves = reader.read_u64()?;
        let n = reader.read_count(32)?;
        if num_leaves > MAX_LEAVES || n != num_roots(num_leaves) {
            return Err(ReadError::InvalidFormat);
        }
        let roots = reader.read_vec(n, |r| Hash::decode(r))?;
        Ok(Stump { roots, num_leaves })
    }
}

impl Proof {
    /// Serializes the proof into a byte string.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Parses the proof from a byte string, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UtreexoError> {
        Ok(Self::decode_exact(bytes)?)
    }
}

impl Stump {
    /// Serializes the stump into a byte string.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Parses the stump from a byte string, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UtreexoError> {
        Ok(Self::decode_exact(bytes)?)
    }
}

macro_rules! serde_as_bytes {
    ($type:ident, $expecting:expr) => {
        impl Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_bytes(&self.to_bytes()[..])
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                struct BytesVisitor;

                impl<'de> Visitor<'de> for BytesVisitor {
                    type Value = $type;

                    fn expecting(&self, formatter: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_bytes<E>(self, v: &[u8]) -> Result<$type, E>
                    where
                        E: serde::de::Error,
                    {
                        $type::from_bytes(v).map_err(serde::de::Error::custom)
                    }

                    fn visit_seq<A>(self, mut seq: A) -> Result<$type, A::Error>
                    where
                        A: SeqAccess<'de>,
                    {
                        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
                        while let Some(byte) = seq.next_element::<u8>()? {
                            bytes.push(byte);
                        }
                        $type::from_bytes(&bytes).map_err(serde::de::Error::custom)
                    }
                }

                deserializer.deserialize_bytes(BytesVisitor)
            }
        }
    };
}

serde_as_bytes!(Proof, "a valid utreexo proof");
serde_as_bytes!(Stump, "a valid utreexo stump");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_proof() {
        let proof = Proof::default();
        let bytes = proof.to_bytes();
        assert_eq!(hex::encode(&bytes), "00000000000000000000000000000000");
        assert_eq!(Proof::from_bytes(&bytes), Ok(proof));
    }

    #[test]
    fn proof_layout() {
        let proof = Proof::new(vec![1, 258], vec![Hash([0xab; 32])]);
        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), proof.encoded_size());
        assert_eq!(
            hex::encode(&bytes[..32]),
            "0200000000000000010000000000000002010000000000000100000000000000"
        );
        assert_eq!(&bytes[32..], &[0xab; 32][..]);
        assert_eq!(Proof::from_bytes(&bytes), Ok(proof));
    }

    #[test]
    fn malformed_proofs() {
        let proof = Proof::new(vec![0, 3], vec![Hash([1; 32]), Hash([2; 32])]);
        let bytes = proof.to_bytes();

        // truncated in the middle of the second hash
        assert_eq!(
            Proof::from_bytes(&bytes[..bytes.len() - 10]),
            Err(UtreexoError::ParseError(ReadError::InsufficientBytes))
        );

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(
            Proof::from_bytes(&trailing),
            Err(UtreexoError::ParseError(ReadError::TrailingBytes))
        );

        // declared count far beyond the buffer
        let mut huge = vec![0xff; 8];
        huge.extend_from_slice(&[0u8; 16]);
        assert_eq!(
            Proof::from_bytes(&huge),
            Err(UtreexoError::ParseError(ReadError::InsufficientBytes))
        );

        assert!(Proof::from_bytes(&[]).is_err());
    }

    #[test]
    fn stumps() {
        let stump = Stump::new_with(3, vec![Hash([1; 32]), Hash([2; 32])]).unwrap();
        let bytes = stump.to_bytes();
        assert_eq!(bytes.len(), 8 + 8 + 64);
        assert_eq!(Stump::from_bytes(&bytes), Ok(stump));

        assert_eq!(
            Stump::from_bytes(&Stump::new().to_bytes()),
            Ok(Stump::new())
        );

        // 3 leaves need 2 roots
        let mut wrong = 3u64.to_le_bytes().to_vec();
        wrong.extend_from_slice(&1u64.to_le_bytes());
        wrong.extend_from_slice(&[1u8; 32]);
        assert_eq!(
            Stump::from_bytes(&wrong),
            Err(UtreexoError::ParseError(ReadError::InvalidFormat))
        );
    }

    #[test]
    fn serde() {
        let proof = Proof::new(vec![5], vec![Hash([9; 32])]);
        let json = serde_json::to_string(&proof).unwrap();
        assert_eq!(serde_json::from_str::<Proof>(&json).unwrap(), proof);

        let stump = Stump::new_with(1, vec![Hash([4; 32])]).unwrap();
        let json = serde_json::to_string(&stump).unwrap();
        assert_eq!(serde_json::from_str::<Stump>(&json).unwrap(), stump);

        assert!(serde_json::from_str::<Stump>("[1, 2, 3]").is_err());
    }
}
