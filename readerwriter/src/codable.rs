use crate::{ReadError, Reader, WriteError, Writer};

/// A trait for encoding structures using the [Writer] trait.
pub trait Encodable {
    /// Encodes receiver into bytes appending them to a provided writer.
    fn encode(&self, w: &mut impl Writer) -> Result<(), WriteError>;
}

/// An [Encodable] type whose encoding length is known upfront.
pub trait ExactSizeEncodable: Encodable {
    /// Returns precise length in bytes for the serialized representation of the receiver.
    fn encoded_size(&self) -> usize;

    /// Encodes the receiver into a newly allocated vector of bytes.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        self.encode(&mut buf)
            .expect("Writing to a Vec never fails.");
        buf
    }
}

/// A trait for decoding bytes into structure using the [Reader] trait.
pub trait Decodable: Sized {
    /// Decodes bytes into self by reading bytes from reader.
    fn decode(reader: &mut impl Reader) -> Result<Self, ReadError>;

    /// Decodes a complete byte string, failing on any trailing bytes.
    fn decode_exact(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut reader = bytes;
        reader.parse(|r| Self::decode(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair(u32, u64);

    impl Encodable for Pair {
        fn encode(&self, w: &mut impl Writer) -> Result<(), WriteError> {
            w.write_u32(b"a", self.0)?;
            w.write_u64(b"b", self.1)
        }
    }

    impl ExactSizeEncodable for Pair {
        fn encoded_size(&self) -> usize {
            12
        }
    }

    impl Decodable for Pair {
        fn decode(reader: &mut impl Reader) -> Result<Self, ReadError> {
            Ok(Pair(reader.read_u32()?, reader.read_u64()?))
        }
    }

    #[test]
    fn exact_decoding() {
        let bytes = Pair(3, 9).encode_to_vec();
        assert_eq!(bytes.len(), 12);
        assert_eq!(Pair::decode_exact(&bytes), Ok(Pair(3, 9)));
        assert_eq!(
            Pair::decode_exact(&bytes[..11]),
            Err(ReadError::InsufficientBytes)
        );

        let mut longer = bytes.clone();
        longer.push(0);
        assert_eq!(Pair::decode_exact(&longer), Err(ReadError::TrailingBytes));
    }
}
