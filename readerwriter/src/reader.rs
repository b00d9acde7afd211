use byteorder::{ByteOrder, LittleEndian};
use core::fmt;

/// Error kinds returns by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Not enough bytes left to read the requested item.
    InsufficientBytes,
    /// Some bytes were left unread after parsing.
    TrailingBytes,
    /// Bytes were read, but they do not form a valid item.
    InvalidFormat,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::InsufficientBytes => write!(f, "insufficient bytes"),
            ReadError::TrailingBytes => write!(f, "unexpected trailing bytes"),
            ReadError::InvalidFormat => write!(f, "invalid format"),
        }
    }
}

impl std::error::Error for ReadError {}

/// An interface for reading binary data.
pub trait Reader {
    /// Copies bytes into a slice. If there is not enough bytes available,
    /// does not consume any byte and returns ReadError::InsufficientBytes.
    fn read(&mut self, dst: &mut [u8]) -> Result<(), ReadError>;

    /// Returns remaining number of bytes available for reading.
    fn remaining_bytes(&self) -> usize;

    /// Wraps the reading logic in a block that checks that all bytes have been read.
    /// If some are left unread, returns `Err(From<ReadError::TrailingBytes>)`.
    #[inline]
    fn parse<F, T, E>(&mut self, parse_fn: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<ReadError>,
    {
        let result = parse_fn(self)?;
        if self.remaining_bytes() != 0 {
            return Err(ReadError::TrailingBytes.into());
        }
        Ok(result)
    }

    /// Reads a single byte.
    #[inline]
    fn read_u8(&mut self) -> Result<u8, ReadError> {
        let mut buf = [0u8; 1];
        self.read(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a 4-byte LE32 integer.
    #[inline]
    fn read_u32(&mut self) -> Result<u32, ReadError> {
        let mut buf = [0u8; 4];
        self.read(&mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Reads an 8-byte LE64 integer.
    #[inline]
    fn read_u64(&mut self) -> Result<u64, ReadError> {
        let mut buf = [0u8; 8];
        self.read(&mut buf)?;
        Ok(LittleEndian::read_u64(&buf))
    }

    /// Reads a 32-byte string.
    #[inline]
    fn read_u8x32(&mut self) -> Result<[u8; 32], ReadError> {
        let mut buf = [0u8; 32];
        self.read(&mut buf)?;
        Ok(buf)
    }

    /// Reads an LE64-encoded count of items of `item_size` bytes each.
    /// Fails without allocating anything if the remaining input
    /// cannot possibly hold that many items.
    #[inline]
    fn read_count(&mut self, item_size: usize) -> Result<usize, ReadError> {
        let n = self.read_u64()?;
        let max = (self.remaining_bytes() / item_size.max(1)) as u64;
        if n > max {
            return Err(ReadError::InsufficientBytes);
        }
        Ok(n as usize)
    }

    /// Reads a vector of items with a provided closure that reads a single item.
    #[inline]
    fn read_vec<T, F, E>(&mut self, len: usize, closure: F) -> Result<Vec<T>, E>
    where
        Self: Sized,
        F: Fn(&mut Self) -> Result<T, E>,
        E: From<ReadError>,
    {
        // the buffer cannot hold more items than it has bytes
        let mut vec = Vec::with_capacity(len.min(self.remaining_bytes()));
        for _ in 0..len {
            vec.push(closure(self)?);
        }
        Ok(vec)
    }
}

impl Reader for &[u8] {
    #[inline]
    fn read(&mut self, dst: &mut [u8]) -> Result<(), ReadError> {
        let n = dst.len();
        if n <= self.len() {
            let (a, b) = (*self).split_at(n);
            dst.copy_from_slice(a);
            *self = b;
            Ok(())
        } else {
            Err(ReadError::InsufficientBytes)
        }
    }

    #[inline]
    fn remaining_bytes(&self) -> usize {
        self.len()
    }
}
