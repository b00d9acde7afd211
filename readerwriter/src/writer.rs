use core::fmt;
use core::mem;

/// Error kinds returned by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The destination cannot hold the bytes being written.
    InsufficientCapacity,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::InsufficientCapacity => write!(f, "insufficient capacity"),
        }
    }
}

impl std::error::Error for WriteError {}

/// Interface for writing binary data.
///
/// Every write carries a label: binary buffers ignore it,
/// while transcripts use it for domain separation.
pub trait Writer {
    /// Writes bytes with the given label. If there is no sufficient capacity,
    /// performs no modifications and returns WriteError::InsufficientCapacity.
    fn write(&mut self, label: &'static [u8], src: &[u8]) -> Result<(), WriteError>;

    /// Remaining number of bytes that can be written.
    fn remaining_capacity(&self) -> usize;

    /// Writes a single byte.
    #[inline]
    fn write_u8(&mut self, label: &'static [u8], x: u8) -> Result<(), WriteError> {
        self.write(label, &[x])
    }

    /// Writes a LE32-encoded integer.
    #[inline]
    fn write_u32(&mut self, label: &'static [u8], x: u32) -> Result<(), WriteError> {
        self.write(label, &x.to_le_bytes())
    }

    /// Writes a LE64-encoded integer.
    #[inline]
    fn write_u64(&mut self, label: &'static [u8], x: u64) -> Result<(), WriteError> {
        self.write(label, &x.to_le_bytes())
    }

    /// Writes a LE64 length prefix followed by each item encoded by the closure.
    #[inline]
    fn write_vec<T, F>(
        &mut self,
        label: &'static [u8],
        items: &[T],
        mut closure: F,
    ) -> Result<(), WriteError>
    where
        Self: Sized,
        F: FnMut(&mut Self, &T) -> Result<(), WriteError>,
    {
        self.write_u64(label, items.len() as u64)?;
        for item in items.iter() {
            closure(self, item)?;
        }
        Ok(())
    }
}

impl Writer for Vec<u8> {
    #[inline]
    fn write(&mut self, _label: &'static [u8], src: &[u8]) -> Result<(), WriteError> {
        self.extend_from_slice(src);
        Ok(())
    }

    #[inline]
    fn write_u8(&mut self, _label: &'static [u8], x: u8) -> Result<(), WriteError> {
        self.push(x);
        Ok(())
    }

    #[inline]
    fn remaining_capacity(&self) -> usize {
        usize::max_value()
    }
}

impl Writer for &mut [u8] {
    #[inline]
    fn write(&mut self, _label: &'static [u8], src: &[u8]) -> Result<(), WriteError> {
        let n = src.len();
        if n > self.remaining_capacity() {
            return Err(WriteError::InsufficientCapacity);
        }
        let (a, b) = mem::take(self).split_at_mut(n);
        a.copy_from_slice(src);
        *self = b;
        Ok(())
    }

    #[inline]
    fn remaining_capacity(&self) -> usize {
        self.len()
    }
}
