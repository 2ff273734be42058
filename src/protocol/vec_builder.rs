use std::io::Read;

use crate::protocol::traits::ReadError;

/// Initial allocation granted to a length-prefixed collection.
///
/// Length prefixes come straight off the wire, so they must not drive
/// allocations directly. Memory grows in steps of this size while the actual
/// data is read.
const BLOCK_SIZE: usize = 1024 * 1024;

/// Helper to build a vector from wire data without trusting the length prefix.
#[derive(Debug)]
pub struct VecBuilder<T> {
    inner: Vec<T>,
    remaining: usize,
}

impl<T> VecBuilder<T> {
    /// Create a new builder for `len` elements.
    pub fn new(len: usize) -> Self {
        Self {
            inner: Vec::with_capacity(Self::next_batch_size(len)),
            remaining: len,
        }
    }

    fn next_batch_size(remaining: usize) -> usize {
        remaining.min(BLOCK_SIZE / std::mem::size_of::<T>().max(1))
    }

    pub fn push(&mut self, value: T) {
        assert!(self.remaining > 0);
        self.remaining -= 1;

        if self.inner.len() == self.inner.capacity() {
            self.inner.reserve(Self::next_batch_size(self.remaining + 1));
        }
        self.inner.push(value);
    }
}

impl VecBuilder<u8> {
    /// Fill the builder from `reader`, growing block-wise up to the declared length.
    pub fn read_exact<R>(mut self, reader: &mut R) -> Result<Self, ReadError>
    where
        R: Read,
    {
        while self.remaining > 0 {
            let step = Self::next_batch_size(self.remaining);
            let start = self.inner.len();
            self.inner.resize(start + step, 0);
            reader.read_exact(&mut self.inner[start..])?;
            self.remaining -= step;
        }
        Ok(self)
    }
}

impl<T> From<VecBuilder<T>> for Vec<T> {
    fn from(builder: VecBuilder<T>) -> Self {
        builder.inner
    }
}
