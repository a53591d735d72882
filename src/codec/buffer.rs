use std::mem;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width value that can be stored in a [`SerializationBuffer`].
///
/// Every value is encoded little-endian regardless of the host, so files
/// written on one platform decode identically on any other.
pub trait Primitive: sealed::Sealed + Copy + Default {
    const SIZE: usize;

    fn encode(self, out: &mut [u8]);
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! le_primitive {
    ($($ty:ty => $read:ident, $write:ident;)*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const SIZE: usize = mem::size_of::<$ty>();

                fn encode(self, out: &mut [u8]) {
                    LittleEndian::$write(out, self);
                }

                fn decode(bytes: &[u8]) -> Self {
                    LittleEndian::$read(bytes)
                }
            }
        )*
    };
}

le_primitive! {
    u16 => read_u16, write_u16;
    i16 => read_i16, write_i16;
    u32 => read_u32, write_u32;
    i32 => read_i32, write_i32;
    u64 => read_u64, write_u64;
    i64 => read_i64, write_i64;
    f32 => read_f32, write_f32;
    f64 => read_f64, write_f64;
}

impl sealed::Sealed for u8 {}

impl Primitive for u8 {
    const SIZE: usize = 1;

    fn encode(self, out: &mut [u8]) {
        out[0] = self;
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl sealed::Sealed for i8 {}

impl Primitive for i8 {
    const SIZE: usize = 1;

    fn encode(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }
}

impl sealed::Sealed for bool {}

impl Primitive for bool {
    const SIZE: usize = 1;

    fn encode(self, out: &mut [u8]) {
        out[0] = if self { 1 } else { 0 };
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Growable byte buffer with a read cursor.
///
/// Writes always append. Reads start at the cursor and never move it past the
/// end: an under-read yields the zero value of the requested type and parks
/// the cursor at `len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializationBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl SerializationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity), pos: 0 }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Read a whole file into a fresh buffer with the cursor at the start.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_vec(data))
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.data).map_err(|source| Error::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Move the read cursor back to the first byte.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    /// Advance the cursor by up to `n` bytes, stopping at the end. Returns
    /// how many bytes were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining());
        self.pos += n;
        n
    }

    /// Drop `n` bytes from the front, keeping the cursor on the same byte
    /// (or at the new start if that byte was dropped).
    pub fn erase_front(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.drain(..n);
        self.pos = self.pos.saturating_sub(n);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn put<T: Primitive>(&mut self, value: T) {
        let start = self.data.len();
        self.data.resize(start + T::SIZE, 0);
        value.encode(&mut self.data[start..]);
    }

    pub fn get<T: Primitive>(&mut self) -> T {
        if self.remaining() < T::SIZE {
            self.pos = self.data.len();
            return T::default();
        }
        let value = T::decode(&self.data[self.pos..self.pos + T::SIZE]);
        self.pos += T::SIZE;
        value
    }

    /// Write a string as an `i32` byte length followed by the raw bytes.
    pub fn put_string(&mut self, s: &str) -> Result<()> {
        let len = i32::try_from(s.len()).map_err(|_| Error::StringTooLong {
            len: s.len(),
            max: i32::MAX as usize,
        })?;
        self.put(len);
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    /// Read a length-prefixed string, returning `None` when the prefix is
    /// negative or larger than what is left. Only the prefix is consumed in
    /// that case.
    pub fn get_string_checked(&mut self) -> Option<String> {
        let len = self.get::<i32>();
        if len < 0 {
            return None;
        }
        let len = len as usize;
        if len > self.remaining() {
            return None;
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a length-prefixed string; a corrupt prefix reads as `""`.
    pub fn get_string(&mut self) -> String {
        self.get_string_checked().unwrap_or_default()
    }

    /// Append `payload` preceded by its byte length as a `u32` header.
    pub fn build(&mut self, payload: &SerializationBuffer) -> Result<&mut Self> {
        let len = u32::try_from(payload.len())
            .map_err(|_| Error::PayloadTooLarge { len: payload.len() })?;
        self.put(len);
        self.write_bytes(payload.as_slice());
        Ok(self)
    }
}

impl From<Vec<u8>> for SerializationBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<SerializationBuffer> for Vec<u8> {
    fn from(buffer: SerializationBuffer) -> Self {
        buffer.into_vec()
    }
}
