//! Low-level byte order and safe reading utilities for compiled module parsing.
//!
//! This module provides endian-aware, bounds-checked reading of primitive types from byte
//! buffers. Compiled modules store every fixed-width field in little-endian order, both in the
//! 16 byte header and inside the marshal payload, so only little-endian readers are provided.
//!
//! # Key Components
//!
//! - [`crate::file::io::PycIO`] - Trait defining little-endian decoding for primitive types
//! - [`crate::file::io::read_le_at`] - Read a value at an offset and advance the offset
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use pycscope::file::io::read_le_at;
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;  // offset: 0 -> 2
//! let second: u16 = read_le_at(&data, &mut offset)?; // offset: 2 -> 4
//! let third: u32 = read_le_at(&data, &mut offset)?;  // offset: 4 -> 8
//!
//! assert_eq!((first, second, third), (1, 2, 3));
//! # Ok::<(), pycscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] if there are insufficient bytes in the
//! buffer. Higher layers translate this into the error that fits their context, e.g. the
//! marshal reader reports a truncated payload as [`crate::Error::MalformedObject`].

use crate::{Error::OutOfBounds, Result};

/// Trait for type-specific, safe little-endian decoding.
///
/// Each implementation names the fixed-size byte array it is decoded from through the
/// `Bytes` associated type (e.g. `[u8; 4]` for `u32`).
pub trait PycIO: Sized {
    /// Byte array representation of this type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_pyc_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PycIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_pyc_io!(u8, i8, u16, i16, u32, i32, u64, i64, f64);

/// Safely reads a value of type `T` in little-endian byte order at `offset`.
///
/// On success the offset is advanced by `size_of::<T>()`; on failure it is left untouched.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are not enough bytes left at `offset`.
pub fn read_le_at<T: PycIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    fn read_first<T: PycIO>(data: &[u8]) -> Result<T> {
        let mut offset = 0;
        read_le_at(data, &mut offset)
    }

    #[test]
    fn primitive_widths() {
        assert_eq!(read_first::<u8>(&TEST_BUFFER).unwrap(), 0x01);
        assert_eq!(read_first::<i8>(&[0xFF]).unwrap(), -1);
        assert_eq!(read_first::<u16>(&TEST_BUFFER).unwrap(), 0x0201);
        assert_eq!(read_first::<u32>(&TEST_BUFFER).unwrap(), 0x0403_0201);
        assert_eq!(read_first::<i32>(&[0xFE, 0xFF, 0xFF, 0xFF]).unwrap(), -2);
        assert_eq!(read_first::<u64>(&TEST_BUFFER).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(read_first::<f64>(&1.5_f64.to_le_bytes()).unwrap(), 1.5);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 0;
        assert_eq!(read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap(), 0x0201);
        assert_eq!(offset, 2);
        assert_eq!(read_le_at::<u32>(&TEST_BUFFER, &mut offset).unwrap(), 0x0605_0403);
        assert_eq!(offset, 6);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF, 0xFF];

        assert!(matches!(read_first::<u64>(&buffer), Err(OutOfBounds)));

        let mut offset = 3;
        let result = read_le_at::<u16>(&buffer, &mut offset);
        assert!(matches!(result, Err(OutOfBounds)));
        assert_eq!(offset, 3);
    }

    #[test]
    fn offset_overflow() {
        let mut offset = usize::MAX;
        let result = read_le_at::<u32>(&TEST_BUFFER, &mut offset);
        assert!(matches!(result, Err(OutOfBounds)));
    }
}
