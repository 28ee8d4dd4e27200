//! Low-level byte stream parser for compiled module decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser used by every decoding stage: the header reader, the marshal object reader and the
//! bytecode decoder. It offers bounds-checked access to binary data and never moves backwards
//! on its own, which is what lets the object reader guarantee strict left-to-right decoding.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a raw slice of the input
//! - [`crate::file::parser::Parser::remaining`] - Count the bytes left after the cursor
//! - [`crate::file::parser::Parser::pos`] - Get the current position
//!
//! # Usage Examples
//!
//! ```rust
//! use pycscope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read_le::<u16>()?;
//! assert_eq!(value, 0x0201);
//!
//! let rest = parser.read_bytes(3)?;
//! assert_eq!(rest, &[0x03, 0x04, 0x05]);
//! assert!(!parser.has_more_data());
//! # Ok::<(), pycscope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, PycIO},
    Error::OutOfBounds,
    Result,
};

/// A cursor over a borrowed byte slice.
///
/// `Parser` maintains an internal position and provides bounds checking to prevent buffer
/// overruns when reading malformed or truncated data. A failed read leaves the position
/// unchanged.
///
/// # Examples
///
/// ```rust
/// use pycscope::Parser;
///
/// // One wordcode instruction: LOAD_CONST 0
/// let data = [100, 0];
/// let mut parser = Parser::new(&data);
///
/// let opcode = parser.read_le::<u8>()?;
/// let arg = parser.read_le::<u8>()?;
/// assert_eq!((opcode, arg), (100, 0));
/// # Ok::<(), pycscope::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns `true` if there is more data available to parse.
    ///
    /// ```rust
    /// use pycscope::Parser;
    /// let data = [0x01];
    /// let mut parser = Parser::new(&data);
    /// assert!(parser.has_more_data());
    ///
    /// let _byte = parser.read_le::<u8>()?;
    /// assert!(!parser.has_more_data());
    /// # Ok::<(), pycscope::Error>(())
    /// ```
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: PycIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Reads a slice of bytes of the specified length from the current position.
    ///
    /// # Arguments
    /// * `length` - The number of bytes to read
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `length` bytes would exceed the data.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(length).ok_or(OutOfBounds)?;
        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u32>().unwrap(), 0x0403_0201);
        assert_eq!(parser.pos(), 4);
        assert_eq!(parser.remaining(), 4);
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0605);
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x07, 0x08]);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn empty() {
        let mut parser = Parser::new(&[]);

        assert!(!parser.has_more_data());
        assert_eq!(parser.remaining(), 0);
        assert!(matches!(parser.read_le::<u8>(), Err(Error::OutOfBounds)));
        assert_eq!(parser.read_bytes(0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn failed_read_keeps_position() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);
        parser.read_le::<u8>().unwrap();

        assert!(matches!(parser.read_le::<u32>(), Err(Error::OutOfBounds)));
        assert_eq!(parser.pos(), 1);

        assert!(matches!(parser.read_bytes(3), Err(Error::OutOfBounds)));
        assert_eq!(parser.pos(), 1);

        assert!(matches!(parser.read_bytes(usize::MAX), Err(Error::OutOfBounds)));
    }
}
