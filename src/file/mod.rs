//! Input acquisition for compiled modules.
//!
//! This module abstracts over the places a compiled module can come from (a file on disk or a
//! buffer already in memory) and hands the decoding pipeline one owned, contiguous byte buffer.
//!
//! # Architecture
//!
//! - **Scoped acquisition** - File handles and mappings are released before decoding starts
//! - **Parsing infrastructure** - The bounds-checked cursor every decoding stage reads through
//!
//! # Key Components
//!
//! ## Core Types
//! - [`crate::file::File`] - An acquired input buffer
//! - [`crate::file::physical::Physical`] - Memory-mapped view of a file on disk
//!
//! ## Parsing Infrastructure
//! - [`crate::file::parser::Parser`] - Cursor used by the header, object and bytecode decoders
//! - [`crate::file::io`] - Little-endian primitive readers
//!
//! # Examples
//!
//! ```rust,no_run
//! use pycscope::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("__pycache__/module.cpython-37.pyc"))?;
//! println!("Magic: {:02X?}", &file.data()[..4]);
//! # Ok::<(), pycscope::Error>(())
//! ```

pub mod io;
pub mod parser;

mod physical;

use std::path::Path;

use crate::{Error::MissingFile, Result};

pub use physical::Physical;

/// An acquired compiled module buffer.
///
/// A `File` always owns its bytes. Loading from disk maps the file, copies the content and
/// releases the mapping and the handle before returning, so no OS resource outlives
/// acquisition.
///
/// # Examples
///
/// ```rust
/// use pycscope::File;
///
/// let file = File::from_mem(vec![0x42, 0x0D, 0x0D, 0x0A]);
/// assert_eq!(file.data(), &[0x42, 0x0D, 0x0D, 0x0A]);
/// ```
pub struct File {
    data: Vec<u8>,
}

impl File {
    /// Loads a compiled module from the given path.
    ///
    /// # Arguments
    ///
    /// * `file` - Path to the module on disk.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingFile`] if the path does not exist and
    /// [`crate::Error::FileError`] if it cannot be opened or mapped.
    pub fn from_file(file: &Path) -> Result<File> {
        if !file.exists() {
            return Err(MissingFile(file.to_path_buf()));
        }

        let data = Physical::new(file)?.into_data();

        log::debug!("acquired {} bytes from {}", data.len(), file.display());

        Ok(File { data })
    }

    /// Wraps a buffer that is already in memory.
    ///
    /// # Arguments
    ///
    /// * `data` - The bytes of the compiled module. Size validation happens in the header parser.
    #[must_use]
    pub fn from_mem(data: Vec<u8>) -> File {
        File { data }
    }

    /// Returns the complete file content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;

    #[test]
    fn load_buffer() {
        let file = File::from_mem(vec![0x42, 0x0D, 0x0D, 0x0A, 0x00]);
        assert_eq!(file.data(), &[0x42, 0x0D, 0x0D, 0x0A, 0x00]);

        assert!(File::from_mem(Vec::new()).data().is_empty());
    }

    #[test]
    fn load_file() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(&[0x42, 0x0D, 0x0D, 0x0A, 0x01, 0x02]).unwrap();
        temp.flush().unwrap();

        let file = File::from_file(temp.path()).unwrap();
        assert_eq!(file.data(), &[0x42, 0x0D, 0x0D, 0x0A, 0x01, 0x02]);
    }

    #[test]
    fn load_missing() {
        let path = Path::new("/nonexistent/path/module.pyc");
        match File::from_file(path) {
            Err(Error::MissingFile(missing)) => assert_eq!(missing, path),
            _ => panic!("Expected MissingFile"),
        }
    }
}
