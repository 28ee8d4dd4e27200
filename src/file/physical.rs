//! Memory-mapped access to files on disk.
//!
//! [`crate::file::physical::Physical`] maps a file read-only into the process's address space,
//! which makes acquiring even large modules cheap.
//!
//! A mapping is never held across a decode. [`crate::file::File::from_file`] copies the mapped
//! bytes out through [`crate::file::physical::Physical::into_data`], which drops the mapping
//! together with the underlying handle before any parsing starts.

use crate::{Error::FileError, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A read-only memory mapping of a file on disk.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Create a new physical file by memory-mapping the specified file.
    ///
    /// # Arguments
    /// * `path` - Path to the file on disk. Accepts `&Path`, `&str`, `String`, or `PathBuf`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;

        // The mapping is read-only and copied out before the handle is dropped
        let mmap = unsafe { Mmap::map(&file) }.map_err(FileError)?;

        Ok(Physical { data: mmap })
    }

    /// Copies the mapped content into an owned buffer and unmaps the file.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data.to_vec()
    }
}
