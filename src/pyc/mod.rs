//! The compiled module container format.
//!
//! A compiled module is a fixed 16 byte header followed by one marshal-serialized object, the
//! module's top-level code unit. This module provides the pieces that turn those bytes into an
//! in-memory tree:
//!
//! - [`header`] - [`HeaderMetadata`], the magic, flag word and source stamp
//! - [`marshal`] - [`ObjectReader`], the object tree decoder
//! - [`Value`] - Decoded objects, including [`CodeUnit`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use pycscope::pyc::{HeaderMetadata, ObjectReader};
//!
//! let data = std::fs::read("__pycache__/module.cpython-37.pyc")?;
//! let header = HeaderMetadata::read(&data)?;
//! let root = ObjectReader::new(&data[header.payload_offset()..], header.payload_offset())
//!     .read_root()?;
//!
//! println!("{} in {}", root.name, root.filename);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod code;
pub mod header;
pub mod marshal;
mod value;

pub use code::{CodeFlags, CodeUnit};
pub use header::{HeaderLayout, HeaderMetadata, PycFlags, SourceStamp};
pub use marshal::ObjectReader;
pub use value::{PyLong, Value};
