// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # pycscope
//!
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/pycscope/blob/main/LICENSE-APACHE)
//!
//! An offline disassembler for CPython 3.7 compiled modules (`.pyc`). Built in pure Rust,
//! `pycscope` decodes the module header, the serialized object tree and the wordcode of every
//! code unit without requiring a Python interpreter or the original source.
//!
//! ## Features
//!
//! - **Header validation** - PEP 552 headers, timestamp and hash-based invalidation
//! - **Complete object decoding** - Every marshal tag, including shared objects and back-references
//! - **Nested code discovery** - Functions, classes, lambdas and comprehensions in pre-order
//! - **`dis`-compatible output** - Operand representations, line starts and jump targets
//! - **Memory safe** - Bounds-checked parsing and a nesting limit for hostile inputs
//!
//! ## Quick Start
//!
//! ### Using the Prelude
//!
//! ```rust,no_run
//! use pycscope::prelude::*;
//!
//! let module = CompiledModule::from_path("__pycache__/module.cpython-37.pyc")?;
//! println!("Found {} code units", module.listing().len());
//! # Ok::<(), pycscope::Error>(())
//! ```
//!
//! ### Basic Usage
//!
//! ```rust,no_run
//! use pycscope::CompiledModule;
//!
//! let module = CompiledModule::from_path("__pycache__/module.cpython-37.pyc")?;
//!
//! // Module facts
//! println!("{}", module.summary());
//!
//! // Every code unit, root first
//! for entry in module.listing() {
//!     println!("Disassembly of {} (line {}):", entry.name, entry.first_line);
//!     for instruction in &entry.instructions {
//!         let marker = if instruction.is_jump_target { ">>" } else { "  " };
//!         println!("{marker} {instruction}");
//!     }
//! }
//! # Ok::<(), pycscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Decoding runs as a pipeline, each stage in its own module:
//!
//! - [`pyc::header`] - The fixed 16 byte header
//! - [`pyc::marshal`] - The serialized object tree, producing [`CodeUnit`]s and [`Value`]s
//! - [`listing::walker`] - Discovery of nested code units
//! - [`disassembler`] - Wordcode decoding, operand resolution, line and jump attribution
//! - [`listing`] - The aggregated, addressable result
//!
//! [`CompiledModule`] drives the pipeline; [`DecodeConfig`] tunes it and [`Diagnostics`]
//! collects what it tolerated.
//!
//! ### Memory-based Analysis
//!
//! ```rust,no_run
//! use pycscope::{CompiledModule, DecodeConfig};
//!
//! let data: Vec<u8> = std::fs::read("module.cpython-37.pyc")?;
//! let module = CompiledModule::from_mem_with_config(data, &DecodeConfig::strict())?;
//! println!("{} instructions", module.listing().instruction_count());
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with the location of the fault:
//!
//! ```rust,no_run
//! use pycscope::{CompiledModule, Error};
//!
//! match CompiledModule::from_path("module.cpython-37.pyc") {
//!     Ok(_) => println!("Successfully decoded module"),
//!     Err(Error::TruncatedHeader { len }) => println!("Only {len} header bytes"),
//!     Err(Error::InUnit { unit, name, source }) => println!("Unit #{unit} ({name}): {source}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run compiledmodule --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! ```

#[macro_use]
pub(crate) mod error;


/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use pycscope::prelude::*;
///
/// let module = CompiledModule::from_path("module.cpython-37.pyc")?;
/// let root: &ListingEntry = module.listing().root().unwrap();
/// println!("{} instructions in {}", root.instructions.len(), root.name);
/// # Ok::<(), pycscope::Error>(())
/// ```
pub mod prelude;

pub mod compiledmodule;
pub mod config;
pub mod diagnostics;
pub mod disassembler;
pub mod file;
pub mod listing;
pub mod pyc;
pub mod summary;

/// `pycscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use pycscope::{Result, CompiledModule};
///
/// fn unit_count(path: &str) -> Result<usize> {
///     Ok(CompiledModule::from_path(path)?.listing().len())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `pycscope` Error type
///
/// The main error type for all operations in this crate. See the variants for the failure
/// classes of each decoding stage.
pub use error::Error;

/// The main entry point, a fully decoded compiled module
pub use compiledmodule::CompiledModule;

/// Decode settings and their presets
pub use config::DecodeConfig;

/// Non-fatal findings of a decode
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};

/// The decoded listing
pub use listing::{DisassemblyListing, ListingEntry, UnitId};

/// Decoded header and object tree types
pub use pyc::{CodeFlags, CodeUnit, HeaderMetadata, PycFlags, SourceStamp, Value};

/// Module-level facts
pub use summary::ModuleSummary;

/// Provides access to low-level file and memory parsing utilities.
///
/// The [`Parser`] type is the cursor every decoding stage reads through; it is exposed for
/// callers that decode instruction streams themselves.
///
/// # Example
///
/// ```rust
/// use pycscope::Parser;
///
/// let code = [100, 0, 83, 0];
/// let mut parser = Parser::new(&code);
/// let opcode = parser.read_le::<u8>()?;
/// assert_eq!(opcode, 100);
/// # Ok::<(), pycscope::Error>(())
/// ```
pub use file::{parser::Parser, File};
