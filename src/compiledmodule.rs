//! The decoded compiled module.
//!
//! [`CompiledModule`] is the entry point of the library. Constructing one runs the whole
//! pipeline over a single input: the header is parsed and validated, the serialized object tree
//! is decoded, and every code unit reachable from the root is disassembled into a
//! [`DisassemblyListing`]. The result is immutable; nothing is decoded lazily.
//!
//! # Architecture
//!
//! - **Scoped acquisition**: the input is read (or memory-mapped) and its bytes are copied out
//!   before decoding starts; no file handle or mapping outlives the constructor
//! - **Fail fast**: every error except a tolerated magic mismatch aborts the decode, no partial
//!   listing is returned
//! - **Diagnostics**: non-fatal findings are collected in [`Diagnostics`] next to the result
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pycscope::CompiledModule;
//!
//! let module = CompiledModule::from_path("__pycache__/module.cpython-37.pyc")?;
//! println!("{}", module.summary());
//!
//! for entry in module.listing() {
//!     println!("Disassembly of {} ({})", entry.name, entry.id);
//!     for instruction in &entry.instructions {
//!         println!("{instruction}");
//!     }
//! }
//!
//! if module.diagnostics().has_warnings() {
//!     eprintln!("{}", module.diagnostics().summary());
//! }
//! # Ok::<(), pycscope::Error>(())
//! ```
//!
//! ## Batch Decoding
//!
//! ```rust,no_run
//! use pycscope::{CompiledModule, DecodeConfig};
//!
//! let paths = ["a.cpython-37.pyc", "b.cpython-37.pyc"];
//! let results = CompiledModule::from_paths(&paths, &DecodeConfig::default());
//! for (path, result) in paths.iter().zip(results) {
//!     match result {
//!         Ok(module) => println!("{path}: {} units", module.listing().len()),
//!         Err(error) => eprintln!("{path}: {error}"),
//!     }
//! }
//! ```
//!
//! # Thread Safety
//!
//! [`CompiledModule`] is [`std::marker::Send`] and [`std::marker::Sync`]. Every decode owns its
//! back-reference table, identity counter and diagnostics, so independent inputs can be
//! decoded on separate threads, which is what [`CompiledModule::from_paths`] does.

use std::{path::Path, sync::Arc};

use rayon::prelude::*;

use crate::{
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    file::File,
    listing::{walker, DisassemblyListing},
    pyc::{CodeUnit, HeaderMetadata, ObjectReader},
    summary::ModuleSummary,
    DecodeConfig,
    Error::OutOfBounds,
    Result,
};

/// A fully decoded compiled module
#[derive(Debug)]
pub struct CompiledModule {
    header: HeaderMetadata,
    root: Arc<CodeUnit>,
    listing: DisassemblyListing,
    diagnostics: Diagnostics,
}

impl CompiledModule {
    /// Decodes a compiled module from disk with the default configuration.
    ///
    /// # Arguments
    /// * `path` - Path to the `.pyc` file
    ///
    /// # Errors
    /// Returns [`crate::Error::MissingFile`] if the path does not exist,
    /// [`crate::Error::FileError`] if it cannot be read, and any decode error of
    /// [`CompiledModule::from_mem_with_config`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_path_with_config(path, &DecodeConfig::default())
    }

    /// Decodes a compiled module from disk.
    ///
    /// # Arguments
    /// * `path`   - Path to the `.pyc` file
    /// * `config` - Decode settings
    ///
    /// # Errors
    /// See [`CompiledModule::from_path`].
    pub fn from_path_with_config(path: impl AsRef<Path>, config: &DecodeConfig) -> Result<Self> {
        Self::load(&File::from_file(path.as_ref())?, config)
    }

    /// Decodes a compiled module held in memory with the default configuration.
    ///
    /// # Arguments
    /// * `data` - The complete module, header included
    ///
    /// # Errors
    /// See [`CompiledModule::from_mem_with_config`].
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::from_mem_with_config(data, &DecodeConfig::default())
    }

    /// Decodes a compiled module held in memory.
    ///
    /// # Arguments
    /// * `data`   - The complete module, header included
    /// * `config` - Decode settings
    ///
    /// # Errors
    /// - [`crate::Error::TruncatedHeader`] if fewer than 16 bytes are given
    /// - [`crate::Error::MagicMismatch`] on a foreign magic token, if configured as fatal
    /// - [`crate::Error::MalformedObject`] or [`crate::Error::RecursionLimit`] if the object
    ///   tree cannot be decoded
    /// - [`crate::Error::UnexpectedRootType`] if the root object is not a code unit
    /// - [`crate::Error::InUnit`] if a code unit's instructions cannot be decoded
    pub fn from_mem_with_config(data: Vec<u8>, config: &DecodeConfig) -> Result<Self> {
        Self::load(&File::from_mem(data), config)
    }

    /// Decodes several compiled modules in parallel.
    ///
    /// Every input is decoded independently; the results are returned in input order.
    ///
    /// # Arguments
    /// * `paths`  - The `.pyc` files to decode
    /// * `config` - Decode settings shared by all inputs
    pub fn from_paths<P>(paths: &[P], config: &DecodeConfig) -> Vec<Result<Self>>
    where
        P: AsRef<Path> + Sync,
    {
        paths
            .par_iter()
            .map(|path| Self::from_path_with_config(path, config))
            .collect()
    }

    fn load(file: &File, config: &DecodeConfig) -> Result<Self> {
        let diagnostics = Diagnostics::new();
        let data = file.data();

        let header = HeaderMetadata::read(data)?;
        header.validate(config, &diagnostics)?;

        let payload_offset = header.payload_offset();
        let payload = data.get(payload_offset..).ok_or(OutOfBounds)?;

        let mut reader =
            ObjectReader::new(payload, payload_offset).with_max_depth(config.max_nesting_depth);
        let root = reader.read_root()?;

        if reader.remaining() > 0 {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticSeverity::Info,
                    DiagnosticCategory::Marshal,
                    format!(
                        "{} trailing bytes after the root object",
                        reader.remaining()
                    ),
                )
                .with_offset(reader.position()),
            );
        }

        log::debug!(
            "Decoded object tree of {} ({} bytes, {} shared objects)",
            root.filename,
            data.len(),
            reader.ref_count()
        );

        let listing = walker::walk(&root, config, &diagnostics)?;

        Ok(CompiledModule {
            header,
            root,
            listing,
            diagnostics,
        })
    }

    /// The parsed header
    #[must_use]
    pub fn header(&self) -> &HeaderMetadata {
        &self.header
    }

    /// The module's top-level code unit
    #[must_use]
    pub fn root(&self) -> &CodeUnit {
        &self.root
    }

    /// The decoded listing of every code unit
    #[must_use]
    pub fn listing(&self) -> &DisassemblyListing {
        &self.listing
    }

    /// Non-fatal findings of the decode
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Header and root unit facts
    #[must_use]
    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary::new(&self.header, &self.root, &self.listing)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{
        disassembler::Argument,
        pyc::Value,
        test::builder::{minimal_module, op, CodeBuilder, Obj, PycBuilder},
        Error,
    };

    #[test]
    fn minimal() {
        let module = CompiledModule::from_mem(PycBuilder::new(minimal_module()).build()).unwrap();

        assert_eq!(module.header().payload_offset(), 16);
        assert_eq!(module.root().name, "<module>");
        assert_eq!(module.listing().len(), 1);

        let entry = module.listing().root().unwrap();
        assert_eq!(entry.instructions[0].argval, Some(Argument::Const(Value::None)));
        assert!(!module.diagnostics().has_any());
    }

    #[test]
    fn magic_policy() {
        let data = PycBuilder::new(minimal_module())
            .magic([0x33, 0x0D, 0x0D, 0x0A])
            .build();

        let module = CompiledModule::from_mem(data.clone()).unwrap();
        assert!(module.diagnostics().has_warnings());
        assert_eq!(
            module.diagnostics().by_category(DiagnosticCategory::Header).len(),
            1
        );

        assert!(matches!(
            CompiledModule::from_mem_with_config(data.clone(), &DecodeConfig::strict()),
            Err(Error::MagicMismatch { .. })
        ));

        let module = CompiledModule::from_mem_with_config(data, &DecodeConfig::lenient()).unwrap();
        assert!(!module.diagnostics().has_any());
    }

    #[test]
    fn trailing_bytes() {
        let data = PycBuilder::new(minimal_module()).trailing(&[0, 0, 0]).build();
        let module = CompiledModule::from_mem(data).unwrap();

        let trailing = module.diagnostics().by_category(DiagnosticCategory::Marshal);
        assert_eq!(trailing.len(), 1);
        assert_eq!(trailing[0].severity, DiagnosticSeverity::Info);
        assert_eq!(trailing[0].offset, Some(module_len(&minimal_module())));
    }

    fn module_len(root: &CodeBuilder) -> usize {
        16 + root.serialize().len()
    }

    #[test]
    fn nesting_limit() {
        let mut nested = Obj::None;
        for _ in 0..20 {
            nested = Obj::Tuple(vec![nested]);
        }
        let data = PycBuilder::new(minimal_module().consts(vec![nested])).build();

        let config = DecodeConfig::default().with_max_nesting_depth(8);
        assert!(matches!(
            CompiledModule::from_mem_with_config(data.clone(), &config),
            Err(Error::RecursionLimit(8))
        ));
        assert!(CompiledModule::from_mem(data).is_ok());
    }

    #[test]
    fn from_disk() {
        let root = CodeBuilder::new("<module>")
            .code(&[op::LOAD_CONST, 0, op::RETURN_VALUE, 0])
            .consts(vec![Obj::code(minimal_module()), Obj::None]);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&PycBuilder::new(root).build()).unwrap();
        file.flush().unwrap();

        let module = CompiledModule::from_path(file.path()).unwrap();
        assert_eq!(module.listing().len(), 2);

        let missing = file.path().with_extension("missing");
        let results = CompiledModule::from_paths(
            &[file.path().to_path_buf(), missing],
            &DecodeConfig::default(),
        );
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::MissingFile(_))));
    }
}
