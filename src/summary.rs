//! Module-level facts about a compiled module.
//!
//! [`ModuleSummary`] condenses the header and the root code unit into the handful of values
//! worth showing before a listing: where the module was compiled from, when, and the shape of
//! its top-level code.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    listing::DisassemblyListing,
    pyc::{CodeFlags, CodeUnit, HeaderMetadata},
};

/// Header and root unit facts of one compiled module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSummary {
    /// Source file recorded in the root unit
    pub filename: String,
    /// Modification time of the source at compile time, `None` for hash-based modules
    pub compile_time: Option<DateTime<Utc>>,
    /// Size of the source at compile time, `None` for hash-based modules
    pub source_size: Option<u32>,
    /// Interpreter version word from the magic token
    pub version_word: u16,
    /// Whether the module is invalidated by source hash
    pub hash_based: bool,
    /// Flags of the root unit
    pub flags: CodeFlags,
    /// Stack size of the root unit
    pub stacksize: u32,
    /// First source line of the root unit
    pub first_line: u32,
    /// Keyword-only argument count of the root unit
    pub kwonlyargcount: u32,
    /// Positional argument count of the root unit
    pub argcount: u32,
    /// Local variable count of the root unit
    pub nlocals: u32,
    /// Number of distinct code units in the module
    pub unit_count: usize,
    /// Number of decoded instructions over all units
    pub instruction_count: usize,
    /// `(offset, line)` pairs of the root unit's line starts
    pub line_starts: Vec<(usize, u32)>,
    /// Offsets of the root unit's jump targets
    pub jump_targets: Vec<usize>,
}

impl ModuleSummary {
    /// Collects the summary of a decoded module
    ///
    /// # Arguments
    /// * `header`  - The parsed header
    /// * `root`    - The module's top-level code unit
    /// * `listing` - The decoded listing of the module
    #[must_use]
    pub fn new(header: &HeaderMetadata, root: &CodeUnit, listing: &DisassemblyListing) -> Self {
        let (line_starts, jump_targets) = match listing.root() {
            Some(entry) => (
                entry
                    .instructions
                    .iter()
                    .filter_map(|i| i.starts_line.map(|line| (i.offset, line)))
                    .collect(),
                entry.jump_targets(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        ModuleSummary {
            filename: root.filename.clone(),
            compile_time: header.compile_time(),
            source_size: header.source_size(),
            version_word: header.version_word(),
            hash_based: header.is_hash_based(),
            flags: root.flags,
            stacksize: root.stacksize,
            first_line: root.firstlineno,
            kwonlyargcount: root.kwonlyargcount,
            argcount: root.argcount,
            nlocals: root.nlocals,
            unit_count: listing.len(),
            instruction_count: listing.instruction_count(),
            line_starts,
            jump_targets,
        }
    }
}

impl fmt::Display for ModuleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filename:          {}", self.filename)?;
        match self.compile_time {
            Some(time) => writeln!(f, "Compile time:      {}", time.format("%a %b %e %H:%M:%S %Y"))?,
            None => writeln!(f, "Compile time:      (hash-based)")?,
        }
        if let Some(size) = self.source_size {
            writeln!(f, "Source size:       {size}")?;
        }
        writeln!(f, "Version word:      {}", self.version_word)?;
        writeln!(
            f,
            "Flags:             0x{:08x} ({})",
            self.flags.bits(),
            self.flags.names().join(", ")
        )?;
        writeln!(f, "Stack size:        {}", self.stacksize)?;
        writeln!(f, "First line:        {}", self.first_line)?;
        writeln!(f, "Kw-only arguments: {}", self.kwonlyargcount)?;
        writeln!(f, "Arguments:         {}", self.argcount)?;
        writeln!(f, "Locals:            {}", self.nlocals)?;
        writeln!(f, "Code units:        {}", self.unit_count)?;
        write!(f, "Instructions:      {}", self.instruction_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::builder::{minimal_module, PycBuilder},
        CompiledModule,
    };

    #[test]
    fn timestamp_module() {
        let data = PycBuilder::new(minimal_module().stacksize(3).firstlineno(1))
            .timestamp(1_600_000_000, 42)
            .build();
        let module = CompiledModule::from_mem(data).unwrap();
        let summary = module.summary();

        assert_eq!(summary.filename, "test.py");
        assert_eq!(summary.compile_time.unwrap().timestamp(), 1_600_000_000);
        assert_eq!(summary.source_size, Some(42));
        assert_eq!(summary.version_word, 3394);
        assert!(!summary.hash_based);
        assert_eq!(summary.flags, CodeFlags::NOFREE);
        assert_eq!(summary.stacksize, 3);
        assert_eq!(summary.first_line, 1);
        assert_eq!(summary.unit_count, 1);
        assert_eq!(summary.instruction_count, 2);
        assert_eq!(summary.line_starts, vec![(0, 1)]);
        assert!(summary.jump_targets.is_empty());

        let text = summary.to_string();
        assert!(text.contains("Filename:          test.py"));
        assert!(text.contains("Compile time:      Sun Sep 13 12:26:40 2020"));
        assert!(text.contains("(NOFREE)"));
    }

    #[test]
    fn hash_based_module() {
        let data = PycBuilder::new(minimal_module()).hash([7; 8]).build();
        let summary = CompiledModule::from_mem(data).unwrap().summary();

        assert!(summary.hash_based);
        assert_eq!(summary.compile_time, None);
        assert_eq!(summary.source_size, None);
        assert!(summary.to_string().contains("(hash-based)"));
    }
}
