//! The decoded listing of every code unit in a compiled module.
//!
//! A [`DisassemblyListing`] holds one [`ListingEntry`] per distinct code unit reachable from
//! the module's root, in the pre-order the [`walker`] visits them. Entries are addressed by
//! [`UnitId`], the unit's position in that order. Several units can start on the same source
//! line (lambdas and comprehensions, for example), so lookups by line return every match.
//!
//! # Example
//!
//! ```rust,no_run
//! use pycscope::CompiledModule;
//!
//! let module = CompiledModule::from_path("__pycache__/module.cpython-37.pyc")?;
//! for entry in module.listing().iter() {
//!     println!("{} {} (line {})", entry.id, entry.name, entry.first_line);
//!     for instruction in &entry.instructions {
//!         println!("  {instruction}");
//!     }
//! }
//! # Ok::<(), pycscope::Error>(())
//! ```

pub mod walker;

use std::{fmt, sync::Arc};

use crate::{disassembler::Instruction, pyc::CodeUnit};

/// Traversal-order identity of a code unit within one listing
///
/// The root unit is `#0`; nested units are numbered in pre-order, depth first, following
/// constant pool order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    /// The root unit of every listing
    pub const ROOT: UnitId = UnitId(0);

    /// Creates an id from a traversal index
    #[must_use]
    pub fn new(index: usize) -> UnitId {
        UnitId(index)
    }

    /// The traversal index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One decoded code unit
#[derive(Debug, Clone)]
pub struct ListingEntry {
    /// Traversal-order identity
    pub id: UnitId,
    /// The unit whose constant pool first reached this one, `None` for the root
    pub parent: Option<UnitId>,
    /// Name of the unit (`<module>`, a function or class name, `<lambda>`, ...)
    pub name: String,
    /// Source file recorded in the unit
    pub filename: String,
    /// First source line of the unit
    pub first_line: u32,
    /// Decoded instructions in offset order
    pub instructions: Vec<Instruction>,
    /// The decoded unit
    pub unit: Arc<CodeUnit>,
    /// Units nested in this one's constant pool, in pool order
    pub children: Vec<UnitId>,
}

impl ListingEntry {
    /// Number of instructions that begin a source line
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|instruction| instruction.starts_line.is_some())
            .count()
    }

    /// Offsets of every instruction a jump lands on
    #[must_use]
    pub fn jump_targets(&self) -> Vec<usize> {
        self.instructions
            .iter()
            .filter(|instruction| instruction.is_jump_target)
            .map(|instruction| instruction.offset)
            .collect()
    }
}

/// All decoded code units of one compiled module, addressable by [`UnitId`]
#[derive(Debug, Clone, Default)]
pub struct DisassemblyListing {
    entries: Vec<ListingEntry>,
}

impl DisassemblyListing {
    /// Creates an empty listing
    #[must_use]
    pub fn new() -> DisassemblyListing {
        DisassemblyListing::default()
    }

    /// Appends an entry, returning its id
    ///
    /// The entry's `id` is overwritten with its position in the listing.
    pub(crate) fn push(&mut self, mut entry: ListingEntry) -> UnitId {
        let id = UnitId(self.entries.len());
        entry.id = id;
        self.entries.push(entry);
        id
    }

    pub(crate) fn get_mut(&mut self, id: UnitId) -> Option<&mut ListingEntry> {
        self.entries.get_mut(id.0)
    }

    /// Returns the entry of a unit
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&ListingEntry> {
        self.entries.get(id.0)
    }

    /// Returns the entry of the module's root unit
    #[must_use]
    pub fn root(&self) -> Option<&ListingEntry> {
        self.get(UnitId::ROOT)
    }

    /// Iterates over all entries in traversal order
    pub fn iter(&self) -> std::slice::Iter<'_, ListingEntry> {
        self.entries.iter()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the listing has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every entry whose unit starts on `line`, in traversal order
    #[must_use]
    pub fn by_first_line(&self, line: u32) -> Vec<&ListingEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.first_line == line)
            .collect()
    }

    /// Returns every entry whose unit carries `name`, in traversal order
    #[must_use]
    pub fn by_name(&self, name: &str) -> Vec<&ListingEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.name == name)
            .collect()
    }

    /// Total number of instructions over all entries
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.instructions.len()).sum()
    }
}

impl<'a> IntoIterator for &'a DisassemblyListing {
    type Item = &'a ListingEntry;
    type IntoIter = std::slice::Iter<'a, ListingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
