//! Diagnostics collection for module decoding.
//!
//! This module provides types for collecting and reporting diagnostic messages while a compiled
//! module is decoded. Diagnostics describe conditions that are unusual but do not stop the
//! decode: a magic token for a different interpreter version, unknown header flag bits, bytes
//! trailing the object tree, or a jump that leaves its own code unit.
//!
//! # Architecture
//!
//! One [`Diagnostics`] container is shared by every stage of a single decode run:
//! - **Header parser**: magic mismatch and unknown flag bits
//! - **Object reader**: trailing data after the root object
//! - **Code walker**: per-unit bytecode oddities
//!
//! The container uses `boxcar::Vec` for lock-free append operations, so it can be filled
//! through a shared reference and handed out from an immutable [`crate::CompiledModule`].
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe container for diagnostic entries
//! - [`Diagnostic`] - Individual diagnostic entry with severity and context
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning)
//! - [`DiagnosticCategory`] - Decoding stage that produced the entry
//!
//! # Usage Examples
//!
//! ```rust
//! use pycscope::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.push(
//!     Diagnostic::new(
//!         DiagnosticSeverity::Warning,
//!         DiagnosticCategory::Header,
//!         "Magic number 330D0D0A does not match the expected 420D0D0A",
//!     )
//!     .with_offset(0),
//! );
//!
//! assert!(diagnostics.has_warnings());
//! for entry in diagnostics.iter() {
//!     println!("{entry}");
//! }
//! ```

use std::fmt::{self, Write};

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Informational message, not indicating a problem.
    ///
    /// Used for noting unusual but valid constructs.
    Info,

    /// Warning about potentially problematic input.
    ///
    /// The module is still decoded, but the result may not reflect what the interpreter
    /// would load, e.g. when the magic token belongs to another version.
    Warning,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
        }
    }
}

/// Category indicating the decoding stage a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// Issues with the fixed 16 byte header.
    ///
    /// Examples: magic mismatch, unknown flag bits.
    Header,

    /// Issues with the serialized object tree.
    ///
    /// Examples: data after the root object.
    Marshal,

    /// Issues with a code unit's instruction stream.
    ///
    /// Examples: jump targets outside the unit.
    Bytecode,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Header => write!(f, "Header"),
            DiagnosticCategory::Marshal => write!(f, "Marshal"),
            DiagnosticCategory::Bytecode => write!(f, "Bytecode"),
        }
    }
}

/// A single diagnostic entry with context information.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Category indicating the source of this diagnostic.
    pub category: DiagnosticCategory,

    /// Human-readable description of the issue.
    pub message: String,

    /// Optional absolute file offset where the issue was found.
    pub offset: Option<usize>,

    /// Optional traversal index of the code unit the issue belongs to.
    pub unit: Option<usize>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    ///
    /// # Arguments
    ///
    /// * `severity` - Severity level of the diagnostic
    /// * `category` - Category of the diagnostic source
    /// * `message` - Human-readable description
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            offset: None,
            unit: None,
        }
    }

    /// Adds file offset information to the diagnostic.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Adds code unit information to the diagnostic.
    #[must_use]
    pub fn with_unit(mut self, unit: usize) -> Self {
        self.unit = Some(unit);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;

        if let Some(offset) = self.offset {
            write!(f, " (offset: 0x{offset:08x})")?;
        }

        if let Some(unit) = self.unit {
            write!(f, " (unit: #{unit})")?;
        }

        Ok(())
    }
}

/// Thread-safe container for collecting diagnostic entries.
///
/// Uses `boxcar::Vec` internally for lock-free append operations through `&self`.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds a diagnostic entry.
    ///
    /// Warnings are forwarded to the `log` facade as they are recorded.
    pub fn push(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            DiagnosticSeverity::Info => log::debug!("{diagnostic}"),
            DiagnosticSeverity::Warning => log::warn!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any warning-level diagnostics have been collected.
    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Warning)
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of diagnostics with the given severity.
    pub fn count_severity(&self, severity: DiagnosticSeverity) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == severity)
            .count()
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.category == category).collect()
    }

    /// Formats a summary of all diagnostics for display.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Diagnostics: {} warning(s), {} info(s)",
            self.count_severity(DiagnosticSeverity::Warning),
            self.count_severity(DiagnosticSeverity::Info)
        );

        for diag in self.iter() {
            let _ = writeln!(output, "  {diag}");
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn diagnostic_creation() {
        let diag = Diagnostic::new(
            DiagnosticSeverity::Warning,
            DiagnosticCategory::Header,
            "Test message",
        );

        assert_eq!(diag.severity, DiagnosticSeverity::Warning);
        assert_eq!(diag.category, DiagnosticCategory::Header);
        assert_eq!(diag.message, "Test message");
        assert!(diag.offset.is_none());
        assert!(diag.unit.is_none());
    }

    #[test]
    fn diagnostic_with_context() {
        let diag = Diagnostic::new(
            DiagnosticSeverity::Warning,
            DiagnosticCategory::Bytecode,
            "Jump outside of unit",
        )
        .with_offset(0x10)
        .with_unit(3);

        assert_eq!(diag.offset, Some(0x10));
        assert_eq!(diag.unit, Some(3));

        let display = diag.to_string();
        assert!(display.starts_with("[WARN] Bytecode: Jump outside of unit"));
        assert!(display.contains("Bytecode"));
        assert!(display.contains("0x00000010"));
        assert!(display.contains("#3"));
    }

    #[test]
    fn container_counts() {
        let diagnostics = Diagnostics::new();

        diagnostics.push(Diagnostic::new(
            DiagnosticSeverity::Info,
            DiagnosticCategory::Marshal,
            "Info message",
        ));
        diagnostics.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            DiagnosticCategory::Header,
            "Warning message",
        ));
        diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Warning,
                DiagnosticCategory::Bytecode,
                "Jump target 7 is not an instruction boundary",
            )
            .with_unit(1),
        );

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.count_severity(DiagnosticSeverity::Warning), 2);
        assert_eq!(diagnostics.count_severity(DiagnosticSeverity::Info), 1);
        assert!(diagnostics.has_warnings());
        assert!(diagnostics.has_any());
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Header).len(), 1);
        assert!(diagnostics
            .summary()
            .starts_with("Diagnostics: 2 warning(s), 1 info(s)"));
    }

    #[test]
    fn empty_container() {
        let diagnostics = Diagnostics::default();
        assert!(!diagnostics.has_any());
        assert!(!diagnostics.has_warnings());
        assert_eq!(diagnostics.iter().count(), 0);
    }

    #[test]
    fn thread_safety() {
        let diagnostics = Arc::new(Diagnostics::new());
        let mut handles = vec![];

        for i in 0..10 {
            let diag_clone = Arc::clone(&diagnostics);
            handles.push(thread::spawn(move || {
                diag_clone.push(Diagnostic::new(
                    DiagnosticSeverity::Warning,
                    DiagnosticCategory::Bytecode,
                    format!("Thread {i} warning"),
                ));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diagnostics.count(), 10);
    }
}
