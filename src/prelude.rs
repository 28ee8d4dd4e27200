//! # pycscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! pycscope library. Import this module to get quick access to everything needed to decode a
//! compiled module and walk its listing.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pycscope operations
pub use crate::Error;

/// The result type used throughout pycscope
pub use crate::Result;

/// Decode settings
pub use crate::DecodeConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Main entry point for compiled module analysis
pub use crate::CompiledModule;

/// Module-level facts
pub use crate::ModuleSummary;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Non-fatal findings of a decode
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};

// ================================================================================================
// Container Format
// ================================================================================================

/// Header types
pub use crate::pyc::{HeaderLayout, HeaderMetadata, PycFlags, SourceStamp};

/// Object tree types
pub use crate::pyc::{CodeFlags, CodeUnit, ObjectReader, PyLong, Value};

// ================================================================================================
// Disassembly
// ================================================================================================

/// Instruction decoding
pub use crate::disassembler::{
    decode_code_unit, decode_instruction, decode_stream, Argument, Instruction, LineStarts,
    Opcode, OperandClass,
};

/// The aggregated listing
pub use crate::listing::{DisassemblyListing, ListingEntry, UnitId};
