use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! malformed_object {
    // Single string version
    ($offset:expr, $msg:expr) => {
        crate::Error::MalformedObject {
            offset: $offset,
            message: $msg.to_string(),
        }
    };

    // Format string with arguments version
    ($offset:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedObject {
            offset: $offset,
            message: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant except [`Error::MagicMismatch`] halts the decode of the current file. A magic
/// token that does not match the expected interpreter version is normally reported as a
/// diagnostic instead (see [`crate::Diagnostics`]), and only becomes an error when decoding
/// with [`crate::DecodeConfig::strict`].
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::MissingFile`] - The input path does not exist
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::TruncatedHeader`] - Fewer than 16 bytes of header are available
/// - [`Error::MagicMismatch`] - Magic token mismatch in strict mode
///
/// ## Object Format Errors
/// - [`Error::MalformedObject`] - Unknown tag, truncated payload, bad back-reference
/// - [`Error::UnexpectedRootType`] - The root object is not a code object
/// - [`Error::RecursionLimit`] - Nesting deeper than the configured limit
///
/// ## Bytecode Errors
/// - [`Error::InvalidOperand`] - Operand index outside its table
/// - [`Error::UnknownOpcode`] - Opcode byte with no known instruction
/// - [`Error::InUnit`] - Any of the above, tagged with the enclosing code unit
///
/// # Examples
///
/// ```rust,no_run
/// use pycscope::{CompiledModule, Error};
///
/// match CompiledModule::from_path("module.cpython-37.pyc") {
///     Ok(module) => println!("{} code units", module.listing().len()),
///     Err(Error::MissingFile(path)) => eprintln!("no such file: {}", path.display()),
///     Err(Error::MalformedObject { offset, message }) => {
///         eprintln!("bad object at 0x{offset:X}: {message}")
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input path does not exist.
    #[error("File does not exist - {}", .0.display())]
    MissingFile(PathBuf),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while opening or mapping the input.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The input is shorter than the fixed 16 byte header.
    #[error("Truncated header - expected 16 bytes, found {len}")]
    TruncatedHeader {
        /// Number of bytes that were available
        len: usize,
    },

    /// The magic token does not match the expected interpreter version.
    ///
    /// Only returned when the decode is configured to treat a mismatch as fatal.
    #[error("Magic number mismatch - expected {expected:02X?}, found {found:02X?}")]
    MagicMismatch {
        /// The magic token the decoder was configured for
        expected: [u8; 4],
        /// The magic token found in the file
        found: [u8; 4],
    },

    /// The serialized object tree could not be decoded.
    ///
    /// The offset is absolute within the input file.
    #[error("Malformed object at offset 0x{offset:X} - {message}")]
    MalformedObject {
        /// Absolute byte offset of the fault
        offset: usize,
        /// What went wrong
        message: String,
    },

    /// The root of the object tree is not a code object.
    #[error("Unexpected root type - expected a code object, found {0}")]
    UnexpectedRootType(&'static str),

    /// An instruction operand indexes outside of its table.
    #[error(
        "Invalid operand at offset {offset} - {mnemonic} index {index} is out of range for {table} (len {len})"
    )]
    InvalidOperand {
        /// Offset of the instruction within its code unit
        offset: usize,
        /// Numeric opcode
        opcode: u8,
        /// Mnemonic of the opcode
        mnemonic: &'static str,
        /// Name of the table the operand indexes
        table: &'static str,
        /// The offending index
        index: u32,
        /// Length of the table
        len: usize,
    },

    /// The instruction stream contains an opcode with no known instruction.
    #[error("Unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode {
        /// Offset of the instruction within its code unit
        offset: usize,
        /// The opcode byte
        opcode: u8,
    },

    /// A decode error that occurred inside a specific code unit.
    ///
    /// `unit` is the traversal index assigned to the unit, see [`crate::listing::UnitId`].
    #[error("Code unit #{unit} ({name}) - {source}")]
    InUnit {
        /// Traversal index of the failing unit
        unit: usize,
        /// Name of the failing unit
        name: String,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },

    /// The file is damaged and could not be parsed.
    ///
    /// Covers structural inconsistencies that are not tied to a single object tag, such as an odd
    /// length instruction stream. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Recursion limit reached.
    ///
    /// Nested containers deeper than [`crate::DecodeConfig::max_nesting_depth`] abort the decode
    /// instead of exhausting the stack.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}

impl Error {
    /// Returns the innermost error, looking through [`Error::InUnit`] wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::InUnit { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
