//! Decode configuration for compiled module loading
//!
//! This module provides the options that control how tolerant the decoding pipeline is
//! towards unusual input. Structural damage (truncated data, unknown tags, out of range
//! operands) always aborts the decode; the options here only decide what happens with input
//! that is well-formed but unexpected.

use crate::pyc::header::MAGIC_PY37;

/// Configuration for decoding a compiled module
///
/// The decoder always validates:
/// - Header length
/// - Object tags, lengths and back-references
/// - Operand indices against their tables
///
/// The flags below control the checks that can be relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Magic token the input is expected to carry (default: CPython 3.7)
    pub expected_magic: [u8; 4],

    /// Compare the magic token against `expected_magic` at all
    pub check_magic: bool,

    /// Abort with [`crate::Error::MagicMismatch`] instead of recording a warning
    pub fatal_magic_mismatch: bool,

    /// Report jumps whose target lies outside their own code unit
    pub check_jump_targets: bool,

    /// Maximum nesting depth of the serialized object tree (default: 2000)
    pub max_nesting_depth: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl DecodeConfig {
    /// Creates the configuration used by default
    ///
    /// A magic mismatch is recorded as a warning diagnostic and decoding continues best-effort.
    #[must_use]
    pub fn production() -> Self {
        Self {
            expected_magic: MAGIC_PY37,
            check_magic: true,
            fatal_magic_mismatch: false,
            check_jump_targets: true,
            max_nesting_depth: 2000,
        }
    }

    /// Creates a configuration that refuses input for other interpreter versions
    #[must_use]
    pub fn strict() -> Self {
        Self {
            fatal_magic_mismatch: true,
            ..Self::production()
        }
    }

    /// Creates a configuration that skips every optional check
    ///
    /// Useful for inspecting modules of neighbouring interpreter versions that share the
    /// 3.7 object layout.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            check_magic: false,
            fatal_magic_mismatch: false,
            check_jump_targets: false,
            ..Self::production()
        }
    }

    /// Replaces the expected magic token
    #[must_use]
    pub fn with_expected_magic(mut self, magic: [u8; 4]) -> Self {
        self.expected_magic = magic;
        self
    }

    /// Replaces the nesting limit
    #[must_use]
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let production = DecodeConfig::production();
        assert_eq!(production.expected_magic, [0x42, 0x0D, 0x0D, 0x0A]);
        assert!(production.check_magic);
        assert!(!production.fatal_magic_mismatch);
        assert!(production.check_jump_targets);
        assert_eq!(production.max_nesting_depth, 2000);

        let strict = DecodeConfig::strict();
        assert!(strict.check_magic);
        assert!(strict.fatal_magic_mismatch);

        let lenient = DecodeConfig::lenient();
        assert!(!lenient.check_magic);
        assert!(!lenient.fatal_magic_mismatch);
        assert!(!lenient.check_jump_targets);
        assert_eq!(lenient.max_nesting_depth, 2000);
    }

    #[test]
    fn default_config() {
        assert_eq!(DecodeConfig::default(), DecodeConfig::production());
    }

    #[test]
    fn builders() {
        let config = DecodeConfig::production()
            .with_expected_magic([0x33, 0x0D, 0x0D, 0x0A])
            .with_max_nesting_depth(16);
        assert_eq!(config.expected_magic, [0x33, 0x0D, 0x0D, 0x0A]);
        assert_eq!(config.max_nesting_depth, 16);
    }
}
