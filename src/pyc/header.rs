//! Compiled module header parsing.
//!
//! Every compiled module starts with a fixed 16 byte header, laid out as described by PEP 552:
//!
//! | offset | size | field                                              |
//! |--------|------|----------------------------------------------------|
//! | 0      | 4    | magic (little-endian version word followed by `\r\n`) |
//! | 4      | 4    | flags (bit 0: hash-based, bit 1: check-source)     |
//! | 8      | 8    | mtime + source size, or the SipHash of the source  |
//!
//! The header is parsed by [`HeaderMetadata::read`]. Whether a magic token that belongs to
//! another interpreter version is acceptable is decided separately by
//! [`HeaderMetadata::validate`], driven by [`crate::DecodeConfig`].
//!
//! # Reference
//! - [PEP 552 - Deterministic pycs](https://peps.python.org/pep-0552/)

use bitflags::bitflags;
use chrono::{DateTime, Utc};

use crate::{
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    file::parser::Parser,
    DecodeConfig,
    Error::{MagicMismatch, TruncatedHeader},
    Result,
};

/// Magic token written by CPython 3.7 (version word 3394)
pub const MAGIC_PY37: [u8; 4] = [0x42, 0x0D, 0x0D, 0x0A];

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 16;

bitflags! {
    /// The flag word at offset 4 of the header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PycFlags: u32 {
        /// The 8 trailing header bytes hold a hash of the source instead of mtime and size
        const HASH_BASED = 0b01;
        /// The interpreter re-validates a hash-based module against its source
        const CHECK_SOURCE = 0b10;
    }
}

/// How the module records the source it was compiled from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStamp {
    /// Source modification time and size, the classic invalidation mode
    Timestamp {
        /// Modification time of the source, seconds since the Unix epoch
        mtime: u32,
        /// Size of the source file in bytes (truncated to 32 bits)
        source_size: u32,
    },
    /// SipHash of the source file content
    Hash([u8; 8]),
}

/// The on-disk header layouts the parser knows about.
///
/// Only the PEP 552 layout (CPython 3.7 and later) is implemented. Older interpreters used 8 and
/// 12 byte headers; supporting them means adding a layout here and selecting it from the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// Magic, flag word and an 8 byte source stamp
    Pep552,
}

impl HeaderLayout {
    /// Width of the header in bytes, which is also the offset of the object payload
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            HeaderLayout::Pep552 => HEADER_SIZE,
        }
    }
}

/// Parsed header of a compiled module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMetadata {
    /// The raw magic token
    pub magic: [u8; 4],
    /// The flag word, unknown bits retained
    pub flags: PycFlags,
    /// The source invalidation record
    pub stamp: SourceStamp,
    /// The layout this header was read with
    pub layout: HeaderLayout,
}

impl HeaderMetadata {
    /// Parse the header from the start of a module buffer
    ///
    /// # Arguments
    /// * `data` - The complete module, or at least its first 16 bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedHeader`] if fewer than 16 bytes are available.
    pub fn read(data: &[u8]) -> Result<HeaderMetadata> {
        let layout = HeaderLayout::Pep552;
        if data.len() < layout.size() {
            return Err(TruncatedHeader { len: data.len() });
        }

        let mut parser = Parser::new(data);

        let mut magic = [0_u8; 4];
        magic.copy_from_slice(parser.read_bytes(4)?);

        let flags = PycFlags::from_bits_retain(parser.read_le::<u32>()?);
        let stamp = if flags.contains(PycFlags::HASH_BASED) {
            let mut hash = [0_u8; 8];
            hash.copy_from_slice(parser.read_bytes(8)?);
            SourceStamp::Hash(hash)
        } else {
            SourceStamp::Timestamp {
                mtime: parser.read_le::<u32>()?,
                source_size: parser.read_le::<u32>()?,
            }
        };

        Ok(HeaderMetadata {
            magic,
            flags,
            stamp,
            layout,
        })
    }

    /// Apply the configured header policy
    ///
    /// A magic mismatch is recorded as a warning, or returned as an error when the configuration
    /// asks for it. Flag bits outside of [`PycFlags`] are always just recorded.
    ///
    /// # Arguments
    /// * `config` - The decode configuration
    /// * `diagnostics` - Receives the non-fatal findings
    ///
    /// # Errors
    /// Returns [`crate::Error::MagicMismatch`] if the magic differs from the expected token and
    /// [`crate::DecodeConfig::fatal_magic_mismatch`] is set.
    pub fn validate(&self, config: &DecodeConfig, diagnostics: &Diagnostics) -> Result<()> {
        if config.check_magic && self.magic != config.expected_magic {
            if config.fatal_magic_mismatch {
                return Err(MagicMismatch {
                    expected: config.expected_magic,
                    found: self.magic,
                });
            }

            diagnostics.push(
                Diagnostic::new(
                    DiagnosticSeverity::Warning,
                    DiagnosticCategory::Header,
                    format!(
                        "Magic number {:02X?} (version word {}) does not match the expected {:02X?}, decoding best-effort",
                        self.magic,
                        self.version_word(),
                        config.expected_magic
                    ),
                )
                .with_offset(0),
            );
        }

        let unknown = self.flags.bits() & !PycFlags::all().bits();
        if unknown != 0 {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticSeverity::Warning,
                    DiagnosticCategory::Header,
                    format!("Unknown header flag bits 0x{unknown:08X}"),
                )
                .with_offset(4),
            );
        }

        Ok(())
    }

    /// Offset of the serialized object tree
    #[must_use]
    pub fn payload_offset(&self) -> usize {
        self.layout.size()
    }

    /// The interpreter version word encoded in the first two magic bytes (3394 for 3.7)
    #[must_use]
    pub fn version_word(&self) -> u16 {
        u16::from_le_bytes([self.magic[0], self.magic[1]])
    }

    /// Returns true if the module is invalidated by source hash rather than timestamp
    #[must_use]
    pub fn is_hash_based(&self) -> bool {
        self.flags.contains(PycFlags::HASH_BASED)
    }

    /// The recorded source modification time, for timestamp based modules
    #[must_use]
    pub fn compile_time(&self) -> Option<DateTime<Utc>> {
        match self.stamp {
            SourceStamp::Timestamp { mtime, .. } => DateTime::from_timestamp(i64::from(mtime), 0),
            SourceStamp::Hash(_) => None,
        }
    }

    /// The recorded source size, for timestamp based modules
    #[must_use]
    pub fn source_size(&self) -> Option<u32> {
        match self.stamp {
            SourceStamp::Timestamp { source_size, .. } => Some(source_size),
            SourceStamp::Hash(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn header(magic: [u8; 4], flags: u32, tail: [u8; 8]) -> Vec<u8> {
        let mut data = magic.to_vec();
        data.extend_from_slice(&flags.to_le_bytes());
        data.extend_from_slice(&tail);
        data
    }

    #[test]
    fn timestamp_header() {
        let mut tail = [0_u8; 8];
        tail[..4].copy_from_slice(&1_600_000_000_u32.to_le_bytes());
        tail[4..].copy_from_slice(&123_u32.to_le_bytes());
        let data = header(MAGIC_PY37, 0, tail);

        let header = HeaderMetadata::read(&data).unwrap();
        assert_eq!(header.magic, MAGIC_PY37);
        assert_eq!(header.version_word(), 3394);
        assert!(!header.is_hash_based());
        assert_eq!(
            header.stamp,
            SourceStamp::Timestamp {
                mtime: 1_600_000_000,
                source_size: 123
            }
        );
        assert_eq!(header.source_size(), Some(123));
        assert_eq!(header.payload_offset(), 16);
        assert_eq!(
            header.compile_time().unwrap().to_rfc3339(),
            "2020-09-13T12:26:40+00:00"
        );
    }

    #[test]
    fn hash_header() {
        let data = header(MAGIC_PY37, 0b11, [1, 2, 3, 4, 5, 6, 7, 8]);

        let header = HeaderMetadata::read(&data).unwrap();
        assert!(header.is_hash_based());
        assert!(header.flags.contains(PycFlags::CHECK_SOURCE));
        assert_eq!(header.stamp, SourceStamp::Hash([1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(header.compile_time().is_none());
        assert!(header.source_size().is_none());
    }

    #[test]
    fn truncated() {
        for len in [0, 1, 4, 15] {
            let data = vec![0x42; len];
            match HeaderMetadata::read(&data) {
                Err(Error::TruncatedHeader { len: found }) => assert_eq!(found, len),
                _ => panic!("Expected TruncatedHeader for {len} bytes"),
            }
        }
    }

    #[test]
    fn magic_mismatch_policies() {
        let data = header([0x33, 0x0D, 0x0D, 0x0A], 0, [0; 8]);
        let header = HeaderMetadata::read(&data).unwrap();
        assert_eq!(header.version_word(), 3379);

        let diagnostics = Diagnostics::new();
        header
            .validate(&DecodeConfig::production(), &diagnostics)
            .unwrap();
        assert_eq!(diagnostics.count(), 1);
        assert!(diagnostics.has_warnings());

        let diagnostics = Diagnostics::new();
        match header.validate(&DecodeConfig::strict(), &diagnostics) {
            Err(Error::MagicMismatch { expected, found }) => {
                assert_eq!(expected, MAGIC_PY37);
                assert_eq!(found, [0x33, 0x0D, 0x0D, 0x0A]);
            }
            _ => panic!("Expected MagicMismatch"),
        }

        let diagnostics = Diagnostics::new();
        header
            .validate(&DecodeConfig::lenient(), &diagnostics)
            .unwrap();
        assert!(!diagnostics.has_any());
    }

    #[test]
    fn unknown_flag_bits() {
        let data = header(MAGIC_PY37, 0x10, [0; 8]);
        let header = HeaderMetadata::read(&data).unwrap();
        assert_eq!(header.flags.bits(), 0x10);

        let diagnostics = Diagnostics::new();
        header
            .validate(&DecodeConfig::production(), &diagnostics)
            .unwrap();
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Header).len(), 1);
    }
}
