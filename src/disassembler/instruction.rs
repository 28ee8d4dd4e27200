use std::fmt;

use crate::{disassembler::Opcode, pyc::Value};

/// The resolved value of an instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A constant pool entry
    Const(Value),
    /// An entry of the name table
    Name(String),
    /// A local variable name
    Local(String),
    /// A cell or free variable name
    Free(String),
    /// Absolute offset of a jump target within the unit
    Jump(usize),
    /// A comparison operator
    Compare(&'static str),
    /// A plain number
    Literal(u32),
}

impl Argument {
    /// The jump target, for [`Argument::Jump`]
    #[must_use]
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Argument::Jump(target) => Some(*target),
            _ => None,
        }
    }
}

/// One decoded instruction
///
/// `EXTENDED_ARG` prefixes are folded into the instruction they extend: `offset` is the
/// offset of the first prefix and `size` covers the prefixes and the instruction itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset of the instruction (or its first prefix) within the unit
    pub offset: usize,
    /// Size in bytes, `2 * (1 + prefixes)`
    pub size: usize,
    /// The decoded opcode
    pub op: Opcode,
    /// The numeric opcode
    pub opcode: u8,
    /// The mnemonic
    pub mnemonic: &'static str,
    /// The raw operand with all prefixes applied; `None` below `HAVE_ARGUMENT`
    pub arg: Option<u32>,
    /// The resolved operand
    pub argval: Option<Argument>,
    /// Human readable operand, empty if there is nothing to show
    pub argrepr: String,
    /// The source line this instruction starts, if it starts one
    pub starts_line: Option<u32>,
    /// Whether any jump in the unit targets this instruction
    pub is_jump_target: bool,
}

impl Instruction {
    /// Offset of the instruction that follows this one
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }

    /// Returns true if `offset` falls within the bytes of this instruction
    #[must_use]
    pub fn covers(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.next_offset()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6} {:<20}", self.offset, self.mnemonic)?;
        if let Some(arg) = self.arg {
            write!(f, " {arg:>5}")?;
            if !self.argrepr.is_empty() {
                write!(f, " ({})", self.argrepr)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let instruction = Instruction {
            offset: 4,
            size: 2,
            op: Opcode::LoadName,
            opcode: 101,
            mnemonic: "LOAD_NAME",
            arg: Some(0),
            argval: Some(Argument::Name("print".to_string())),
            argrepr: "print".to_string(),
            starts_line: Some(1),
            is_jump_target: false,
        };

        assert_eq!(
            instruction.to_string(),
            "     4 LOAD_NAME                0 (print)"
        );
        assert_eq!(instruction.next_offset(), 6);
        assert!(instruction.covers(5));
        assert!(!instruction.covers(6));
        assert_eq!(instruction.argval.unwrap().jump_target(), None);
    }
}
