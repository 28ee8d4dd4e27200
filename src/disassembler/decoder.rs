//! Wordcode decoding and operand resolution.
//!
//! This module turns a code unit's raw instruction bytes into [`Instruction`] records. It is
//! used by the listing walker for every unit, but the building blocks are public for callers
//! who want to decode a single instruction or a bare stream themselves.
//!
//! # Example: Decoding a Code Unit
//!
//! ```rust,no_run
//! use pycscope::{disassembler::decode_code_unit, CompiledModule};
//!
//! let module = CompiledModule::from_path("__pycache__/module.cpython-37.pyc")?;
//! for instruction in decode_code_unit(module.root())? {
//!     println!("{instruction}");
//! }
//! # Ok::<(), pycscope::Error>(())
//! ```
//!
//! # Example: Decoding a Stream of Instructions
//!
//! ```rust,no_run
//! use pycscope::{disassembler::decode_stream, CompiledModule, Parser};
//!
//! let module = CompiledModule::from_path("__pycache__/module.cpython-37.pyc")?;
//! let root = module.root();
//! let mut parser = Parser::new(&root.code);
//! let instructions = decode_stream(&mut parser, root)?;
//! println!("{} instructions", instructions.len());
//! # Ok::<(), pycscope::Error>(())
//! ```

use crate::{
    disassembler::{
        linetable::LineStarts, targetmap::JumpTargetMap, Argument, Instruction, Opcode,
        OperandClass, CMP_OP, FORMAT_CONVERSIONS,
    },
    file::parser::Parser,
    pyc::CodeUnit,
    Error::{self, InvalidOperand, UnknownOpcode},
    Result,
};

/// More prefixes than this cannot be represented in a 32 bit operand
const MAX_EXTENDED_ARGS: usize = 3;

/// Decodes the instruction at the parser's position, including its `EXTENDED_ARG` prefixes.
///
/// The returned instruction has its operand resolved against `unit`. Line attribution and
/// jump-target flags need the whole stream and are left unset.
///
/// # Arguments
/// * `parser` - Parser over the unit's instruction bytes, positioned at an instruction boundary
/// * `unit`   - The code unit providing the operand tables
///
/// # Errors
/// Returns [`crate::Error::UnknownOpcode`] for opcode bytes without an instruction,
/// [`crate::Error::InvalidOperand`] for operands outside their table, and
/// [`crate::Error::Malformed`] for truncated instructions or a dangling `EXTENDED_ARG`.
pub fn decode_instruction(parser: &mut Parser, unit: &CodeUnit) -> Result<Instruction> {
    let offset = parser.pos();
    let mut extended: u32 = 0;
    let mut prefixes = 0_usize;

    loop {
        let op_offset = parser.pos();
        if parser.remaining() < 2 {
            if prefixes > 0 {
                return Err(malformed_error!(
                    "Dangling EXTENDED_ARG at offset {} in {}",
                    offset,
                    unit.name
                ));
            }
            return Err(malformed_error!(
                "Truncated instruction at offset {} in {}",
                op_offset,
                unit.name
            ));
        }

        let opcode = parser.read_le::<u8>()?;
        let byte = parser.read_le::<u8>()?;

        let Some(op) = Opcode::from_byte(opcode) else {
            return Err(UnknownOpcode {
                offset: op_offset,
                opcode,
            });
        };

        if op == Opcode::ExtendedArg {
            if prefixes == MAX_EXTENDED_ARGS {
                return Err(malformed_error!(
                    "More than {} EXTENDED_ARG prefixes at offset {}",
                    MAX_EXTENDED_ARGS,
                    offset
                ));
            }
            extended = (extended | u32::from(byte)) << 8;
            prefixes += 1;
            continue;
        }

        let arg = op.has_argument().then_some(extended | u32::from(byte));
        let size = 2 * (prefixes + 1);
        let (argval, argrepr) = resolve_operand(op, arg, offset, size, unit)?;

        return Ok(Instruction {
            offset,
            size,
            op,
            opcode,
            mnemonic: op.mnemonic(),
            arg,
            argval,
            argrepr,
            starts_line: None,
            is_jump_target: false,
        });
    }
}

/// Decodes every instruction from the parser's position to the end of its data.
///
/// # Errors
/// Returns the first error of [`decode_instruction`].
pub fn decode_stream(parser: &mut Parser, unit: &CodeUnit) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::with_capacity(parser.remaining() / 2);
    while parser.has_more_data() {
        instructions.push(decode_instruction(parser, unit)?);
    }
    Ok(instructions)
}

/// Decodes a complete code unit: instructions, operands, line starts and jump targets.
///
/// An instruction starts a line if a line begins anywhere within its bytes, which includes
/// its `EXTENDED_ARG` prefixes.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for an odd-length instruction stream or a line table
/// that leaves the valid line range, and any error of [`decode_instruction`].
pub fn decode_code_unit(unit: &CodeUnit) -> Result<Vec<Instruction>> {
    if unit.code.len() % 2 != 0 {
        return Err(malformed_error!(
            "Instruction stream of {} has odd length {}",
            unit.name,
            unit.code.len()
        ));
    }

    let line_starts = LineStarts::parse(&unit.lnotab, unit.firstlineno)?;

    let mut parser = Parser::new(&unit.code);
    let mut instructions = decode_stream(&mut parser, unit)?;

    for instruction in &mut instructions {
        instruction.starts_line = line_starts.first_in(instruction.offset..instruction.next_offset());
    }

    mark_jump_targets(&mut instructions, unit.code.len());

    Ok(instructions)
}

/// Sets `is_jump_target` on exactly the instructions some jump in the slice lands on.
///
/// Existing flags are recomputed rather than accumulated, so marking twice is the same as
/// marking once. Returns the number of marked instructions.
///
/// # Arguments
/// * `instructions` - The decoded instructions of one unit
/// * `code_len`     - Length of the unit's instruction stream
pub fn mark_jump_targets(instructions: &mut [Instruction], code_len: usize) -> usize {
    JumpTargetMap::from_instructions(instructions, code_len).apply(instructions)
}

fn resolve_operand(
    op: Opcode,
    arg: Option<u32>,
    offset: usize,
    size: usize,
    unit: &CodeUnit,
) -> Result<(Option<Argument>, String)> {
    let Some(arg) = arg else {
        return Ok((None, String::new()));
    };

    let index = arg as usize;
    let invalid = |table: &'static str, len: usize| -> Error {
        InvalidOperand {
            offset,
            opcode: op.byte(),
            mnemonic: op.mnemonic(),
            table,
            index: arg,
            len,
        }
    };

    let (argval, argrepr) = match op.operand_class() {
        OperandClass::Const => {
            let value = unit
                .consts
                .get(index)
                .ok_or_else(|| invalid("constants", unit.consts.len()))?;
            (Argument::Const(value.clone()), value.repr())
        }
        OperandClass::Name => {
            let name = unit
                .names
                .get(index)
                .ok_or_else(|| invalid("names", unit.names.len()))?;
            (Argument::Name(name.clone()), name.clone())
        }
        OperandClass::Local => {
            let name = unit
                .varnames
                .get(index)
                .ok_or_else(|| invalid("varnames", unit.varnames.len()))?;
            (Argument::Local(name.clone()), name.clone())
        }
        OperandClass::Free => {
            let name = unit
                .cell_or_free(index)
                .ok_or_else(|| invalid("cell and free variables", unit.cell_and_free_len()))?;
            (Argument::Free(name.to_string()), name.to_string())
        }
        OperandClass::JumpRelative => {
            let target = offset + size + index;
            (Argument::Jump(target), format!("to {target}"))
        }
        OperandClass::JumpAbsolute => (Argument::Jump(index), String::new()),
        OperandClass::Compare => {
            let operator = *CMP_OP
                .get(index)
                .ok_or_else(|| invalid("comparison operators", CMP_OP.len()))?;
            (Argument::Compare(operator), operator.to_string())
        }
        OperandClass::Literal if op == Opcode::FormatValue => {
            let mut repr = FORMAT_CONVERSIONS[index & 0x3].to_string();
            if arg & 0x4 != 0 {
                if !repr.is_empty() {
                    repr.push_str(", ");
                }
                repr.push_str("with format");
            }
            (Argument::Literal(arg), repr)
        }
        OperandClass::Literal => (Argument::Literal(arg), String::new()),
        OperandClass::None => return Ok((None, String::new())),
    };

    Ok((Some(argval), argrepr))
}
