//! CPython 3.7 wordcode disassembler.
//!
//! This module decodes the instruction bytes of a single code unit into [`Instruction`]
//! records. Operands are resolved against the unit's tables, source lines are attributed from
//! the `co_lnotab` table and every instruction that some jump lands on is flagged.
//!
//! # Key Types
//! - [`Opcode`] - The 3.7 opcode table
//! - [`OperandClass`] - How an opcode's operand is resolved
//! - [`Instruction`] - A decoded instruction, `EXTENDED_ARG` prefixes folded in
//! - [`Argument`] - A resolved operand value
//! - [`LineStarts`] - Offsets at which source lines begin
//! - [`JumpTargetMap`] - Bitmap of jump-target offsets
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] - Decode a sequence of instructions
//! - [`decode_code_unit`] - Decode a whole unit, including lines and jump targets
//!
//! # Example
//! ```rust,no_run
//! use pycscope::disassembler::{decode_instruction, Opcode};
//! use pycscope::{CompiledModule, Parser};
//!
//! let module = CompiledModule::from_path("__pycache__/module.cpython-37.pyc")?;
//! let root = module.root();
//!
//! let mut parser = Parser::new(&root.code);
//! let instruction = decode_instruction(&mut parser, root)?;
//! if instruction.op == Opcode::LoadConst {
//!     println!("first constant: {}", instruction.argrepr);
//! }
//! # Ok::<(), pycscope::Error>(())
//! ```

mod decoder;
mod instruction;
mod linetable;
mod opcodes;
mod targetmap;

pub use decoder::{decode_code_unit, decode_instruction, decode_stream, mark_jump_targets};
pub use instruction::{Argument, Instruction};
pub use linetable::LineStarts;
pub use opcodes::{Opcode, OperandClass, CMP_OP, FORMAT_CONVERSIONS, HAVE_ARGUMENT};
pub use targetmap::JumpTargetMap;
