use std::{
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::bail;
use pycscope::{disassembler::Instruction, ListingEntry, UnitId};
use serde::Serialize;

use crate::{app::GlobalOptions, commands::common::load_module};

/// Mnemonic column width used by `dis`.
const OPNAME_WIDTH: usize = 20;
/// Raw argument column width used by `dis`.
const OPARG_WIDTH: usize = 5;

/// Which units to print and how.
pub struct DisasmOptions {
    pub unit: Option<usize>,
    pub line: Option<u32>,
    pub header: bool,
}

#[derive(Debug, Serialize)]
struct UnitListing<'a> {
    id: usize,
    name: &'a str,
    filename: &'a str,
    first_line: u32,
    instructions: Vec<InstructionInfo<'a>>,
}

#[derive(Debug, Serialize)]
struct InstructionInfo<'a> {
    offset: usize,
    size: usize,
    opcode: u8,
    mnemonic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arg: Option<u32>,
    #[serde(skip_serializing_if = "is_blank")]
    argrepr: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    starts_line: Option<u32>,
    is_jump_target: bool,
}

fn is_blank(text: &&str) -> bool {
    text.is_empty()
}

impl<'a> From<&'a ListingEntry> for UnitListing<'a> {
    fn from(entry: &'a ListingEntry) -> Self {
        UnitListing {
            id: entry.id.index(),
            name: &entry.name,
            filename: &entry.filename,
            first_line: entry.first_line,
            instructions: entry
                .instructions
                .iter()
                .map(|instruction| InstructionInfo {
                    offset: instruction.offset,
                    size: instruction.size,
                    opcode: instruction.opcode,
                    mnemonic: instruction.mnemonic,
                    arg: instruction.arg,
                    argrepr: &instruction.argrepr,
                    starts_line: instruction.starts_line,
                    is_jump_target: instruction.is_jump_target,
                })
                .collect(),
        }
    }
}

pub fn run(path: &Path, opts: DisasmOptions, global: &GlobalOptions) -> anyhow::Result<()> {
    let module = load_module(path, global)?;
    let listing = module.listing();

    let entries: Vec<&ListingEntry> = if let Some(index) = opts.unit {
        match listing.get(UnitId::new(index)) {
            Some(entry) => vec![entry],
            None => bail!(
                "no code unit #{index}, the module has {} units",
                listing.len()
            ),
        }
    } else if let Some(line) = opts.line {
        let entries = listing.by_first_line(line);
        if entries.is_empty() {
            bail!("no code unit starts on line {line}");
        }
        entries
    } else {
        listing.iter().collect()
    };

    let stdout = io::stdout();
    let mut w = BufWriter::new(stdout.lock());

    if global.json {
        let units: Vec<UnitListing> = entries.iter().map(|entry| UnitListing::from(*entry)).collect();
        serde_json::to_writer_pretty(&mut w, &units)?;
        writeln!(w)?;
    } else {
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            format_entry(&mut w, entry, opts.header)?;
        }
    }

    w.flush()?;
    Ok(())
}

/// Writes one unit the way `dis.dis` prints a code object.
fn format_entry(w: &mut impl Write, entry: &ListingEntry, header: bool) -> io::Result<()> {
    if header {
        writeln!(
            w,
            "Disassembly of {} ({}), file \"{}\", line {}:",
            entry.name, entry.id, entry.filename, entry.first_line
        )?;
    }

    let max_line = entry
        .instructions
        .iter()
        .filter_map(|instruction| instruction.starts_line)
        .max()
        .unwrap_or(0);
    let lineno_width = if max_line >= 1000 {
        max_line.to_string().len()
    } else {
        3
    };

    for (i, instruction) in entry.instructions.iter().enumerate() {
        if i > 0 && instruction.starts_line.is_some() {
            writeln!(w)?;
        }
        writeln!(w, "{}", format_instruction(instruction, lineno_width))?;
    }
    Ok(())
}

fn format_instruction(instruction: &Instruction, lineno_width: usize) -> String {
    let mut fields = Vec::with_capacity(7);

    fields.push(match instruction.starts_line {
        Some(line) => format!("{line:>lineno_width$}"),
        None => " ".repeat(lineno_width),
    });
    fields.push("   ".to_string());
    fields.push(if instruction.is_jump_target { ">>" } else { "  " }.to_string());
    fields.push(format!("{:>4}", instruction.offset));
    fields.push(format!("{:<OPNAME_WIDTH$}", instruction.mnemonic));
    if let Some(arg) = instruction.arg {
        fields.push(format!("{arg:>OPARG_WIDTH$}"));
        if !instruction.argrepr.is_empty() {
            fields.push(format!("({})", instruction.argrepr));
        }
    }

    fields.join(" ").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use pycscope::disassembler::{Argument, Opcode};

    use super::*;

    fn instruction(offset: usize, op: Opcode, arg: Option<u32>, argrepr: &str) -> Instruction {
        Instruction {
            offset,
            size: 2,
            op,
            opcode: op.byte(),
            mnemonic: op.mnemonic(),
            arg,
            argval: arg.map(Argument::Literal),
            argrepr: argrepr.to_string(),
            starts_line: None,
            is_jump_target: false,
        }
    }

    #[test]
    fn dis_columns() {
        let mut load = instruction(0, Opcode::LoadConst, Some(0), "None");
        load.starts_line = Some(1);
        assert_eq!(
            format_instruction(&load, 3),
            "  1           0 LOAD_CONST               0 (None)"
        );

        let mut ret = instruction(2, Opcode::ReturnValue, None, "");
        ret.is_jump_target = true;
        assert_eq!(
            format_instruction(&ret, 3),
            "        >>    2 RETURN_VALUE"
        );
    }
}
