use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pycscope - CPython 3.7 compiled module inspection and disassembly
#[derive(Debug, Parser)]
#[command(name = "pycscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Reject modules whose magic number is not CPython 3.7's.
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display module overview: header, compile time, root code unit facts.
    Info {
        /// Path(s) to compiled modules (.pyc). Several files are decoded in parallel.
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the code units of a module in traversal order.
    Units {
        /// Path to the compiled module (.pyc).
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Disassemble code units (dis-style output).
    Disasm {
        /// Path to the compiled module (.pyc).
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Disassemble only the unit with this traversal index (see `units`).
        #[arg(long, value_name = "N", conflicts_with = "line")]
        unit: Option<usize>,

        /// Disassemble only the units whose first source line is LINE.
        #[arg(long, value_name = "LINE")]
        line: Option<u32>,

        /// Omit the "Disassembly of" header above each unit.
        #[arg(long)]
        no_header: bool,
    },
}
