mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })?;

    let cli = Cli::parse();

    // Show pycscope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("pycscope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Info { paths } => commands::info::run(paths, &cli.global),
        Command::Units { path } => commands::units::run(path, &cli.global),
        Command::Disasm {
            path,
            unit,
            line,
            no_header,
        } => commands::disasm::run(
            path,
            commands::disasm::DisasmOptions {
                unit: *unit,
                line: *line,
                header: !*no_header,
            },
            &cli.global,
        ),
    }
}
