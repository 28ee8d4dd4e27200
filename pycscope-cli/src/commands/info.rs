use std::path::{Path, PathBuf};

use anyhow::Context;
use pycscope::{CompiledModule, SourceStamp};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{decode_config, file_display_name},
    output::{print_fields, print_output},
};

#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub path: String,
    pub magic: String,
    pub version_word: u16,
    pub header_flags: u32,
    pub hash_based: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_size: Option<u32>,
    pub filename: String,
    pub flags: Vec<String>,
    pub stack_size: u32,
    pub first_line: u32,
    pub kwonly_argument_count: u32,
    pub argument_count: u32,
    pub local_count: u32,
    pub unit_count: usize,
    pub instruction_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl ModuleInfo {
    fn new(path: &Path, module: &CompiledModule) -> Self {
        let header = module.header();
        let summary = module.summary();

        let source_hash = match header.stamp {
            SourceStamp::Hash(hash) => Some(hash.iter().map(|b| format!("{b:02x}")).collect()),
            SourceStamp::Timestamp { .. } => None,
        };

        ModuleInfo {
            path: path.display().to_string(),
            magic: header.magic.iter().map(|b| format!("{b:02x}")).collect(),
            version_word: summary.version_word,
            header_flags: header.flags.bits(),
            hash_based: summary.hash_based,
            source_hash,
            compile_time: summary.compile_time.map(|time| time.to_rfc3339()),
            source_size: summary.source_size,
            filename: summary.filename,
            flags: summary.flags.names(),
            stack_size: summary.stacksize,
            first_line: summary.first_line,
            kwonly_argument_count: summary.kwonlyargcount,
            argument_count: summary.argcount,
            local_count: summary.nlocals,
            unit_count: summary.unit_count,
            instruction_count: summary.instruction_count,
            diagnostics: module
                .diagnostics()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    fn print(&self) {
        let mut fields = vec![
            ("Path", self.path.clone()),
            ("Magic", format!("{} ({})", self.magic, self.version_word)),
            ("Header flags", format!("0x{:08x}", self.header_flags)),
        ];
        if let Some(hash) = &self.source_hash {
            fields.push(("Source hash", hash.clone()));
        }
        if let Some(time) = &self.compile_time {
            fields.push(("Compile time", time.clone()));
        }
        if let Some(size) = self.source_size {
            fields.push(("Source size", size.to_string()));
        }
        fields.extend([
            ("Filename", self.filename.clone()),
            ("Flags", self.flags.join(", ")),
            ("Stack size", self.stack_size.to_string()),
            ("First line", self.first_line.to_string()),
            ("Kw-only arguments", self.kwonly_argument_count.to_string()),
            ("Arguments", self.argument_count.to_string()),
            ("Locals", self.local_count.to_string()),
            ("Code units", self.unit_count.to_string()),
            ("Instructions", self.instruction_count.to_string()),
        ]);
        print_fields(&fields);

        for diagnostic in &self.diagnostics {
            println!("  {diagnostic}");
        }
    }
}

pub fn run(paths: &[PathBuf], opts: &GlobalOptions) -> anyhow::Result<()> {
    let results = CompiledModule::from_paths(paths, &decode_config(opts));

    let mut infos = Vec::with_capacity(paths.len());
    for (path, result) in paths.iter().zip(results) {
        let module =
            result.with_context(|| format!("failed to decode module: {}", path.display()))?;
        log::debug!("{}: {} code units", file_display_name(path), module.listing().len());
        infos.push(ModuleInfo::new(path, &module));
    }

    if let [info] = infos.as_slice() {
        return print_output(info, opts, ModuleInfo::print);
    }

    print_output(&infos, opts, |infos| {
        for (i, info) in infos.iter().enumerate() {
            if i > 0 {
                println!();
            }
            info.print();
        }
    })
}
