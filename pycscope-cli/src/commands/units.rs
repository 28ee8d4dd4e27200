use std::path::Path;

use pycscope::ListingEntry;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_module,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct UnitInfo {
    pub id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    pub name: String,
    pub filename: String,
    pub first_line: u32,
    pub argument_count: u32,
    pub flags: Vec<String>,
    pub instruction_count: usize,
    pub jump_target_count: usize,
}

impl From<&ListingEntry> for UnitInfo {
    fn from(entry: &ListingEntry) -> Self {
        UnitInfo {
            id: entry.id.index(),
            parent: entry.parent.map(|parent| parent.index()),
            name: entry.name.clone(),
            filename: entry.filename.clone(),
            first_line: entry.first_line,
            argument_count: entry.unit.argcount,
            flags: entry.unit.flags.names(),
            instruction_count: entry.instructions.len(),
            jump_target_count: entry.jump_targets().len(),
        }
    }
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let module = load_module(path, opts)?;
    let units: Vec<UnitInfo> = module.listing().iter().map(UnitInfo::from).collect();

    print_output(&units, opts, |units| {
        let mut table = TabWriter::new(vec![
            ("ID", Align::Right),
            ("PARENT", Align::Right),
            ("LINE", Align::Right),
            ("NAME", Align::Left),
            ("ARGS", Align::Right),
            ("INSNS", Align::Right),
            ("FLAGS", Align::Left),
        ]);
        for unit in units {
            table.row(vec![
                format!("#{}", unit.id),
                unit.parent.map_or_else(|| "-".to_string(), |p| format!("#{p}")),
                unit.first_line.to_string(),
                unit.name.clone(),
                unit.argument_count.to_string(),
                unit.instruction_count.to_string(),
                unit.flags.join(", "),
            ]);
        }
        table.print();
    })
}
