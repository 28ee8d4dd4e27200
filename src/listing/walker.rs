//! Discovery and decoding of nested code units.
//!
//! A module's root unit reaches its functions, classes, lambdas and comprehensions through its
//! constant pool, and each of those can nest further units the same way. [`walk`] visits the
//! whole graph in pre-order (a unit before its nested units, nested units in constant pool
//! order) and decodes every unit exactly once.
//!
//! Identity is the allocation of the decoded unit: a unit that the serialized tree reaches a
//! second time through a back-reference is the same [`std::sync::Arc`], keeps the [`UnitId`]
//! of its first visit and is not decoded again. Constant pools cannot form cycles, so there is
//! no cycle guard.

use std::{collections::HashMap, sync::Arc};

use crate::{
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    disassembler::{decode_code_unit, Instruction},
    listing::{DisassemblyListing, ListingEntry, UnitId},
    pyc::CodeUnit,
    DecodeConfig, Error, Result,
};

/// Decodes every code unit reachable from `root` into a listing
///
/// # Arguments
/// * `root`        - The module's top-level code unit
/// * `config`      - Decode settings
/// * `diagnostics` - Receives non-fatal findings, e.g. jumps leaving their unit
///
/// # Errors
/// Returns [`crate::Error::InUnit`] wrapping the first decode error, tagged with the id and
/// name of the unit that failed.
pub fn walk(
    root: &Arc<CodeUnit>,
    config: &DecodeConfig,
    diagnostics: &Diagnostics,
) -> Result<DisassemblyListing> {
    let mut walker = CodeGraphWalker {
        config,
        diagnostics,
        seen: HashMap::new(),
        listing: DisassemblyListing::new(),
    };

    walker.run(root)?;

    log::debug!(
        "Decoded {} code units, {} instructions",
        walker.listing.len(),
        walker.listing.instruction_count()
    );

    Ok(walker.listing)
}

struct CodeGraphWalker<'a> {
    config: &'a DecodeConfig,
    diagnostics: &'a Diagnostics,
    seen: HashMap<*const CodeUnit, UnitId>,
    listing: DisassemblyListing,
}

impl CodeGraphWalker<'_> {
    /// Visits the graph with an explicit worklist, so nesting depth never touches the stack
    fn run(&mut self, root: &Arc<CodeUnit>) -> Result<()> {
        let mut pending = vec![(root.clone(), None)];

        while let Some((unit, parent)) = pending.pop() {
            let id = match self.seen.get(&Arc::as_ptr(&unit)) {
                Some(id) => {
                    log::debug!("Unit {} ({}) reached again, reusing its entry", id, unit.name);
                    *id
                }
                None => {
                    let id = self.decode(&unit, parent)?;
                    // reversed, so nested units come off the worklist in pool order
                    let mut nested: Vec<_> = unit
                        .nested_units()
                        .map(|nested| (nested.clone(), Some(id)))
                        .collect();
                    nested.reverse();
                    pending.extend(nested);
                    id
                }
            };

            if let Some(entry) = parent.and_then(|parent| self.listing.get_mut(parent)) {
                entry.children.push(id);
            }
        }

        Ok(())
    }

    fn decode(&mut self, unit: &Arc<CodeUnit>, parent: Option<UnitId>) -> Result<UnitId> {
        let id = UnitId(self.listing.len());
        let instructions = decode_code_unit(unit).map_err(|error| Error::InUnit {
            unit: id.index(),
            name: unit.name.clone(),
            source: Box::new(error),
        })?;

        log::debug!(
            "Unit {} {} from {} line {}: {} instructions",
            id,
            unit.name,
            unit.filename,
            unit.firstlineno,
            instructions.len()
        );

        if self.config.check_jump_targets {
            self.check_jumps(id, unit, &instructions);
        }

        self.seen.insert(Arc::as_ptr(unit), id);
        self.listing.push(ListingEntry {
            id,
            parent,
            name: unit.name.clone(),
            filename: unit.filename.clone(),
            first_line: unit.firstlineno,
            instructions,
            unit: unit.clone(),
            children: Vec::new(),
        });

        Ok(id)
    }

    fn check_jumps(&self, id: UnitId, unit: &CodeUnit, instructions: &[Instruction]) {
        for instruction in instructions {
            let Some(target) = instruction
                .argval
                .as_ref()
                .and_then(|argval| argval.jump_target())
            else {
                continue;
            };

            if instructions
                .binary_search_by_key(&target, |candidate| candidate.offset)
                .is_err()
            {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Warning,
                        DiagnosticCategory::Bytecode,
                        format!(
                            "{} at offset {} in {} jumps to {}, which is not an instruction boundary",
                            instruction.mnemonic, instruction.offset, unit.name, target
                        ),
                    )
                    .with_unit(id.index()),
                );
            }
        }
    }
}
