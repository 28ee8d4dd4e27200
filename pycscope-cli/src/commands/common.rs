use std::path::Path;

use anyhow::Context;
use pycscope::{CompiledModule, DecodeConfig};

use crate::app::GlobalOptions;

/// The decode configuration selected by the global options.
pub fn decode_config(opts: &GlobalOptions) -> DecodeConfig {
    if opts.strict {
        DecodeConfig::strict()
    } else {
        DecodeConfig::production()
    }
}

/// Decode a compiled module, logging its diagnostics.
pub fn load_module(path: &Path, opts: &GlobalOptions) -> anyhow::Result<CompiledModule> {
    let module = CompiledModule::from_path_with_config(path, &decode_config(opts))
        .with_context(|| format!("failed to decode module: {}", path.display()))?;

    if module.diagnostics().has_any() {
        log::info!("{}: {}", file_display_name(path), module.diagnostics().summary());
    }

    Ok(module)
}

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}
