// src/commands/compile.rs
//
// The full pipeline: load modules, scan to fixed point, thread the oracles
// into the compiler pass, emit the image.

use std::path::PathBuf;
use std::rc::Rc;

use ingot_compile::{
    compile, scan, FilteredRootProvider, ObjectWriter, RootProvider, ScannerMetadataManager,
    UsageBasedMetadataManager,
};
use ingot_types::TypeSystemContext;

use super::common::{build_config, build_group, build_roots, load_input};
use crate::backend::SummaryBackend;
use crate::cli::CompileArgs;
use crate::emit::FlatObjectWriter;
use crate::errors::{DriverError, DriverResult};

pub fn run_compile(args: &CompileArgs) -> DriverResult<()> {
    let ctx = TypeSystemContext::new();
    let (primary, references) = load_input(&ctx, args)?;
    let config = build_config(args);
    let group = build_group(&ctx, primary, &references);
    let roots = build_roots(&ctx, primary, args)?;

    // Scanner pass: cheap body importer, two-phase metadata policy.
    let scan_metadata = ScannerMetadataManager::default();
    let results = Rc::new(scan(
        &ctx,
        group.as_ref(),
        &config,
        &scan_metadata,
        &[roots.as_ref()],
    )?);
    tracing::info!(
        compiled = results.compiled_methods().count(),
        "scanner finished"
    );

    // Compiler pass: scan results become the oracles, library roots are
    // filtered down to what the scanner proved live.
    let compile_metadata = UsageBasedMetadataManager::from_scan(&results);
    let filtered;
    let compile_roots: &dyn RootProvider = if args.library {
        filtered = FilteredRootProvider::new(roots.as_ref(), results.clone());
        &filtered
    } else {
        roots.as_ref()
    };
    let mut backend = SummaryBackend::new();
    let image = compile(
        &ctx,
        group.as_ref(),
        &config,
        &compile_metadata,
        &results,
        &mut backend,
        &[compile_roots],
    )?;

    let output = output_path(args);
    FlatObjectWriter::new()
        .emit_object(&output, &ctx, &image)
        .map_err(|source| DriverError::Io {
            path: output.clone(),
            source,
        })?;

    println!(
        "wrote {} ({} symbols, {} method bodies)",
        output.display(),
        image.marked.len(),
        image.methods.len()
    );
    Ok(())
}

pub fn output_path(args: &CompileArgs) -> PathBuf {
    args.output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("image.json"))
}
