// src/commands/scan.rs
//
// Scanner-only run: useful for inspecting what the closure contains before
// paying for codegen.

use ingot_compile::{scan, ScannerMetadataManager};
use ingot_types::TypeSystemContext;

use super::common::{build_config, build_group, build_roots, load_input};
use crate::cli::CompileArgs;
use crate::errors::DriverResult;

pub fn run_scan(args: &CompileArgs) -> DriverResult<()> {
    let ctx = TypeSystemContext::new();
    let (primary, references) = load_input(&ctx, args)?;
    let config = build_config(args);
    let group = build_group(&ctx, primary, &references);
    let roots = build_roots(&ctx, primary, args)?;

    let metadata = ScannerMetadataManager::default();
    let results = scan(&ctx, group.as_ref(), &config, &metadata, &[roots.as_ref()])?;

    let mut methods: Vec<String> = results
        .compiled_methods()
        .map(|m| ctx.method_display(m))
        .collect();
    methods.sort();
    println!("{} method bodies:", methods.len());
    for name in &methods {
        println!("  {}", name);
    }
    println!(
        "{} invokable methods, {} invokable types",
        results.invokable_methods().len(),
        results.invokable_types().len()
    );
    Ok(())
}
