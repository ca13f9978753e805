// src/commands/common.rs
//
// Shared driver plumbing: module loading, config assembly, rooting policy.

use std::fs;
use std::path::Path;

use ingot_compile::{
    CompilerConfig, LibraryRoot, ModuleEntrypointRoot, RootProvider, SingleMethodRoot,
};
use ingot_graph::TrackingLevel;
use ingot_identity::{MethodId, ModuleId};
use ingot_types::{
    ModuleData, ModuleGroup, SingleFileGroup, TypeSystemContext, TypeSystemError,
    VersionBubbleGroup,
};

use crate::cli::{CompileArgs, TrackingMode};
use crate::errors::{DriverError, DriverResult};

/// The three core toggles come from the environment exactly once, here at
/// the CLI boundary, and travel as explicit configuration from then on.
fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value == "1")
}

pub fn build_config(args: &CompileArgs) -> CompilerConfig {
    CompilerConfig {
        root_canonical_code: args.root_canonical_code || env_flag("ROOT_CANONICAL_CODE"),
        no_generic_code: args.no_generic_code || env_flag("NO_GENERIC_CODE"),
        only_canonical_code: args.only_canonical_code || env_flag("ONLY_CANONICAL_CODE"),
        verbose: args.verbose,
        tracking: match args.track {
            TrackingMode::None => TrackingLevel::None,
            TrackingMode::First => TrackingLevel::FirstEdge,
            TrackingMode::All => TrackingLevel::All,
        },
        ..CompilerConfig::default()
    }
}

pub fn load_module_file(ctx: &TypeSystemContext, path: &Path) -> DriverResult<ModuleId> {
    let text = fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data: ModuleData = serde_json::from_str(&text).map_err(|source| DriverError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(module = %data.name, path = %path.display(), "loading module");
    Ok(ctx.load_module(data)?)
}

/// Load the primary module plus its references; returns their ids.
pub fn load_input(
    ctx: &TypeSystemContext,
    args: &CompileArgs,
) -> DriverResult<(ModuleId, Vec<ModuleId>)> {
    let primary = load_module_file(ctx, &args.input)?;
    let mut references = Vec::new();
    for path in &args.references {
        references.push(load_module_file(ctx, path)?);
    }
    Ok((primary, references))
}

/// A lone module compiles as a single file; references form a version
/// bubble around the primary module.
pub fn build_group(
    ctx: &TypeSystemContext,
    primary: ModuleId,
    references: &[ModuleId],
) -> Box<dyn ModuleGroup> {
    if references.is_empty() {
        Box::new(SingleFileGroup::new(ctx))
    } else {
        Box::new(VersionBubbleGroup::new(
            ctx,
            primary,
            references.iter().copied(),
        ))
    }
}

pub fn build_roots(
    ctx: &TypeSystemContext,
    primary: ModuleId,
    args: &CompileArgs,
) -> DriverResult<Box<dyn RootProvider>> {
    if let Some(spec) = &args.single_method {
        let method = resolve_method_spec(ctx, primary, spec)?;
        return Ok(Box::new(SingleMethodRoot::new(method)));
    }
    if args.library {
        return Ok(Box::new(LibraryRoot::new(vec![primary])));
    }
    Ok(Box::new(ModuleEntrypointRoot::new(primary)))
}

/// Parse `Namespace.Type::Method` against the primary module.
pub fn resolve_method_spec(
    ctx: &TypeSystemContext,
    module: ModuleId,
    spec: &str,
) -> DriverResult<MethodId> {
    let (type_part, method_name) = spec.split_once("::").ok_or_else(|| {
        DriverError::BadMethodSpec {
            spec: spec.to_string(),
        }
    })?;
    let (namespace, type_name) = match type_part.rsplit_once('.') {
        Some((namespace, name)) => (namespace, name),
        None => ("", type_part),
    };
    let ty = ctx.get_type(module, namespace, type_name)?;
    ctx.methods_of(ty)
        .into_iter()
        .find(|&m| ctx.method_name(m) == method_name)
        .ok_or_else(|| {
            DriverError::TypeSystem(TypeSystemError::missing_method(type_part, method_name))
        })
}
