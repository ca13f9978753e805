// ilscan.rs
//
// The lightweight body importer: walks a method's decoded instruction
// summary and turns every token into node requests and, for shared code,
// dictionary entries. Both passes run this same mapping -- the scanner
// directly, the reference backend per instruction -- which is what makes
// the compiler's demands a subset of the scanner's by construction.
//
// Tokens in shared (canonical) bodies are resolved twice: once with the
// canonical instantiation for the concrete dependency, and once open to
// capture the dictionary entry that each instantiation will concretise.

use ingot_identity::{FieldId, MethodId, TypeId};
use ingot_types::{Instr, TypeIdVec, TypeSystemResult};
use ingot_types::{FieldExpr, MethodExpr, TypeExpr};

use crate::config::CompilationMode;
use crate::key::{DictionaryEntry, HelperId, HelperTarget};
use crate::provider::DependencyCollector;

/// Resolution context of one body: the owner and method instantiations and
/// whether the body is shared generic code.
pub struct BodyContext {
    pub method: MethodId,
    pub module: ingot_identity::ModuleId,
    pub type_args: TypeIdVec,
    pub method_args: TypeIdVec,
    pub shared: bool,
}

impl BodyContext {
    pub fn for_method(ctx: &ingot_types::TypeSystemContext, method: MethodId) -> Self {
        let (module, _) = ctx.method_ecma(method);
        let owner = ctx.method_owner(method);
        Self {
            method,
            module,
            type_args: ctx.type_instantiation(owner),
            method_args: ctx.method_instantiation(method),
            shared: ctx.is_canonical_method(method),
        }
    }
}

/// Walk a method body, recording every dependency it implies. Failures are
/// type-system failures of the one method; the caller degrades the node.
pub fn record_body_dependencies(
    col: &mut DependencyCollector,
    method: MethodId,
) -> TypeSystemResult<()> {
    let Some(body) = col.env.ctx.method_body(method)? else {
        return Ok(());
    };
    let bctx = BodyContext::for_method(col.env.ctx, method);
    for instr in &body {
        record_instruction(col, &bctx, instr)?;
    }
    Ok(())
}

/// Dependencies of a single instruction. The reference backend calls this
/// per instruction while emitting code, so both passes agree exactly.
pub fn record_instruction(
    col: &mut DependencyCollector,
    bctx: &BodyContext,
    instr: &Instr,
) -> TypeSystemResult<()> {
    match instr {
        Instr::Call(expr) | Instr::Ldftn(expr) => {
            let (target, open) = resolve_method_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::MethodEntrypoint(open));
            }
            let node = col.factory.method_entrypoint(col.env, target);
            col.depend(node, "call");
        }
        Instr::Callvirt(expr) | Instr::Ldvirtftn(expr) => {
            let (target, open) = resolve_method_token(col, bctx, expr)?;
            record_virtual_call(col, bctx, target, open)?;
        }
        Instr::Newobj(expr) => {
            let (ctor, open) = resolve_method_token(col, bctx, expr)?;
            let owner = col.env.ctx.method_owner(ctor);
            if let Some(open) = open {
                let open_owner = col.env.ctx.method_owner(open);
                col.record_dictionary_entry(bctx.method, DictionaryEntry::TypeHandle(open_owner));
                col.record_dictionary_entry(bctx.method, DictionaryEntry::MethodEntrypoint(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::New, HelperTarget::Type(owner));
            col.depend(helper, "allocation");
            let ctor_node = col.factory.method_entrypoint(col.env, ctor);
            col.depend(ctor_node, "constructor call");
        }
        Instr::Newarr(expr) => {
            let (element, open) = resolve_type_token(col, bctx, expr)?;
            let array = col.env.ctx.array_type(element);
            if let Some(open) = open {
                let open_array = col.env.ctx.array_type(open);
                col.record_dictionary_entry(bctx.method, DictionaryEntry::TypeHandle(open_array));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::NewArr, HelperTarget::Type(array));
            col.depend(helper, "array allocation");
        }
        Instr::Box(expr) => {
            let (ty, open) = resolve_type_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::TypeHandle(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::Box, HelperTarget::Type(ty));
            col.depend(helper, "box");
        }
        Instr::UnboxAny(expr) => {
            let (ty, open) = resolve_type_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::TypeHandle(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::Unbox, HelperTarget::Type(ty));
            col.depend(helper, "unbox");
        }
        Instr::Castclass(expr) => {
            let (ty, open) = resolve_type_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::TypeHandle(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::CastClass, HelperTarget::Type(ty));
            col.depend(helper, "cast");
        }
        Instr::Isinst(expr) => {
            let (ty, open) = resolve_type_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::TypeHandle(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::IsInstanceOf, HelperTarget::Type(ty));
            col.depend(helper, "type check");
        }
        Instr::Ldstr(value) => {
            let node = col.factory.string_literal(col.env, value);
            col.depend(node, "string literal");
        }
        Instr::LdtokenType(expr) => {
            let (ty, open) = resolve_type_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::TypeHandle(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::TypeHandle, HelperTarget::Type(ty));
            col.depend(helper, "type token");
        }
        Instr::LdtokenMethod(expr) => {
            let (m, open) = resolve_method_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::MethodHandle(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::MethodHandle, HelperTarget::Method(m));
            col.depend(helper, "method token");
        }
        Instr::LdtokenField(expr) => {
            let (f, open) = resolve_field_token(col, bctx, expr)?;
            if let Some(open) = open {
                col.record_dictionary_entry(bctx.method, DictionaryEntry::FieldHandle(open));
            }
            let helper = col
                .factory
                .ready_to_run_helper(HelperId::FieldHandle, HelperTarget::Field(f));
            col.depend(helper, "field token");
        }
        Instr::Ldsfld(expr) | Instr::Stsfld(expr) => {
            let (f, open) = resolve_field_token(col, bctx, expr)?;
            let ctx = col.env.ctx;
            let (module, def) = ctx.field_ecma(f);
            let has_rva = ctx.module(module).field_def(def).rva.is_some();
            if has_rva {
                // Validate the read now: an oversized element poisons the
                // referencing method, not the whole compilation (S6).
                ctx.field_rva_data(f)?;
                let node = col.factory.field_rva_data(f);
                col.depend(node, "field rva data");
            } else {
                if let Some(open) = open {
                    let open_owner = ctx.field_owner(open);
                    col.record_dictionary_entry(
                        bctx.method,
                        DictionaryEntry::TypeHandle(open_owner),
                    );
                }
                let owner = ctx.field_owner(f);
                let helper = col
                    .factory
                    .ready_to_run_helper(HelperId::GetStaticBase, HelperTarget::Type(owner));
                col.depend(helper, "static field access");
            }
        }
        Instr::Ldfld(expr) | Instr::Stfld(expr) => {
            let (f, _) = resolve_field_token(col, bctx, expr)?;
            let owner = col.env.ctx.field_owner(f);
            let node = col.factory.necessary_type_symbol(col.env, owner);
            col.depend(node, "instance field access");
        }
    }
    Ok(())
}

fn record_virtual_call(
    col: &mut DependencyCollector,
    bctx: &BodyContext,
    target: MethodId,
    open: Option<MethodId>,
) -> TypeSystemResult<()> {
    let ctx = col.env.ctx;
    if !ctx.method_flags(target).is_virtual {
        // `callvirt` on a non-virtual method is a null-checked direct call.
        if let Some(open) = open {
            col.record_dictionary_entry(bctx.method, DictionaryEntry::MethodEntrypoint(open));
        }
        let node = col.factory.method_entrypoint(col.env, target);
        col.depend(node, "call");
        return Ok(());
    }

    if let Some(open) = open {
        col.record_dictionary_entry(bctx.method, DictionaryEntry::MethodHandle(open));
    }
    let owner = ctx.method_owner(target);
    let owner_node = col.factory.necessary_type_symbol(col.env, owner);
    col.depend(owner_node, "virtual call receiver");

    // Devirtualisation: the compile pass may turn calls through effectively
    // sealed types into direct calls. The receiver must have been
    // constructed during the scan, or the direct target has no scanned
    // body to bind to.
    if col.env.mode == CompilationMode::Compiling
        && let Some(oracles) = col.oracles
        && !ctx.type_flags(owner).is_interface
        && col.env.group.contains_type(ctx, owner)
        && oracles.is_effectively_sealed(ctx, owner)
        && oracles.is_constructed(owner)
        && let Some(devirt) = ctx.resolve_virtual_slot(target, owner)?
        && !ctx.method_flags(devirt).is_abstract
    {
        let node = col.factory.method_entrypoint(col.env, devirt);
        col.depend(node, "devirtualized call");
        return Ok(());
    }

    let node = col.factory.virtual_method_use(col.env, target)?;
    col.depend(node, "virtual call");
    Ok(())
}

fn resolve_type_token(
    col: &mut DependencyCollector,
    bctx: &BodyContext,
    expr: &TypeExpr,
) -> TypeSystemResult<(TypeId, Option<TypeId>)> {
    let ctx = col.env.ctx;
    let resolved = ctx.resolve_type_expr(expr, bctx.module, &bctx.type_args, &bctx.method_args)?;
    if bctx.shared {
        let open = ctx.resolve_type_expr(expr, bctx.module, &[], &[])?;
        if ctx.type_flags(open).contains_generic_vars {
            return Ok((resolved, Some(open)));
        }
    }
    Ok((resolved, None))
}

fn resolve_method_token(
    col: &mut DependencyCollector,
    bctx: &BodyContext,
    expr: &MethodExpr,
) -> TypeSystemResult<(MethodId, Option<MethodId>)> {
    let ctx = col.env.ctx;
    let resolved =
        ctx.resolve_method_expr(expr, bctx.module, &bctx.type_args, &bctx.method_args)?;
    if bctx.shared {
        let open = ctx.resolve_method_expr(expr, bctx.module, &[], &[])?;
        let owner_open = ctx.type_flags(ctx.method_owner(open)).contains_generic_vars;
        let args_open = ctx
            .method_instantiation(open)
            .iter()
            .any(|&a| ctx.type_flags(a).contains_generic_vars);
        if owner_open || args_open {
            return Ok((resolved, Some(open)));
        }
    }
    Ok((resolved, None))
}

fn resolve_field_token(
    col: &mut DependencyCollector,
    bctx: &BodyContext,
    expr: &FieldExpr,
) -> TypeSystemResult<(FieldId, Option<FieldId>)> {
    let ctx = col.env.ctx;
    let resolved = ctx.resolve_field_expr(expr, bctx.module, &bctx.type_args, &bctx.method_args)?;
    if bctx.shared {
        let open = ctx.resolve_field_expr(expr, bctx.module, &[], &[])?;
        if ctx
            .type_flags(ctx.field_owner(open))
            .contains_generic_vars
        {
            return Ok((resolved, Some(open)));
        }
    }
    Ok((resolved, None))
}
