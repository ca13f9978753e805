// intrinsics.rs
//
// Hardware intrinsic support policy. Methods on ISA classes under
// System.Runtime.Intrinsics.X86 either have a support level the compiler
// knows, are gated behind a runtime check, or cannot be pre-compiled.

use ingot_identity::MethodId;
use ingot_types::{TypeDesc, TypeSystemContext};

pub const INTRINSIC_NAMESPACE: &str = "System.Runtime.Intrinsics.X86";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicSupport {
    /// Baseline ISA: support is decided at compile time.
    CompileTimeKnown,
    /// Present-or-absent is probed at runtime; both paths are compiled.
    RuntimeChecked,
    /// Not modelled; the method is left for the runtime JIT.
    Unknown,
}

/// Support level of an ISA class by name.
pub fn isa_support(class_name: &str) -> IntrinsicSupport {
    match class_name {
        "Aes" | "Pclmulqdq" | "Sse3" | "Ssse3" | "Lzcnt" => IntrinsicSupport::RuntimeChecked,
        "Sse" | "Sse2" | "Sse41" | "Sse42" | "Popcnt" | "Bmi1" | "Bmi2" | "Avx" | "Avx2"
        | "Fma" => IntrinsicSupport::CompileTimeKnown,
        _ => IntrinsicSupport::Unknown,
    }
}

pub fn has_known_support_level_at_compile_time(class_name: &str) -> bool {
    isa_support(class_name) != IntrinsicSupport::Unknown
}

pub fn is_known_supported_intrinsic_at_compile_time(class_name: &str) -> bool {
    isa_support(class_name) == IntrinsicSupport::CompileTimeKnown
}

/// Intrinsic support for a method, `None` when the method is not on an ISA
/// class.
pub fn method_intrinsic_support(
    ctx: &TypeSystemContext,
    method: MethodId,
) -> Option<IntrinsicSupport> {
    let owner = ctx.method_owner(method);
    let def_ty = ctx.type_definition(owner);
    let TypeDesc::Def { module, def } = ctx.type_desc(def_ty) else {
        return None;
    };
    let m = ctx.module(module);
    let td = m.type_def(def);
    if td.namespace != INTRINSIC_NAMESPACE {
        return None;
    }
    Some(isa_support(&td.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_checked_listing() {
        for isa in ["Aes", "Pclmulqdq", "Sse3", "Ssse3", "Lzcnt"] {
            assert_eq!(isa_support(isa), IntrinsicSupport::RuntimeChecked);
            assert!(has_known_support_level_at_compile_time(isa));
            assert!(!is_known_supported_intrinsic_at_compile_time(isa));
        }
    }

    #[test]
    fn test_compile_time_known_listing() {
        for isa in [
            "Sse", "Sse2", "Sse41", "Sse42", "Popcnt", "Bmi1", "Bmi2", "Avx", "Avx2", "Fma",
        ] {
            assert!(is_known_supported_intrinsic_at_compile_time(isa));
        }
    }

    #[test]
    fn test_unknown_isa() {
        assert_eq!(isa_support("Avx512F"), IntrinsicSupport::Unknown);
        assert!(!has_known_support_level_at_compile_time("Avx512F"));
    }
}
