// display.rs
//
// Human-readable names for diagnostics and edge reasons.

use ingot_identity::{MethodId, TypeId};

use crate::context::TypeSystemContext;
use crate::desc::{GenericParamOwner, TypeDesc};

impl TypeSystemContext {
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.type_desc(ty) {
            TypeDesc::Def { module, def } => {
                let m = self.module(module);
                let td = m.type_def(def);
                if td.namespace.is_empty() {
                    td.name.clone()
                } else {
                    format!("{}.{}", td.namespace, td.name)
                }
            }
            TypeDesc::Instantiated { def, args } => {
                let args: Vec<String> = args.iter().map(|&a| self.type_name(a)).collect();
                format!("{}<{}>", self.type_name(def), args.join(","))
            }
            TypeDesc::Array { element, rank } => match rank {
                None => format!("{}[]", self.type_name(element)),
                Some(rank) => format!(
                    "{}[{}]",
                    self.type_name(element),
                    ",".repeat(rank.saturating_sub(1) as usize)
                ),
            },
            TypeDesc::ByRef(element) => format!("{}&", self.type_name(element)),
            TypeDesc::Pointer(element) => format!("{}*", self.type_name(element)),
            TypeDesc::FunctionPointer(sig) => {
                let sig = self.signature(sig);
                let params: Vec<String> = sig.params.iter().map(|&p| self.type_name(p)).collect();
                format!("fnptr({}) -> {}", params.join(","), self.type_name(sig.ret))
            }
            TypeDesc::GenericParam { owner, index } => match owner {
                GenericParamOwner::Type => format!("!{}", index),
                GenericParamOwner::Method => format!("!!{}", index),
            },
        }
    }

    pub fn method_display(&self, m: MethodId) -> String {
        let owner = self.type_name(self.method_owner(m));
        let name = self.method_name(m);
        let inst = self.method_instantiation(m);
        if inst.is_empty() {
            format!("{}.{}", owner, name)
        } else {
            let args: Vec<String> = inst.iter().map(|&a| self.type_name(a)).collect();
            format!("{}.{}<{}>", owner, name, args.join(","))
        }
    }
}
