// backend.rs
//
// The reference codegen backend: a deterministic summariser that stands in
// for a real instruction selector. It walks the decoded body with the same
// token mapping the scanner uses, emits the IL opcode byte per instruction,
// and patches a 4-byte slot per referenced symbol. Real machine code is an
// external collaborator; this backend exists so the driver produces a
// complete, inspectable image end to end.

use ingot_compile::ilscan::{record_instruction, BodyContext};
use ingot_compile::{
    CodegenBackend, CompileResult, DependencyCollector, FrameInfo, MethodCode, Relocation,
};
use ingot_identity::MethodId;
use ingot_types::Instr;

pub struct SummaryBackend;

impl SummaryBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SummaryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn opcode(instr: &Instr) -> u8 {
    match instr {
        Instr::Call(_) => 0x28,
        Instr::Callvirt(_) => 0x6f,
        Instr::Newobj(_) => 0x73,
        Instr::Ldftn(_) => 0x06,
        Instr::Ldvirtftn(_) => 0x07,
        Instr::Newarr(_) => 0x8d,
        Instr::Box(_) => 0x8c,
        Instr::UnboxAny(_) => 0xa5,
        Instr::Castclass(_) => 0x74,
        Instr::Isinst(_) => 0x75,
        Instr::Ldstr(_) => 0x72,
        Instr::LdtokenType(_) | Instr::LdtokenMethod(_) | Instr::LdtokenField(_) => 0xd0,
        Instr::Ldsfld(_) => 0x7e,
        Instr::Stsfld(_) => 0x80,
        Instr::Ldfld(_) => 0x7b,
        Instr::Stfld(_) => 0x7d,
    }
}

impl CodegenBackend for SummaryBackend {
    fn compile_method(
        &mut self,
        method: MethodId,
        deps: &mut DependencyCollector,
    ) -> CompileResult<MethodCode> {
        let ctx = deps.env.ctx;
        let Some(body) = ctx.method_body(method)? else {
            return Ok(MethodCode::default());
        };
        let bctx = BodyContext::for_method(ctx, method);

        let mut code = MethodCode {
            frame: FrameInfo {
                frame_size: 16,
                has_frame_pointer: true,
            },
            ..MethodCode::default()
        };
        code.bytes.push(0x55); // prologue

        for instr in &body {
            let checkpoint = deps.edge_count();
            record_instruction(deps, &bctx, instr)?;
            code.bytes.push(opcode(instr));
            // One patchable slot per symbol the instruction referenced.
            for edge in deps.edges_since(checkpoint) {
                code.relocs.push(Relocation {
                    offset: code.bytes.len() as u32,
                    target: edge.target,
                });
                code.bytes.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
        code.bytes.push(0xc3); // epilogue
        code.gc_info = vec![code.relocs.len() as u8];
        Ok(code)
    }
}
