// backend.rs
//
// The codegen backend interface. The backend owns instruction selection;
// dependency discovery happens through the collector it is handed -- every
// symbol the generated code references must be requested through the node
// factory, which is how compile-time dependencies reach the graph.

use ingot_graph::NodeId;
use ingot_identity::MethodId;

use crate::error::CompileResult;
use crate::provider::DependencyCollector;

/// A relocation in a compiled body: patch `offset` with the address of the
/// node's symbol.
#[derive(Debug, Clone, Copy)]
pub struct Relocation {
    pub offset: u32,
    pub target: NodeId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInfo {
    pub frame_size: u32,
    pub has_frame_pointer: bool,
}

/// The backend's output for one method, cached on the method node.
#[derive(Debug, Clone, Default)]
pub struct MethodCode {
    pub bytes: Vec<u8>,
    pub relocs: Vec<Relocation>,
    pub frame: FrameInfo,
    pub gc_info: Vec<u8>,
}

impl MethodCode {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// External machine-code generator, exclusively owned by the compiler pass.
/// One method is compiled at a time.
pub trait CodegenBackend {
    /// Compile one method body. Implementations request every referenced
    /// symbol through `deps` (the factory callbacks), populate relocations
    /// against the returned node ids, and may fail with
    /// `RequiresRuntimeJit` for bodies they cannot pre-compile.
    fn compile_method(
        &mut self,
        method: MethodId,
        deps: &mut DependencyCollector,
    ) -> CompileResult<MethodCode>;
}
