// compilation.rs
//
// The compiler pass: a fresh factory wired for codegen, the scan oracles
// threaded in, and the external backend invoked per method node. The
// marked set must stay inside the scanner's closure; any demand the
// scanner did not predict aborts the run with the responsible dependency
// chain.

use std::path::Path;

use ingot_graph::{DependencyGraph, NodeId};
use ingot_identity::MethodId;
use ingot_types::{ModuleGroup, TypeSystemContext};

use crate::backend::{CodegenBackend, MethodCode};
use crate::config::{CompilationMode, CompilerConfig};
use crate::error::{CompileError, CompileResult};
use crate::factory::CompileEnv;
use crate::key::NodeKey;
use crate::metadata::{MetadataManager, MetadataResult};
use crate::oracles::ScanResults;
use crate::provider::CompilationProvider;
use crate::roots::{RootProvider, Rooter};

/// One marked node in emission order.
#[derive(Debug, Clone)]
pub struct MarkedNode {
    pub node: NodeId,
    pub key: NodeKey,
    pub name: String,
}

/// One compiled method body.
#[derive(Debug, Clone)]
pub struct CompiledMethodRecord {
    pub method: MethodId,
    pub name: String,
    pub code: MethodCode,
}

/// Everything the object writer needs: the stable marked order, the
/// compiled bodies, metadata, and exported symbols.
#[derive(Debug, Default)]
pub struct CompiledImage {
    pub marked: Vec<MarkedNode>,
    pub methods: Vec<CompiledMethodRecord>,
    pub metadata: MetadataResult,
    pub exports: Vec<(NodeId, String)>,
}

/// The object-file writer interface. The writer owns section layout; the
/// image guarantees a topologically stable marked-node order.
pub trait ObjectWriter {
    fn emit_object(
        &mut self,
        output: &Path,
        ctx: &TypeSystemContext,
        image: &CompiledImage,
    ) -> std::io::Result<()>;
}

/// Run the compiler pass over the scan oracles.
#[tracing::instrument(skip_all)]
pub fn compile<'e>(
    ctx: &'e TypeSystemContext,
    group: &'e dyn ModuleGroup,
    config: &'e CompilerConfig,
    metadata: &'e dyn MetadataManager,
    oracles: &'e ScanResults,
    backend: &'e mut dyn CodegenBackend,
    roots: &[&dyn RootProvider],
) -> CompileResult<CompiledImage> {
    let env = CompileEnv {
        ctx,
        group,
        config,
        metadata,
        mode: CompilationMode::Compiling,
    };
    let mut provider = CompilationProvider::new(env);
    provider.oracles = Some(oracles);
    provider.backend = Some(backend);
    let mut graph = DependencyGraph::new(config.tracking);
    let mut exports = Vec::new();

    {
        let mut rooter = Rooter {
            factory: &mut provider.factory,
            env: &provider.env,
            graph: &mut graph,
            filter: None,
            exports: &mut exports,
        };
        for provider_ in roots {
            provider_.add_compilation_roots(&mut rooter);
        }
    }

    graph.compute_marked_nodes(&mut provider);

    if let Some((node, detail)) = provider.failure.take() {
        let chain: Vec<String> = graph
            .first_dependency_chain(node)
            .iter()
            .map(|&(n, reason)| format!("{} [{}]", provider.factory.node_name(ctx, n), reason))
            .collect();
        return Err(CompileError::scanner_failed(format!(
            "{detail}; dependency chain: {}",
            chain.join(" -> ")
        )));
    }

    let mut image = CompiledImage {
        exports,
        ..CompiledImage::default()
    };
    for &node in graph.marked_nodes() {
        let key = provider.factory.key(node);
        image.marked.push(MarkedNode {
            node,
            key,
            name: provider.factory.node_name(ctx, node),
        });
        if let NodeKey::MethodEntrypoint(m) | NodeKey::CanonicalEntrypoint(m) = key
            && let Some(code) = provider.code.get(&m)
        {
            image.methods.push(CompiledMethodRecord {
                method: m,
                name: ctx.method_display(m),
                code: code.clone(),
            });
        }
    }

    let marked_keys: Vec<NodeKey> = image.marked.iter().map(|n| n.key).collect();
    image.metadata = metadata.compute_metadata(ctx, &marked_keys);

    report_generic_code_size(ctx, &image);
    tracing::info!(
        marked = image.marked.len(),
        methods = image.methods.len(),
        "compilation reached fixed point"
    );
    Ok(image)
}

// Diagnostic only; the format is not a contract.
fn report_generic_code_size(ctx: &TypeSystemContext, image: &CompiledImage) {
    let (count, bytes) = image
        .methods
        .iter()
        .filter(|m| {
            !ctx.method_instantiation(m.method).is_empty()
                || !ctx.type_instantiation(ctx.method_owner(m.method)).is_empty()
        })
        .fold((0usize, 0usize), |(count, bytes), m| {
            (count + 1, bytes + m.code.bytes.len())
        });
    tracing::info!(methods = count, bytes, "generic code size");
}
