// emit.rs
//
// Flat object writer: serialises the marked node list and compiled bodies
// into a deterministic JSON image. A real PE/ELF writer is an external
// collaborator; this one keeps the contract visible (stable symbol order,
// relocations by symbol name, metadata blob).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Serialize;

use ingot_compile::{CompiledImage, ObjectWriter};
use ingot_graph::NodeId;
use ingot_types::TypeSystemContext;

#[derive(Serialize)]
struct RelocOut {
    offset: u32,
    symbol: String,
}

#[derive(Serialize)]
struct MethodOut {
    name: String,
    code: String,
    frame_size: u32,
    gc_info: String,
    relocs: Vec<RelocOut>,
}

#[derive(Serialize)]
struct ImageOut {
    symbols: Vec<String>,
    methods: Vec<MethodOut>,
    exports: Vec<String>,
    metadata_blob: String,
    metadata_types: usize,
    metadata_methods: usize,
    metadata_fields: usize,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct FlatObjectWriter;

impl FlatObjectWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FlatObjectWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectWriter for FlatObjectWriter {
    fn emit_object(
        &mut self,
        output: &Path,
        _ctx: &TypeSystemContext,
        image: &CompiledImage,
    ) -> std::io::Result<()> {
        let names: FxHashMap<NodeId, &str> = image
            .marked
            .iter()
            .map(|n| (n.node, n.name.as_str()))
            .collect();

        let out = ImageOut {
            symbols: image.marked.iter().map(|n| n.name.clone()).collect(),
            methods: image
                .methods
                .iter()
                .map(|m| MethodOut {
                    name: m.name.clone(),
                    code: hex(&m.code.bytes),
                    frame_size: m.code.frame.frame_size,
                    gc_info: hex(&m.code.gc_info),
                    relocs: m
                        .code
                        .relocs
                        .iter()
                        .map(|r| RelocOut {
                            offset: r.offset,
                            symbol: names.get(&r.target).unwrap_or(&"<unknown>").to_string(),
                        })
                        .collect(),
                })
                .collect(),
            exports: image
                .exports
                .iter()
                .map(|(node, name)| {
                    format!("{} = {}", name, names.get(node).unwrap_or(&"<unknown>"))
                })
                .collect(),
            metadata_blob: hex(&image.metadata.blob),
            metadata_types: image.metadata.type_map.len(),
            metadata_methods: image.metadata.method_map.len(),
            metadata_fields: image.metadata.field_map.len(),
        };

        let file = File::create(output)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &out)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}
