// config.rs
//
// Explicit configuration passed to both passes. The environment toggles are
// read once at the CLI boundary; nothing below reads the environment.

use ingot_graph::TrackingLevel;

/// Which pass a node factory serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationMode {
    Scanning,
    Compiling,
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Library rooting includes canonical instantiations of generics
    /// (`ROOT_CANONICAL_CODE`).
    pub root_canonical_code: bool,
    /// Emit an empty body for every generic method (`NO_GENERIC_CODE`).
    pub no_generic_code: bool,
    /// Emit an empty body for non-canonical instantiations of generics
    /// (`ONLY_CANONICAL_CODE`).
    pub only_canonical_code: bool,
    /// Log every method as its compilation begins.
    pub verbose: bool,
    /// Edge provenance retention for diagnostics.
    pub tracking: TrackingLevel,
    /// Instantiation nesting depth at which recursive generic expansion
    /// falls back to canonical code and a runtime lookup.
    pub generic_depth_cutoff: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            root_canonical_code: false,
            no_generic_code: false,
            only_canonical_code: false,
            verbose: false,
            tracking: TrackingLevel::FirstEdge,
            generic_depth_cutoff: 8,
        }
    }
}
