//! Collaborator seam for the bundler engine.
//!
//! The engine owns the dependency-graph algorithm and code generation; the
//! worker runtime attaches resolve/load/transform hooks and an
//! externalization predicate, then drives a graph build followed by one
//! generation pass per target.

use anyhow::Error;
use futures::future::LocalBoxFuture;

use crate::protocol::Warning;

/// Future returned by [`ModuleHooks::load`]. `Ok(None)` means the hook does
/// not know the module and the engine should treat it as missing.
pub type LoadFuture<'a> = LocalBoxFuture<'a, Result<Option<String>, Error>>;

/// Resolve/load/transform callbacks attached to a graph build.
pub trait ModuleHooks {
    /// Maps `(importee, importer)` to a module identity, or fails naming
    /// both.
    fn resolve_id(&self, importee: &str, importer: Option<&str>) -> Result<String, Error>;

    /// Produces the source text for a resolved module identity. May suspend
    /// on the network.
    fn load(&self, id: &str) -> LoadFuture<'_>;

    /// Rewrites module source before it enters the graph. `Ok(None)` passes
    /// the module through unmodified.
    fn transform(&self, code: &str, id: &str) -> Result<Option<String>, Error>;
}

/// Options for one graph build.
pub struct GraphOptions<'a> {
    /// Entry point module identity.
    pub input: &'a str,
    /// Marks identities the engine must leave for the host environment.
    pub external: &'a dyn Fn(&str) -> bool,
    /// Collapse dynamic imports into the single output chunk.
    pub inline_dynamic_imports: bool,
    /// Sink for engine-level warnings.
    pub on_warn: &'a dyn Fn(Warning),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Immediately-invoked named artifact.
    Iife,
    Esm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportsMode {
    Named,
    Default,
    Auto,
}

/// Options for one generation pass over a built graph.
pub struct GenerateOptions<'a> {
    pub format: OutputFormat,
    /// Global name of the IIFE artifact.
    pub name: &'a str,
    pub exports: ExportsMode,
    pub sourcemap: bool,
    /// Called once per distinct external module identifier; returns the
    /// local binding name the generated code should use for it.
    pub globals: &'a mut dyn FnMut(&str) -> String,
}

/// A generated chunk plus the external imports it references.
#[derive(Debug, Clone)]
pub struct GeneratedChunk {
    pub code: String,
    pub map: Option<String>,
    pub imports: Vec<String>,
}

/// A built module graph, ready for one or more generation passes.
pub trait ModuleGraph {
    fn generate(&self, options: GenerateOptions<'_>) -> Result<GeneratedChunk, Error>;
}

pub trait BundlerEngine {
    /// Builds the module graph for `options.input`, calling back into
    /// `hooks` for resolution, loading and transformation.
    fn build_graph<'a>(
        &'a self,
        hooks: &'a dyn ModuleHooks,
        options: GraphOptions<'a>,
    ) -> LocalBoxFuture<'a, Result<Box<dyn ModuleGraph>, Error>>;
}
