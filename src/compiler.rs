//! Collaborator seam for the component compiler.
//!
//! The worker runtime drives the compiler through this trait; the concrete
//! implementation is supplied by the [`crate::CollaboratorFactory`] at init
//! time and constructed on the worker thread, so it does not need to be
//! `Send`.

use anyhow::Error;

use crate::protocol::Warning;

/// Compilation target of one generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerateTarget {
    Dom,
    Ssr,
}

/// Module format the compiler should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    Esm,
    Cjs,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub generate: GenerateTarget,
    pub format: ModuleFormat,
    pub name: String,
    pub filename: String,
    pub dev: bool,
}

/// Output of one component compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub code: String,
    pub warnings: Vec<Warning>,
    /// Older compiler versions report warnings under a stats surface; both
    /// surfaces are unioned into the request's warning list.
    pub legacy_warnings: Vec<Warning>,
}

pub trait ComponentCompiler {
    /// Compiler version, logged once per bundle request.
    fn version(&self) -> &str;

    fn compile(&self, source: &str, options: &CompileOptions) -> Result<CompileOutput, Error>;
}
