//! Module resolution for bundle requests.
//!
//! Turns the submitted file list into a resolvable virtual module graph and
//! implements the resolve/load/transform hooks handed to the bundler engine.
//! Three module classes are understood: virtual files from the request's
//! lookup table, framework built-ins under the runtime base URL, and remote
//! http(s) modules served through the [`RemoteFetchCache`].

pub mod fetch;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Error;
use url::Url;

use crate::compiler::{
    CompileOptions, CompileOutput, ComponentCompiler, GenerateTarget, ModuleFormat,
};
use crate::engine::{LoadFuture, ModuleHooks};
use crate::error::BundleFailure;
use crate::protocol::{SourceFile, Warning, COMPONENT_EXTENSION};

pub use fetch::{FetchFailure, HttpTextFetcher, RemoteFetchCache, TextFetcher};

/// Root module name of the framework.
pub const FRAMEWORK_MODULE: &str = "hamber";
/// Namespace prefix for framework submodules.
pub const FRAMEWORK_PREFIX: &str = "hamber/";
/// Markup extension rewritten to the component-source extension.
pub const MARKUP_EXTENSION: &str = ".html";
/// Canonical entry point of every bundle.
pub const ENTRY_POINT: &str = "./App.hamber";

pub fn is_framework_module(id: &str) -> bool {
    id == FRAMEWORK_MODULE || id.starts_with(FRAMEWORK_PREFIX)
}

pub fn is_remote(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// External is anything that is neither relative, a framework module, nor an
/// http(s) URL; those are left for the host environment to supply.
pub fn is_external(id: &str) -> bool {
    !(id.starts_with('.') || is_framework_module(id) || is_remote(id))
}

/// Builds the per-request virtual-path lookup table. Duplicate paths: last
/// write wins.
pub fn build_lookup(components: &[SourceFile]) -> HashMap<String, SourceFile> {
    components
        .iter()
        .map(|component| (component.virtual_path(), component.clone()))
        .collect()
}

/// One transform-cache entry: compiled output valid while `source` equals the
/// current request's text for that virtual path.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub source: String,
    pub output: CompileOutput,
}

/// Per-virtual-path memoization of compiled output, one table per generate
/// target.
pub type TransformCache = HashMap<String, CompiledUnit>;

/// The resolve/load/transform hooks for one generation pass.
///
/// Owns the pass-local state: the snapshot of the previous transform cache,
/// the entries collected during this pass, and the warning list.
pub struct BundleModuleLoader<'a> {
    runtime_url: &'a str,
    lookup: &'a HashMap<String, SourceFile>,
    compiler: Rc<dyn ComponentCompiler>,
    fetch_cache: Rc<RemoteFetchCache>,
    target: GenerateTarget,
    dev: bool,
    snapshot: TransformCache,
    collected: RefCell<TransformCache>,
    warnings: RefCell<Vec<Warning>>,
}

impl<'a> BundleModuleLoader<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runtime_url: &'a str,
        lookup: &'a HashMap<String, SourceFile>,
        compiler: Rc<dyn ComponentCompiler>,
        fetch_cache: Rc<RemoteFetchCache>,
        target: GenerateTarget,
        dev: bool,
        snapshot: TransformCache,
    ) -> Self {
        Self {
            runtime_url,
            lookup,
            compiler,
            fetch_cache,
            target,
            dev,
            snapshot,
            collected: RefCell::new(TransformCache::new()),
            warnings: RefCell::new(Vec::new()),
        }
    }

    pub fn push_warning(&self, warning: Warning) {
        self.warnings.borrow_mut().push(warning);
    }

    /// Consumes the loader after a pass, yielding the newly collected cache
    /// entries and the warnings gathered so far.
    pub fn into_pass_state(self) -> (TransformCache, Vec<Warning>) {
        (self.collected.into_inner(), self.warnings.into_inner())
    }
}

impl ModuleHooks for BundleModuleLoader<'_> {
    fn resolve_id(&self, importee: &str, importer: Option<&str>) -> Result<String, Error> {
        if importee == FRAMEWORK_MODULE {
            return Ok(format!("{}/index.mjs", self.runtime_url));
        }
        if let Some(submodule) = importee.strip_prefix(FRAMEWORK_PREFIX) {
            return Ok(format!("{}/{}.mjs", self.runtime_url, submodule));
        }

        // Remote identities resolve to themselves; relative imports from a
        // remote module resolve against that module's URL.
        if is_remote(importee) {
            return Ok(importee.to_string());
        }
        if let Some(importer) = importer {
            if is_remote(importer) {
                let base = Url::parse(importer).map_err(|err| {
                    BundleFailure::resolution(format!(
                        "Invalid importer URL \"{}\": {}",
                        importer, err
                    ))
                })?;
                let joined = base.join(&format!("{}.mjs", importee)).map_err(|err| {
                    BundleFailure::resolution(format!(
                        "Could not resolve \"{}\" from \"{}\": {}",
                        importee, importer, err
                    ))
                })?;
                return Ok(joined.to_string());
            }
        }

        let importee = if let Some(stem) = importee.strip_suffix(MARKUP_EXTENSION) {
            format!("{}.{}", stem, COMPONENT_EXTENSION)
        } else {
            importee.to_string()
        };

        if self.lookup.contains_key(&importee) {
            return Ok(importee);
        }

        Err(BundleFailure::resolution(format!(
            "Could not resolve \"{}\" from \"{}\"",
            importee,
            importer.unwrap_or("<entry>")
        ))
        .into())
    }

    fn load(&self, id: &str) -> LoadFuture<'_> {
        if is_remote(id) {
            let fetch_cache = Rc::clone(&self.fetch_cache);
            let url = id.to_string();
            return Box::pin(async move {
                match fetch_cache.fetch(&url).await {
                    Ok(text) => Ok(Some(text)),
                    Err(failure) => {
                        Err(BundleFailure::network(failure.to_string(), failure.url).into())
                    }
                }
            });
        }

        let source = self.lookup.get(id).map(|file| file.source.clone());
        Box::pin(futures::future::ready(Ok(source)))
    }

    fn transform(&self, code: &str, id: &str) -> Result<Option<String>, Error> {
        if !id.ends_with(&format!(".{}", COMPONENT_EXTENSION)) {
            return Ok(None);
        }

        let name = id
            .trim_start_matches("./")
            .trim_end_matches(&format!(".{}", COMPONENT_EXTENSION))
            .to_string();

        let unit = match self.snapshot.get(id) {
            Some(cached) if cached.source == code => {
                log::debug!("transform cache hit for {}", id);
                cached.clone()
            }
            _ => {
                let filename = format!("{}.{}", name, COMPONENT_EXTENSION);
                let options = CompileOptions {
                    generate: self.target,
                    format: ModuleFormat::Esm,
                    name,
                    filename: filename.clone(),
                    dev: self.dev,
                };
                let output = self.compiler.compile(code, &options).map_err(|err| {
                    BundleFailure::compile(format!("{:#}", err), filename)
                })?;
                CompiledUnit {
                    source: code.to_string(),
                    output,
                }
            }
        };

        self.collected
            .borrow_mut()
            .insert(id.to_string(), unit.clone());

        // union of the primary and legacy diagnostics surfaces
        let mut warnings = self.warnings.borrow_mut();
        warnings.extend(unit.output.warnings.iter().cloned());
        warnings.extend(unit.output.legacy_warnings.iter().cloned());

        Ok(Some(unit.output.code))
    }
}
