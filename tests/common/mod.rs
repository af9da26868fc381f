//! Test collaborators: a counting compiler, a scanning bundler engine and an
//! in-memory fetcher, wired together by [`TestFactory`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Error};
use futures::future::LocalBoxFuture;
use regex::Regex;

use hamber_bundler::compiler::{CompileOptions, CompileOutput, ComponentCompiler};
use hamber_bundler::engine::{
    BundlerEngine, GenerateOptions, GeneratedChunk, GraphOptions, ModuleGraph, ModuleHooks,
};
use hamber_bundler::module_loader::TextFetcher;
use hamber_bundler::{CollaboratorFactory, Collaborators, InitOptions};

/// Compiler double that passes source through (so imports stay scannable)
/// and counts invocations to make transform-cache hits observable.
pub struct CountingCompiler {
    compiles: Arc<AtomicUsize>,
}

impl ComponentCompiler for CountingCompiler {
    fn version(&self) -> &str {
        "3.0.0-test"
    }

    fn compile(&self, source: &str, options: &CompileOptions) -> Result<CompileOutput, Error> {
        if source.contains("syntax-error") {
            return Err(anyhow!("Unexpected token (1:0) in {}", options.filename));
        }
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(CompileOutput {
            code: format!("// compiled:{}\n{}", options.filename, source),
            warnings: Vec::new(),
            legacy_warnings: Vec::new(),
        })
    }
}

/// Engine double: walks import statements breadth-first through the hooks
/// and concatenates modules into a fake IIFE chunk.
pub struct ScanningEngine;

impl BundlerEngine for ScanningEngine {
    fn build_graph<'a>(
        &'a self,
        hooks: &'a dyn ModuleHooks,
        options: GraphOptions<'a>,
    ) -> LocalBoxFuture<'a, Result<Box<dyn ModuleGraph>, Error>> {
        Box::pin(async move {
            let import_re =
                Regex::new(r#"import(?:\s+[^'"]+?\s+from)?\s*['"]([^'"]+)['"]"#).unwrap();

            let mut modules: Vec<(String, String)> = Vec::new();
            let mut externals: Vec<String> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();

            let entry = hooks.resolve_id(options.input, None)?;
            let mut queue = VecDeque::from([entry]);
            while let Some(id) = queue.pop_front() {
                if !seen.insert(id.clone()) {
                    continue;
                }
                let code = hooks
                    .load(&id)
                    .await?
                    .ok_or_else(|| anyhow!("module not found: {}", id))?;
                let code = hooks.transform(&code, &id)?.unwrap_or(code);

                for caps in import_re.captures_iter(&code) {
                    let specifier = caps[1].to_string();
                    if (options.external)(&specifier) {
                        if !externals.contains(&specifier) {
                            externals.push(specifier);
                        }
                        continue;
                    }
                    let resolved = hooks.resolve_id(&specifier, Some(&id))?;
                    if !seen.contains(&resolved) {
                        queue.push_back(resolved);
                    }
                }
                modules.push((id, code));
            }

            Ok(Box::new(ScannedGraph { modules, externals }) as Box<dyn ModuleGraph>)
        })
    }
}

pub struct ScannedGraph {
    modules: Vec<(String, String)>,
    externals: Vec<String>,
}

impl ModuleGraph for ScannedGraph {
    fn generate(&self, mut options: GenerateOptions<'_>) -> Result<GeneratedChunk, Error> {
        let mut bindings: Vec<String> = Vec::with_capacity(self.externals.len());
        for id in &self.externals {
            bindings.push((options.globals)(id));
        }

        let mut code = format!(
            "var {} = (function ({}) {{\n\"use strict\";\n",
            options.name,
            bindings.join(", ")
        );
        for (id, module_code) in &self.modules {
            code.push_str(&format!("// {}\n{}\n", id, module_code));
        }
        code.push_str("return {};\n})(");
        code.push_str(&bindings.join(", "));
        code.push_str(");\n");

        let map = options
            .sourcemap
            .then(|| r#"{"version":3,"mappings":""}"#.to_string());

        Ok(GeneratedChunk {
            code,
            map,
            imports: self.externals.clone(),
        })
    }
}

/// Fetcher double serving from an in-memory URL map, recording every fetch.
pub struct RecordingFetcher {
    fetched: Arc<Mutex<Vec<String>>>,
    sources: Arc<HashMap<String, String>>,
}

impl TextFetcher for RecordingFetcher {
    fn fetch_text(&self, url: &str) -> LocalBoxFuture<'static, Result<String, Error>> {
        self.fetched.lock().unwrap().push(url.to_string());
        let text = self
            .sources
            .get(url)
            .cloned()
            .unwrap_or_else(|| "export default {};".to_string());
        Box::pin(async move { Ok(text) })
    }
}

pub struct TestFactory {
    pub compiles: Arc<AtomicUsize>,
    pub fetched: Arc<Mutex<Vec<String>>>,
    pub remote_sources: Arc<HashMap<String, String>>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self::with_remote_sources(HashMap::new())
    }

    pub fn with_remote_sources(remote_sources: HashMap<String, String>) -> Self {
        Self {
            compiles: Arc::new(AtomicUsize::new(0)),
            fetched: Arc::new(Mutex::new(Vec::new())),
            remote_sources: Arc::new(remote_sources),
        }
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl CollaboratorFactory for TestFactory {
    fn create(&self, _init: &InitOptions) -> Result<Collaborators, Error> {
        Ok(Collaborators {
            compiler: Rc::new(CountingCompiler {
                compiles: Arc::clone(&self.compiles),
            }),
            engine: Rc::new(ScanningEngine),
            fetcher: Rc::new(RecordingFetcher {
                fetched: Arc::clone(&self.fetched),
                sources: Arc::clone(&self.remote_sources),
            }),
        })
    }
}
