//! Bundle assembly: drives one graph build and one generation pass per
//! target and converts every failure into a structured result.
//!
//! Nothing in here rejects across the message boundary; callers of
//! [`assemble`] always receive a [`BundleResult`], with `error` set and a
//! null dom artifact on failure.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, Error};

use crate::compiler::GenerateTarget;
use crate::engine::{ExportsMode, GenerateOptions, GraphOptions, ModuleGraph, OutputFormat};
use crate::error::{BundleFailure, ErrorInfo};
use crate::module_loader::{
    build_lookup, is_external, BundleModuleLoader, TransformCache, ENTRY_POINT,
};
use crate::protocol::{Artifact, BundleResult, ImportSymbolMap, SourceFile, Warning};
use crate::worker::WorkerContext;

/// Global name of the immediately-invoked artifact.
pub const ARTIFACT_NAME: &str = "HamberComponent";

/// Outcome of one graph-build pass. A build error is captured here rather
/// than rethrown so the cache entries and warnings gathered before the
/// failure survive for the next attempt.
pub(crate) struct BundlePass {
    pub graph: Option<Box<dyn ModuleGraph>>,
    pub cache: TransformCache,
    pub warnings: Vec<Warning>,
    pub error: Option<Error>,
}

pub(crate) async fn get_bundle(
    ctx: &WorkerContext,
    target: GenerateTarget,
    snapshot: TransformCache,
    lookup: &HashMap<String, SourceFile>,
) -> BundlePass {
    let loader = BundleModuleLoader::new(
        &ctx.runtime_url,
        lookup,
        Rc::clone(&ctx.compiler),
        Rc::clone(&ctx.fetch_cache),
        target,
        ctx.config.dev,
        snapshot,
    );

    let (graph, error) = {
        let external = |id: &str| is_external(id);
        let on_warn = |warning: Warning| loader.push_warning(warning);
        let options = GraphOptions {
            input: ENTRY_POINT,
            external: &external,
            inline_dynamic_imports: true,
            on_warn: &on_warn,
        };
        match ctx.engine.build_graph(&loader, options).await {
            Ok(graph) => (Some(graph), None),
            Err(error) => (None, Some(error)),
        }
    };

    let (cache, warnings) = loader.into_pass_state();
    BundlePass {
        graph,
        cache,
        warnings,
        error,
    }
}

/// Runs the bundle assembly algorithm for one request.
pub(crate) async fn assemble(
    ctx: &Rc<WorkerContext>,
    id: u64,
    components: Vec<SourceFile>,
) -> BundleResult {
    log::info!(
        "running Hamber compiler version {}",
        ctx.compiler.version()
    );

    let lookup = build_lookup(&components);
    let dom_snapshot = ctx.caches.borrow().dom.clone();
    let BundlePass {
        graph,
        cache,
        warnings,
        error,
    } = get_bundle(ctx, GenerateTarget::Dom, dom_snapshot, &lookup).await;

    let mut import_map = ImportSymbolMap::default();
    let outcome = match (graph, error) {
        (_, Some(error)) => Err(error),
        (None, None) => Err(anyhow!("bundler engine produced no graph")),
        (Some(graph), None) => {
            // replace wholesale, not merged
            ctx.caches.borrow_mut().dom = cache;
            generate_artifacts(ctx, graph.as_ref(), &lookup, &mut import_map).await
        }
    };

    match outcome {
        Ok((dom, ssr, imports)) => BundleResult {
            id,
            imports,
            import_map,
            dom: Some(dom),
            ssr,
            warnings,
            error: None,
        },
        Err(err) => BundleResult {
            id,
            imports: Vec::new(),
            import_map,
            dom: None,
            ssr: None,
            warnings,
            error: Some(ErrorInfo::from_error(&err)),
        },
    }
}

/// Generates the dom artifact and, when the capability flag is set, the ssr
/// artifact reusing the dom pass's import symbol map.
async fn generate_artifacts(
    ctx: &Rc<WorkerContext>,
    dom_graph: &dyn ModuleGraph,
    lookup: &HashMap<String, SourceFile>,
    import_map: &mut ImportSymbolMap,
) -> Result<(Artifact, Option<Artifact>, Vec<String>), Error> {
    let dom_chunk = {
        let mut globals = |id: &str| import_map.assign(id);
        dom_graph
            .generate(GenerateOptions {
                format: OutputFormat::Iife,
                name: ARTIFACT_NAME,
                exports: ExportsMode::Named,
                sourcemap: true,
                globals: &mut globals,
            })
            .map_err(|err| Error::new(BundleFailure::generate(format!("{:#}", err))))?
    };

    let ssr = if ctx.config.ssr_enabled {
        let snapshot = ctx.caches.borrow().ssr.clone();
        let pass = get_bundle(ctx, GenerateTarget::Ssr, snapshot, lookup).await;
        match (pass.graph, pass.error) {
            (_, Some(error)) => return Err(error),
            (None, None) => return Err(anyhow!("bundler engine produced no graph")),
            (Some(graph), None) => {
                ctx.caches.borrow_mut().ssr = pass.cache;
                let mut globals = |id: &str| {
                    import_map
                        .get(id)
                        .map(str::to_string)
                        .unwrap_or_default()
                };
                let chunk = graph
                    .generate(GenerateOptions {
                        format: OutputFormat::Iife,
                        name: ARTIFACT_NAME,
                        exports: ExportsMode::Named,
                        sourcemap: true,
                        globals: &mut globals,
                    })
                    .map_err(|err| Error::new(BundleFailure::generate(format!("{:#}", err))))?;
                Some(Artifact {
                    code: chunk.code,
                    map: chunk.map,
                })
            }
        }
    } else {
        None
    };

    let imports = dom_chunk.imports;
    Ok((
        Artifact {
            code: dom_chunk.code,
            map: dom_chunk.map,
        },
        ssr,
        imports,
    ))
}
