//! Data model and worker message protocol.
//!
//! Everything that crosses the control/worker boundary is defined here and is
//! plain serde data, so the transport can be swapped without touching the
//! bundling logic.

use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;

/// Extension used for component source files.
pub const COMPONENT_EXTENSION: &str = "hamber";
/// Extension used for plain script files.
pub const SCRIPT_EXTENSION: &str = "js";

/// The two file classes accepted by the playground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Component,
    Script,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Component => COMPONENT_EXTENSION,
            FileType::Script => SCRIPT_EXTENSION,
        }
    }

    /// Classifies a raw file extension. Anything that is not a component
    /// source is treated as a script.
    pub fn from_extension(ext: &str) -> Self {
        if ext == COMPONENT_EXTENSION {
            FileType::Component
        } else {
            FileType::Script
        }
    }
}

/// A named in-memory source file submitted as part of one bundle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub source: String,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        file_type: FileType,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file_type,
            source: source.into(),
        }
    }

    /// The synthetic module identifier this file resolves to within one
    /// request, e.g. `./App.hamber`.
    pub fn virtual_path(&self) -> String {
        format!("./{}.{}", self.name, self.file_type.extension())
    }
}

/// Control messages accepted by the worker runtime.
///
/// `init` must precede effective processing of any `bundle` message; the
/// worker parks early bundle requests on a readiness barrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    Init {
        framework_runtime_url: String,
        bundler_engine_url: String,
    },
    Bundle {
        id: u64,
        components: Vec<SourceFile>,
    },
}

/// A diagnostic reported by the component compiler or the bundler engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Location>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// External-module-identifier -> synthetic local binding name.
///
/// Built once during the dom generation pass and reused verbatim by the ssr
/// pass so both artifacts agree on identifier names. Entries keep first-seen
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSymbolMap {
    entries: Vec<(String, String)>,
}

impl ImportSymbolMap {
    /// Returns the binding for `id`, assigning the next sequential
    /// `import_{n}` name on first sight.
    pub fn assign(&mut self, id: &str) -> String {
        if let Some(name) = self.get(id) {
            return name.to_string();
        }
        let name = format!("import_{}", self.entries.len() + 1);
        self.entries.push((id.to_string(), name.clone()));
        name
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, name)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(id, name)| (id.as_str(), name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One generated chunk: code plus its source map (a JSON document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
}

/// The structured outcome of one bundle request, tagged with the request's
/// correlation ID. A null `dom` artifact paired with a non-null `error` is
/// the reliable failure signal; warnings are attached either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult {
    pub id: u64,
    pub imports: Vec<String>,
    pub import_map: ImportSymbolMap,
    pub dom: Option<Artifact>,
    pub ssr: Option<Artifact>,
    pub warnings: Vec<Warning>,
    pub error: Option<ErrorInfo>,
}
