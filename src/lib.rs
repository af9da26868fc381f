#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod bundler;
pub mod compiler;
pub mod emit;
pub mod engine;
pub mod error;
pub mod example;
pub mod module_loader;
pub mod pool;
pub mod protocol;
pub mod worker;

#[macro_use]
extern crate lazy_static;

pub use bundler::Bundler;
pub use error::{ErrorInfo, ErrorKind, SubmitError};
pub use example::{order_example_files, ExampleFile};
pub use pool::WorkerPool;
pub use protocol::{Artifact, BundleResult, FileType, ImportSymbolMap, SourceFile, Warning};
pub use worker::{CollaboratorFactory, Collaborators, InitOptions, WorkerConfig};

pub use anyhow;
pub use serde_json;
