//! Canonical ordering of example file sets.
//!
//! Pure and synchronous; independent of the bundling core. Defines the
//! fixture ordering used when constructing requests: the `App` component
//! first, then remaining components, then scripts, each group ascending by
//! name.

use crate::protocol::{FileType, SourceFile};

/// A raw example file before its name is split into base name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleFile {
    pub name: String,
    pub source: String,
}

impl ExampleFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Splits `base.extension` names and orders the files canonically.
pub fn order_example_files(files: &[ExampleFile]) -> Vec<SourceFile> {
    let mut ordered: Vec<SourceFile> = files
        .iter()
        .map(|file| {
            let (base, extension) = file
                .name
                .split_once('.')
                .unwrap_or((file.name.as_str(), ""));
            SourceFile::new(base, FileType::from_extension(extension), file.source.clone())
        })
        .collect();
    ordered.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    ordered
}

fn sort_key(file: &SourceFile) -> (u8, u8, &str) {
    let entry = u8::from(!(file.name == "App" && file.file_type == FileType::Component));
    let kind = u8::from(file.file_type != FileType::Component);
    (entry, kind, file.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_component_sorts_first_then_components_then_scripts() {
        let ordered = order_example_files(&[
            ExampleFile::new("Main.extra", ""),
            ExampleFile::new("App.hamber", ""),
            ExampleFile::new("Helper.hamber", ""),
        ]);

        let names: Vec<&str> = ordered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["App", "Helper", "Main"]);
        assert_eq!(ordered[0].file_type, FileType::Component);
        assert_eq!(ordered[2].file_type, FileType::Script);
    }

    #[test]
    fn names_order_ascending_within_a_type() {
        let ordered = order_example_files(&[
            ExampleFile::new("zebra.hamber", ""),
            ExampleFile::new("store.js", ""),
            ExampleFile::new("Alpha.hamber", ""),
            ExampleFile::new("App.hamber", ""),
            ExampleFile::new("actions.js", ""),
        ]);

        let names: Vec<&str> = ordered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["App", "Alpha", "zebra", "actions", "store"]);
    }

    #[test]
    fn a_script_named_app_does_not_sort_first() {
        let ordered = order_example_files(&[
            ExampleFile::new("App.js", ""),
            ExampleFile::new("Widget.hamber", ""),
        ]);
        let names: Vec<&str> = ordered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Widget", "App"]);
    }
}
