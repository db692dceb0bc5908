//! Generated native files and their dialects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which generated file a mod targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    /// `android/build.gradle`
    ProjectBuild,
    /// `android/app/build.gradle`
    AppBuild,
    /// `android/app/src/main/AndroidManifest.xml`
    Manifest,
}

impl FileKind {
    /// All kinds, in pipeline order
    pub const ALL: [FileKind; 3] = [FileKind::ProjectBuild, FileKind::AppBuild, FileKind::Manifest];

    /// Candidate paths relative to the android directory, preferred first
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            FileKind::ProjectBuild => &["build.gradle", "build.gradle.kts"],
            FileKind::AppBuild => &["app/build.gradle", "app/build.gradle.kts"],
            FileKind::Manifest => &["app/src/main/AndroidManifest.xml"],
        }
    }

    /// Stable name used in reports and config
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::ProjectBuild => "project-build",
            FileKind::AppBuild => "app-build",
            FileKind::Manifest => "manifest",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text dialect of a generated file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Groovy build script
    Groovy,
    /// Kotlin DSL build script
    Kotlin,
    /// XML document
    Xml,
    /// Anything else, tagged with its extension
    Other(String),
}

impl Dialect {
    /// Infer the dialect from a file name
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if name.ends_with(".gradle.kts") || name.ends_with(".kts") {
            Dialect::Kotlin
        } else if name.ends_with(".gradle") {
            Dialect::Groovy
        } else if name.ends_with(".xml") {
            Dialect::Xml
        } else {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            Dialect::Other(ext.to_string())
        }
    }

    /// Short tag used in messages
    pub fn as_str(&self) -> &str {
        match self {
            Dialect::Groovy => "groovy",
            Dialect::Kotlin => "kt",
            Dialect::Xml => "xml",
            Dialect::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build artifact produced by the native project generator
///
/// Only lives for one pipeline pass; mods take it by value and hand back
/// the patched copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Location of the file, as reported by the host
    pub path: PathBuf,
    /// Which generated file this is
    pub kind: FileKind,
    /// Text dialect, inferred from the path by default
    pub dialect: Dialect,
    /// Full file text
    pub contents: String,
}

impl GeneratedFile {
    /// Create a file, inferring the dialect from its path
    pub fn new(kind: FileKind, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            dialect: Dialect::from_path(&path),
            path,
            kind,
            contents: contents.into(),
        }
    }

    /// Override the inferred dialect
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Length of the contents in bytes
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Whether the file has no contents
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
