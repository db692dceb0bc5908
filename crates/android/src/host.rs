//! [`ModHost`] implementations
//!
//! - [`FsHost`]: reads and writes the generated `android/` directory
//! - [`MemoryHost`]: keeps files in memory, for embedding and dry runs

use crate::generated_file::{FileKind, GeneratedFile};
use crate::orchestrator::ModHost;
use seva_core::error::{Error, Result, ResultExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Host backed by a generated native project on disk
#[derive(Debug, Clone)]
pub struct FsHost {
    android_dir: PathBuf,
    dry_run: bool,
}

impl FsHost {
    /// Open a generated project; the directory itself must exist
    pub fn new(android_dir: impl Into<PathBuf>) -> Result<Self> {
        let android_dir = android_dir.into();
        if !android_dir.is_dir() {
            return Err(Error::file_not_found(&android_dir)
                .with_context("The android directory does not exist"));
        }
        Ok(Self {
            android_dir,
            dry_run: false,
        })
    }

    /// Never touch the disk on write
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Root of the generated project
    pub fn android_dir(&self) -> &Path {
        &self.android_dir
    }

    /// First existing candidate path for `kind`
    pub fn locate(&self, kind: FileKind) -> Option<PathBuf> {
        kind.candidates()
            .iter()
            .map(|rel| self.android_dir.join(rel))
            .find(|p| p.is_file())
    }

    /// Load every generated file into a [`MemoryHost`]
    pub fn snapshot(&self) -> Result<MemoryHost> {
        let mut memory = MemoryHost::new();
        for kind in FileKind::ALL {
            if let Some(file) = self.load(kind)? {
                memory = memory.with_file(file);
            }
        }
        Ok(memory)
    }

    fn load(&self, kind: FileKind) -> Result<Option<GeneratedFile>> {
        let Some(path) = self.locate(kind) else {
            return Ok(None);
        };
        let contents = std::fs::read_to_string(&path)
            .map_err(Error::from)
            .context(format!("While reading {}", path.display()))?;
        Ok(Some(GeneratedFile::new(kind, path, contents)))
    }
}

impl ModHost for FsHost {
    fn read(&mut self, kind: FileKind) -> Result<Option<GeneratedFile>> {
        self.load(kind)
    }

    fn write(&mut self, file: &GeneratedFile) -> Result<()> {
        if self.dry_run {
            tracing::info!(path = %file.path.display(), "Dry run, not writing");
            return Ok(());
        }
        std::fs::write(&file.path, &file.contents)
            .map_err(Error::from)
            .context(format!("While writing {}", file.path.display()))?;
        tracing::debug!(path = %file.path.display(), bytes = file.len(), "Wrote patched file");
        Ok(())
    }
}

/// In-memory host, one file per kind
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    files: BTreeMap<FileKind, GeneratedFile>,
    writes: usize,
}

impl MemoryHost {
    /// Empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the file for its kind
    pub fn with_file(mut self, file: GeneratedFile) -> Self {
        self.files.insert(file.kind, file);
        self
    }

    /// Current file for `kind`
    pub fn get(&self, kind: FileKind) -> Option<&GeneratedFile> {
        self.files.get(&kind)
    }

    /// Number of writes received
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ModHost for MemoryHost {
    fn read(&mut self, kind: FileKind) -> Result<Option<GeneratedFile>> {
        Ok(self.files.get(&kind).cloned())
    }

    fn write(&mut self, file: &GeneratedFile) -> Result<()> {
        self.writes += 1;
        self.files.insert(file.kind, file.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated_file::Dialect;
    use crate::orchestrator::Pipeline;
    use seva_core::config::ConfigSchema;
    use seva_core::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn scaffold(dir: &Path) {
        fs::create_dir_all(dir.join("app/src/main")).unwrap();
        fs::write(dir.join("build.gradle"), "allprojects {\n}\n").unwrap();
        fs::write(dir.join("app/build.gradle"), "android {\n}\n").unwrap();
        fs::write(
            dir.join("app/src/main/AndroidManifest.xml"),
            "<manifest><application/></manifest>",
        )
        .unwrap();
    }

    #[test]
    fn test_missing_android_dir() {
        let err = FsHost::new("/nonexistent/android").unwrap_err();
        assert_eq!(err.code, ErrorCode::FileNotFound);
    }

    #[test]
    fn test_locate_prefers_groovy() {
        let tmp = TempDir::new().unwrap();
        scaffold(tmp.path());
        fs::write(tmp.path().join("build.gradle.kts"), "").unwrap();

        let host = FsHost::new(tmp.path()).unwrap();
        assert_eq!(
            host.locate(FileKind::ProjectBuild).unwrap(),
            tmp.path().join("build.gradle")
        );
    }

    #[test]
    fn test_reads_kotlin_variant() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("app")).unwrap();
        fs::write(tmp.path().join("app/build.gradle.kts"), "android {\n}\n").unwrap();

        let mut host = FsHost::new(tmp.path()).unwrap();
        let file = host.read(FileKind::AppBuild).unwrap().unwrap();
        assert_eq!(file.dialect, Dialect::Kotlin);
        assert!(host.read(FileKind::Manifest).unwrap().is_none());
    }

    #[test]
    fn test_pipeline_writes_files() {
        let tmp = TempDir::new().unwrap();
        scaffold(tmp.path());

        let mut host = FsHost::new(tmp.path()).unwrap();
        let report = Pipeline::from_config(&ConfigSchema::default())
            .unwrap()
            .run(&mut host)
            .unwrap();
        assert_eq!(report.changed_count(), 3);

        let project = fs::read_to_string(tmp.path().join("build.gradle")).unwrap();
        assert!(project.contains("force \"androidx.core:core:1.16.0\""));
        let manifest =
            fs::read_to_string(tmp.path().join("app/src/main/AndroidManifest.xml")).unwrap();
        assert!(manifest.contains("xmlns:tools=\"http://schemas.android.com/tools\""));
    }

    #[test]
    fn test_dry_run_leaves_disk_alone() {
        let tmp = TempDir::new().unwrap();
        scaffold(tmp.path());

        let mut host = FsHost::new(tmp.path()).unwrap().dry_run(true);
        let report = Pipeline::from_config(&ConfigSchema::default())
            .unwrap()
            .run(&mut host)
            .unwrap();
        assert_eq!(report.changed_count(), 3);

        let project = fs::read_to_string(tmp.path().join("build.gradle")).unwrap();
        assert_eq!(project, "allprojects {\n}\n");
    }

    #[test]
    fn test_snapshot() {
        let tmp = TempDir::new().unwrap();
        scaffold(tmp.path());

        let memory = FsHost::new(tmp.path()).unwrap().snapshot().unwrap();
        assert_eq!(memory.get(FileKind::AppBuild).unwrap().contents, "android {\n}\n");
        assert_eq!(memory.writes(), 0);
    }
}
