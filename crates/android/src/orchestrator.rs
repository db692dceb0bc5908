//! Hook pipeline over the generated native files
//!
//! The build tool that produces the files is abstracted as a [`ModHost`].
//! Each [`Mod`] is bound to one [`FileKind`] and is a pure
//! `GeneratedFile -> GeneratedFile` transformation; the pipeline reads a
//! file from the host, runs the mod and writes back only changed files.

use crate::applicator::{PatchOutcome, TextPatch};
use crate::generated_file::{Dialect, FileKind, GeneratedFile};
use crate::manifest::ManifestPatch;
use crate::plugins;
use seva_core::config::ConfigSchema;
use seva_core::error::{Error, ErrorCode, Result, ResultExt};
use serde::Serialize;
use std::path::PathBuf;

/// Output of a single mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModResult {
    /// The file after the mod ran
    pub file: GeneratedFile,
    /// What the mod did
    pub outcome: PatchOutcome,
}

/// A named hook bound to one generated file kind
pub trait Mod {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// File kind this mod patches
    fn kind(&self) -> FileKind;

    /// Transform the file; errors abort the pipeline
    fn apply(&self, file: GeneratedFile) -> Result<ModResult>;
}

/// Text-path mod wrapping a [`TextPatch`]
#[derive(Debug, Clone)]
pub struct TextMod {
    kind: FileKind,
    patch: TextPatch,
}

impl TextMod {
    /// Mod applying `patch` to files of `kind`
    pub fn new(kind: FileKind, patch: TextPatch) -> Self {
        Self { kind, patch }
    }
}

impl Mod for TextMod {
    fn name(&self) -> &str {
        &self.patch.name
    }

    fn kind(&self) -> FileKind {
        self.kind
    }

    fn apply(&self, mut file: GeneratedFile) -> Result<ModResult> {
        if !self.patch.supports(&file.dialect) {
            let err = Error::unsupported_dialect(file.dialect.as_str(), self.patch.dialect.as_str());
            tracing::debug!(
                patch = %self.patch.name,
                path = %file.path.display(),
                "{}",
                err.message
            );
            return Ok(ModResult {
                file,
                outcome: PatchOutcome::skipped(err.code, err.message),
            });
        }

        let (contents, outcome) = self.patch.apply_to(&file.contents);
        file.contents = contents;
        Ok(ModResult { file, outcome })
    }
}

/// Element-tree mod wrapping a [`ManifestPatch`]
#[derive(Debug, Clone)]
pub struct ManifestMod {
    patch: ManifestPatch,
}

impl ManifestMod {
    /// Mod applying `patch` to the manifest
    pub fn new(patch: ManifestPatch) -> Self {
        Self { patch }
    }
}

impl Mod for ManifestMod {
    fn name(&self) -> &str {
        &self.patch.name
    }

    fn kind(&self) -> FileKind {
        FileKind::Manifest
    }

    fn apply(&self, mut file: GeneratedFile) -> Result<ModResult> {
        if file.dialect != Dialect::Xml {
            let err = Error::unsupported_dialect(file.dialect.as_str(), Dialect::Xml.as_str());
            return Ok(ModResult {
                file,
                outcome: PatchOutcome::skipped(err.code, err.message),
            });
        }

        let (contents, outcome) = self
            .patch
            .apply_to(&file.contents)
            .context(format!("While patching {}", file.path.display()))?;
        file.contents = contents;
        Ok(ModResult { file, outcome })
    }
}

/// Source and sink of generated files, owned by the build tool
pub trait ModHost {
    /// Read the file for `kind`, `None` when the generator did not emit it
    fn read(&mut self, kind: FileKind) -> Result<Option<GeneratedFile>>;

    /// Persist a patched file
    fn write(&mut self, file: &GeneratedFile) -> Result<()>;
}

/// Per-mod entry of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct ModReport {
    /// Mod name
    pub name: String,
    /// File kind the mod targets
    pub kind: FileKind,
    /// File path, absent when no file was generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// What the mod did
    pub outcome: PatchOutcome,
    /// Size before the mod ran
    pub bytes_before: usize,
    /// Size after the mod ran
    pub bytes_after: usize,
}

impl ModReport {
    /// Whether the mod changed its file
    pub fn changed(&self) -> bool {
        self.outcome.is_change()
    }
}

/// Result of a full pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    /// One entry per registered mod, in order
    pub mods: Vec<ModReport>,
}

impl PipelineReport {
    /// Number of files the run changed
    pub fn changed_count(&self) -> usize {
        self.mods.iter().filter(|m| m.changed()).count()
    }

    /// Whether nothing needed patching
    pub fn is_clean(&self) -> bool {
        self.changed_count() == 0
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Ordered list of mods, at most one per file kind
#[derive(Default)]
pub struct Pipeline {
    mods: Vec<Box<dyn Mod>>,
}

impl Pipeline {
    /// Empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the stock pipeline: project build, app build, manifest
    pub fn from_config(config: &ConfigSchema) -> Result<Self> {
        let mut pipeline = Self::new();

        if config.project_build.enabled {
            pipeline = pipeline.with_mod(TextMod::new(
                FileKind::ProjectBuild,
                plugins::project_build_patch(&config.project_build),
            ))?;
        }
        if config.app_build.enabled {
            pipeline = pipeline.with_mod(TextMod::new(
                FileKind::AppBuild,
                plugins::app_build_patch(&config.app_build),
            ))?;
        }
        if config.manifest.enabled {
            pipeline =
                pipeline.with_mod(ManifestMod::new(plugins::manifest_patch(&config.manifest)))?;
        }

        Ok(pipeline)
    }

    /// Build the pipeline used to verify already patched files
    ///
    /// Same as [`Pipeline::from_config`] with the app build guard forced on:
    /// the unguarded packaging patch would otherwise report a change on
    /// every run.
    pub fn for_check(config: &ConfigSchema) -> Result<Self> {
        let mut config = config.clone();
        config.app_build.guard = true;
        Self::from_config(&config)
    }

    /// Register a mod; each file is patched once per pass
    pub fn with_mod(mut self, m: impl Mod + 'static) -> Result<Self> {
        if self.mods.iter().any(|existing| existing.kind() == m.kind()) {
            return Err(Error::duplicate_mod(m.kind().as_str())
                .with_context(format!("While registering {}", m.name())));
        }
        self.mods.push(Box::new(m));
        Ok(self)
    }

    /// Registered mod names, in run order
    pub fn names(&self) -> Vec<&str> {
        self.mods.iter().map(|m| m.name()).collect()
    }

    /// Number of registered mods
    pub fn len(&self) -> usize {
        self.mods.len()
    }

    /// Whether no mod is registered
    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Run every mod in registration order against `host`
    ///
    /// Changed files are written only after every mod succeeded, so a fatal
    /// error leaves the host untouched.
    pub fn run<H: ModHost + ?Sized>(&self, host: &mut H) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        let mut pending = Vec::new();

        for m in &self.mods {
            let span = tracing::info_span!("mod", name = m.name(), kind = %m.kind());
            let _entered = span.enter();

            let Some(file) = host.read(m.kind())? else {
                tracing::warn!("No generated file, skipping");
                report.mods.push(ModReport {
                    name: m.name().to_string(),
                    kind: m.kind(),
                    path: None,
                    outcome: PatchOutcome::skipped(
                        ErrorCode::FileNotFound,
                        format!("no {} file was generated", m.kind()),
                    ),
                    bytes_before: 0,
                    bytes_after: 0,
                });
                continue;
            };

            let bytes_before = file.len();
            let original = file.contents.clone();
            let result = m.apply(file)?;

            tracing::info!(
                path = %result.file.path.display(),
                outcome = result.outcome.label(),
                "Mod finished"
            );

            report.mods.push(ModReport {
                name: m.name().to_string(),
                kind: m.kind(),
                path: Some(result.file.path.clone()),
                bytes_after: result.file.len(),
                outcome: result.outcome,
                bytes_before,
            });
            if result.file.contents != original {
                pending.push(result.file);
            }
        }

        for file in &pending {
            host.write(file)?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use proptest::prelude::*;

    const PROJECT: &str = "buildscript {\n}\n\nallprojects {\n    repositories {\n        google()\n    }\n}\n";
    const APP: &str = "apply plugin: \"com.android.application\"\n\nandroid {\n    namespace \"app.seva\"\n}\n";
    const MANIFEST: &str = "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\">\n  <application android:name=\".MainApplication\"/>\n</manifest>\n";

    fn host() -> MemoryHost {
        MemoryHost::new()
            .with_file(GeneratedFile::new(FileKind::ProjectBuild, "build.gradle", PROJECT))
            .with_file(GeneratedFile::new(FileKind::AppBuild, "app/build.gradle", APP))
            .with_file(GeneratedFile::new(
                FileKind::Manifest,
                "app/src/main/AndroidManifest.xml",
                MANIFEST,
            ))
    }

    #[test]
    fn test_stock_pipeline_order() {
        let pipeline = Pipeline::from_config(&ConfigSchema::default()).unwrap();
        assert_eq!(
            pipeline.names(),
            vec!["androidx-resolution", "androidx-packaging", "manifest-fix"]
        );
    }

    #[test]
    fn test_disabled_sections() {
        let mut config = ConfigSchema::default();
        config.app_build.enabled = false;
        config.manifest.enabled = false;
        let pipeline = Pipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.len(), 1);
    }

    #[test]
    fn test_run_patches_all_files() {
        let mut host = host();
        let pipeline = Pipeline::from_config(&ConfigSchema::default()).unwrap();
        let report = pipeline.run(&mut host).unwrap();

        assert_eq!(report.mods.len(), 3);
        assert_eq!(report.changed_count(), 3);
        assert!(report.mods.iter().all(|m| m.bytes_after > m.bytes_before));

        let project = host.get(FileKind::ProjectBuild).unwrap();
        assert!(project.contents.contains("resolutionStrategy"));
        let app = host.get(FileKind::AppBuild).unwrap();
        assert!(app.contents.contains("pickFirst 'META-INF/*.version'"));
        let manifest = host.get(FileKind::Manifest).unwrap();
        assert!(manifest.contents.contains("tools:replace=\"android:appComponentFactory\""));
        assert_eq!(host.writes(), 3);
    }

    #[test]
    fn test_second_run_skips_guarded_files() {
        let mut host = host();
        let pipeline = Pipeline::from_config(&ConfigSchema::default()).unwrap();
        pipeline.run(&mut host).unwrap();
        let report = pipeline.run(&mut host).unwrap();

        assert_eq!(report.mods[0].outcome, PatchOutcome::AlreadyApplied);
        assert_eq!(report.mods[2].outcome, PatchOutcome::AttributesSet { changed: 0 });
        // the app build is unguarded unless configured
        assert!(report.mods[1].changed());
    }

    #[test]
    fn test_guarded_app_build_is_stable() {
        let mut config = ConfigSchema::default();
        config.app_build.guard = true;
        let mut host = host();
        let pipeline = Pipeline::from_config(&config).unwrap();
        pipeline.run(&mut host).unwrap();

        let report = pipeline.run(&mut host).unwrap();
        assert!(report.is_clean());
        assert_eq!(host.writes(), 3);
    }

    #[test]
    fn test_check_pipeline_clean_after_prebuild() {
        let config = ConfigSchema::default();
        let mut host = host();

        let before = Pipeline::for_check(&config).unwrap().run(&mut host.clone()).unwrap();
        assert_eq!(before.changed_count(), 3);

        Pipeline::from_config(&config).unwrap().run(&mut host).unwrap();
        let after = Pipeline::for_check(&config).unwrap().run(&mut host).unwrap();
        assert!(after.is_clean());
        assert_eq!(after.mods[1].outcome, PatchOutcome::AlreadyApplied);
    }

    #[test]
    fn test_fatal_error_writes_nothing() {
        let pipeline = Pipeline::from_config(&ConfigSchema::default()).unwrap();
        let mut host = host().with_file(GeneratedFile::new(
            FileKind::Manifest,
            "app/src/main/AndroidManifest.xml",
            "<manifest></manifest>",
        ));

        assert!(pipeline.run(&mut host).is_err());
        assert_eq!(host.writes(), 0);
        assert_eq!(host.get(FileKind::ProjectBuild).unwrap().contents, PROJECT);
        assert_eq!(host.get(FileKind::AppBuild).unwrap().contents, APP);

        let mut host = host.with_file(GeneratedFile::new(
            FileKind::Manifest,
            "app/src/main/AndroidManifest.xml",
            MANIFEST,
        ));
        pipeline.run(&mut host).unwrap();
        let app = host.get(FileKind::AppBuild).unwrap();
        assert_eq!(app.contents.matches("packagingOptions").count(), 1);
    }

    #[test]
    fn test_manifest_with_non_xml_dialect_skipped() {
        let mut host = host().with_file(
            GeneratedFile::new(FileKind::Manifest, "app/src/main/AndroidManifest.xml", MANIFEST)
                .with_dialect(Dialect::Other("txt".to_string())),
        );
        let report = Pipeline::from_config(&ConfigSchema::default())
            .unwrap()
            .run(&mut host)
            .unwrap();

        assert!(matches!(
            report.mods[2].outcome,
            PatchOutcome::Skipped {
                code: ErrorCode::UnsupportedDialect,
                ..
            }
        ));
        assert_eq!(host.get(FileKind::Manifest).unwrap().contents, MANIFEST);
        assert_eq!(host.writes(), 2);
    }

    #[test]
    fn test_kotlin_build_script_skipped() {
        let mut host = host().with_file(GeneratedFile::new(
            FileKind::AppBuild,
            "app/build.gradle.kts",
            "android {\n}\n",
        ));
        let report = Pipeline::from_config(&ConfigSchema::default())
            .unwrap()
            .run(&mut host)
            .unwrap();

        assert!(matches!(
            report.mods[1].outcome,
            PatchOutcome::Skipped {
                code: ErrorCode::UnsupportedDialect,
                ..
            }
        ));
        assert_eq!(host.get(FileKind::AppBuild).unwrap().contents, "android {\n}\n");
    }

    #[test]
    fn test_missing_file_skipped() {
        let mut host = MemoryHost::new()
            .with_file(GeneratedFile::new(FileKind::ProjectBuild, "build.gradle", PROJECT));
        let report = Pipeline::from_config(&ConfigSchema::default())
            .unwrap()
            .run(&mut host)
            .unwrap();

        assert_eq!(report.changed_count(), 1);
        assert!(matches!(
            report.mods[2].outcome,
            PatchOutcome::Skipped {
                code: ErrorCode::FileNotFound,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_manifest_aborts() {
        let mut host = host().with_file(GeneratedFile::new(
            FileKind::Manifest,
            "app/src/main/AndroidManifest.xml",
            "<manifest/>",
        ));
        let err = Pipeline::from_config(&ConfigSchema::default())
            .unwrap()
            .run(&mut host)
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::MalformedStructuredInput);
        assert!(err.context.unwrap().contains("AndroidManifest.xml"));
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let config = ConfigSchema::default();
        let err = Pipeline::new()
            .with_mod(TextMod::new(
                FileKind::AppBuild,
                plugins::app_build_patch(&config.app_build),
            ))
            .unwrap()
            .with_mod(TextMod::new(
                FileKind::AppBuild,
                plugins::app_build_patch(&config.app_build),
            ))
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::DuplicateMod);
    }

    #[test]
    fn test_report_json() {
        let mut host = host();
        let report = Pipeline::from_config(&ConfigSchema::default())
            .unwrap()
            .run(&mut host)
            .unwrap();
        let json = report.to_json().unwrap();

        assert!(json.contains("\"kind\": \"project-build\""));
        assert!(json.contains("\"status\": \"inserted\""));
        assert!(json.contains("\"status\": \"attributes_set\""));
    }

    proptest! {
        #[test]
        fn prop_unsupported_dialect_is_byte_identical(contents in "[a-z \n{}]{0,60}") {
            let config = ConfigSchema::default();
            let m = TextMod::new(
                FileKind::ProjectBuild,
                plugins::project_build_patch(&config.project_build),
            );
            let file = GeneratedFile::new(
                FileKind::ProjectBuild,
                "build.gradle.kts",
                format!("allprojects {{{}", contents),
            );
            let original = file.clone();

            let result = m.apply(file).unwrap();
            prop_assert_eq!(result.file, original);
            prop_assert!(!result.outcome.is_change());
        }
    }
}
