//! Configuration schema definitions
//!
//! Every section has defaults matching the stock prebuild fixes, so an
//! empty file (or no file at all) yields a working configuration.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `group:module:version` maven coordinate
static COORDINATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+:[A-Za-z0-9_.\-]+:[A-Za-z0-9_.+\-]+$").unwrap());

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigSchema {
    /// Paths
    #[serde(default)]
    pub general: GeneralConfig,

    /// Project build script patch
    #[serde(default)]
    pub project_build: ProjectBuildConfig,

    /// App build script patch
    #[serde(default)]
    pub app_build: AppBuildConfig,

    /// Manifest patch
    #[serde(default)]
    pub manifest: ManifestConfig,
}

impl ConfigSchema {
    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.general.android_dir.trim().is_empty() {
            return Err(Error::config_validation("general.android_dir must not be empty"));
        }

        let project = &self.project_build;
        if project.anchor.is_empty() {
            return Err(Error::config_validation("project_build.anchor must not be empty"));
        }
        if project.marker.is_empty() {
            return Err(Error::config_validation("project_build.marker must not be empty"));
        }
        for coordinate in &project.force {
            if !COORDINATE.is_match(coordinate) {
                return Err(Error::config_validation(format!(
                    "project_build.force entry '{}' is not group:module:version",
                    coordinate
                )));
            }
        }
        for exclude in &project.exclude {
            if exclude.group.is_empty() || exclude.module.is_empty() {
                return Err(Error::config_validation(
                    "project_build.exclude entries need both group and module",
                ));
            }
        }

        if self.app_build.anchor.is_empty() {
            return Err(Error::config_validation("app_build.anchor must not be empty"));
        }

        let manifest = &self.manifest;
        if manifest.component_factory.trim().is_empty() {
            return Err(Error::config_validation(
                "manifest.component_factory must not be empty",
            ));
        }
        if !(manifest.tools_namespace.starts_with("http://")
            || manifest.tools_namespace.starts_with("https://"))
        {
            return Err(Error::config_validation(format!(
                "manifest.tools_namespace '{}' is not an http(s) URI",
                manifest.tools_namespace
            )));
        }

        Ok(())
    }
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Directory holding the generated native project
    #[serde(default = "default_android_dir")]
    pub android_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            android_dir: default_android_dir(),
        }
    }
}

fn default_android_dir() -> String {
    "android".to_string()
}

fn default_true() -> bool {
    true
}

/// Project-level build script patch (dependency resolution strategy)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectBuildConfig {
    /// Run this patch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Text the resolution block is inserted after
    #[serde(default = "default_project_anchor")]
    pub anchor: String,

    /// Substring proving the patch was already applied
    #[serde(default = "default_project_marker")]
    pub marker: String,

    /// Versions forced through `resolutionStrategy`
    #[serde(default = "default_force")]
    pub force: Vec<String>,

    /// Legacy support modules excluded from every configuration
    #[serde(default = "default_exclude")]
    pub exclude: Vec<ExcludeRule>,
}

impl Default for ProjectBuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            anchor: default_project_anchor(),
            marker: default_project_marker(),
            force: default_force(),
            exclude: default_exclude(),
        }
    }
}

fn default_project_anchor() -> String {
    "allprojects {".to_string()
}

fn default_project_marker() -> String {
    "resolutionStrategy".to_string()
}

fn default_force() -> Vec<String> {
    vec![
        "androidx.core:core:1.16.0",
        "androidx.versionedparcelable:versionedparcelable:1.1.1",
        "androidx.customview:customview:1.1.0",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exclude() -> Vec<ExcludeRule> {
    ["support-compat", "versionedparcelable", "customview"]
        .into_iter()
        .map(|module| ExcludeRule {
            group: "com.android.support".to_string(),
            module: module.to_string(),
        })
        .collect()
}

/// A `group`/`module` pair excluded from dependency resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExcludeRule {
    /// Maven group
    pub group: String,
    /// Maven module
    pub module: String,
}

/// App-level build script patch (packaging options)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppBuildConfig {
    /// Run this patch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Text the packaging block is inserted after
    #[serde(default = "default_app_anchor")]
    pub anchor: String,

    /// Skip the patch when a `packagingOptions` block already exists
    #[serde(default)]
    pub guard: bool,

    /// Resource paths resolved with `pickFirst`
    #[serde(default = "default_pick_first")]
    pub pick_first: Vec<String>,
}

impl Default for AppBuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            anchor: default_app_anchor(),
            guard: false,
            pick_first: default_pick_first(),
        }
    }
}

fn default_app_anchor() -> String {
    "android {".to_string()
}

fn default_pick_first() -> Vec<String> {
    vec![
        "META-INF/*.version".to_string(),
        "META-INF/library_release.reddit".to_string(),
    ]
}

/// Manifest attribute patch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestConfig {
    /// Run this patch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Value for `xmlns:tools` on the manifest root
    #[serde(default = "default_tools_namespace")]
    pub tools_namespace: String,

    /// Value for `android:appComponentFactory`
    #[serde(default = "default_component_factory")]
    pub component_factory: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tools_namespace: default_tools_namespace(),
            component_factory: default_component_factory(),
        }
    }
}

fn default_tools_namespace() -> String {
    "http://schemas.android.com/tools".to_string()
}

fn default_component_factory() -> String {
    "androidx.core.app.CoreComponentFactory".to_string()
}
