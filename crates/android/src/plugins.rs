//! Prebuild fixes for AndroidX / legacy support-library conflicts
//!
//! - **AndroidX fix**: pins AndroidX versions and excludes the old
//!   `com.android.support` modules in the project build script, and adds
//!   `pickFirst` packaging rules to the app build script.
//! - **Manifest fix**: forces the AndroidX `appComponentFactory` and marks
//!   it with `tools:replace` so manifest merging does not fail.

use crate::applicator::{PatchBlock, TextPatch};
use crate::guard::IdempotencyGuard;
use crate::manifest::ManifestPatch;
use seva_core::config::{AppBuildConfig, ManifestConfig, ProjectBuildConfig};

/// Marker guarding the app-build patch when `app_build.guard` is on
pub const PACKAGING_MARKER: &str = "packagingOptions";

/// Render the `configurations.all` block inserted into `allprojects`
pub fn resolution_block(config: &ProjectBuildConfig) -> String {
    let mut block = String::from("\n    configurations.all {\n        resolutionStrategy {\n");
    for coordinate in &config.force {
        block.push_str(&format!("            force \"{}\"\n", coordinate));
    }
    block.push_str("        }\n");
    for rule in &config.exclude {
        block.push_str(&format!(
            "        exclude group: \"{}\", module: \"{}\"\n",
            rule.group, rule.module
        ));
    }
    block.push_str("    }");
    block
}

/// Render the `packagingOptions` block inserted into `android`
pub fn packaging_block(config: &AppBuildConfig) -> String {
    let mut block = String::from("\n    packagingOptions {\n");
    for path in &config.pick_first {
        block.push_str(&format!("        pickFirst '{}'\n", path));
    }
    block.push_str("    }\n");
    block
}

/// Project-build half of the AndroidX fix; always guarded
pub fn project_build_patch(config: &ProjectBuildConfig) -> TextPatch {
    TextPatch::new(
        "androidx-resolution",
        config.anchor.clone(),
        PatchBlock::after(resolution_block(config)),
    )
    .guarded(IdempotencyGuard::new(config.marker.clone()))
}

/// App-build half of the AndroidX fix; guarded only on request
pub fn app_build_patch(config: &AppBuildConfig) -> TextPatch {
    let patch = TextPatch::new(
        "androidx-packaging",
        config.anchor.clone(),
        PatchBlock::after(packaging_block(config)),
    );
    if config.guard {
        patch.guarded(IdempotencyGuard::new(PACKAGING_MARKER))
    } else {
        patch
    }
}

/// Manifest fix built from its config section
pub fn manifest_patch(config: &ManifestConfig) -> ManifestPatch {
    ManifestPatch::new(config.tools_namespace.clone(), config.component_factory.clone())
}
