//! Android prebuild patching for Seva
//!
//! This crate patches the files a native project generator emits before
//! Gradle consumes them:
//! - Anchor matching and idempotent text insertion for build scripts
//! - Attribute injection into the manifest element tree
//! - The AndroidX and manifest fixes built from configuration
//! - An ordered hook pipeline over a pluggable file host
//!
//! # Example
//!
//! ```rust,no_run
//! use seva_android::{FsHost, Pipeline};
//! use seva_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! let mut host = FsHost::new("android").expect("no android directory");
//! let report = Pipeline::from_config(&config.schema)
//!     .and_then(|pipeline| pipeline.run(&mut host))
//!     .expect("prebuild failed");
//! println!("{} file(s) patched", report.changed_count());
//! ```

#![warn(missing_docs)]

pub mod applicator;
pub mod generated_file;
pub mod guard;
pub mod host;
pub mod manifest;
pub mod matcher;
pub mod orchestrator;
pub mod plugins;

pub use applicator::{Fallback, PatchBlock, PatchOutcome, Placement, TextPatch};
pub use generated_file::{Dialect, FileKind, GeneratedFile};
pub use guard::IdempotencyGuard;
pub use host::{FsHost, MemoryHost};
pub use manifest::{ManifestPatch, XmlDocument};
pub use matcher::{find_anchor, Anchor, AnchorMatch};
pub use orchestrator::{
    ManifestMod, Mod, ModHost, ModReport, ModResult, Pipeline, PipelineReport, TextMod,
};
