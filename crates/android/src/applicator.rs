//! Text patch application
//!
//! A [`TextPatch`] splices a [`PatchBlock`] next to the first anchor match.
//! When the anchor is missing the block is appended at end of file, wrapped
//! in the patch's [`Fallback`]:
//!
//! ```text
//! output = contents + fallback.opening + block.text + fallback.closing
//! ```
//!
//! For a literal anchor the default fallback re-opens the anchored scope,
//! so `android {` becomes `opening = "\nandroid {"`, `closing = "\n}\n"`.

use crate::generated_file::Dialect;
use crate::guard::IdempotencyGuard;
use crate::matcher::{find_anchor, Anchor};
use seva_core::error::{Error, ErrorCode};
use serde::Serialize;

/// Where a block goes relative to the anchor match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Insert right after the match
    #[default]
    AfterAnchor,
    /// Insert right before the match
    BeforeAnchor,
    /// Replace the matched text
    ReplaceAnchor,
}

/// Literal text inserted by a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchBlock {
    /// Text spliced into the file
    pub text: String,
    /// Position relative to the anchor
    pub placement: Placement,
}

impl PatchBlock {
    /// Block inserted right after the anchor
    pub fn after(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            placement: Placement::AfterAnchor,
        }
    }

    /// Block inserted right before the anchor
    pub fn before(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            placement: Placement::BeforeAnchor,
        }
    }

    /// Block that replaces the anchor text
    pub fn replacing(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            placement: Placement::ReplaceAnchor,
        }
    }
}

/// Wrapper used when the anchor is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// Text emitted before the block
    pub opening: String,
    /// Text emitted after the block
    pub closing: String,
}

impl Fallback {
    /// Fallback with explicit opening and closing text
    pub fn new(opening: impl Into<String>, closing: impl Into<String>) -> Self {
        Self {
            opening: opening.into(),
            closing: closing.into(),
        }
    }

    /// Re-open the anchored scope at end of file
    pub fn reopen(anchor_text: &str) -> Self {
        Self::new(format!("\n{}", anchor_text), "\n}\n")
    }

    /// Text appended after the original contents
    pub fn render(&self, block: &PatchBlock) -> String {
        format!("{}{}{}", self.opening, block.text, self.closing)
    }
}

/// What a patch did to a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatchOutcome {
    /// Block spliced at the anchor
    Inserted { offset: usize, occurrences: usize },
    /// Anchor missing, block appended at end of file
    Appended,
    /// Guard marker already present
    AlreadyApplied,
    /// Nothing attempted
    Skipped { code: ErrorCode, reason: String },
    /// Structured attributes written
    AttributesSet { changed: usize },
}

impl PatchOutcome {
    /// Outcome for a patch that was not attempted
    pub fn skipped(code: ErrorCode, reason: impl Into<String>) -> Self {
        PatchOutcome::Skipped {
            code,
            reason: reason.into(),
        }
    }

    /// Whether the outcome implies the file contents changed
    pub fn is_change(&self) -> bool {
        match self {
            PatchOutcome::Inserted { .. } | PatchOutcome::Appended => true,
            PatchOutcome::AttributesSet { changed } => *changed > 0,
            PatchOutcome::AlreadyApplied | PatchOutcome::Skipped { .. } => false,
        }
    }

    /// Short label for terminal output
    pub fn label(&self) -> &'static str {
        match self {
            PatchOutcome::Inserted { .. } => "patched",
            PatchOutcome::Appended => "appended",
            PatchOutcome::AlreadyApplied => "already patched",
            PatchOutcome::Skipped { .. } => "skipped",
            PatchOutcome::AttributesSet { changed: 0 } => "unchanged",
            PatchOutcome::AttributesSet { .. } => "attributes set",
        }
    }
}

/// An anchored text insertion, optionally guarded
#[derive(Debug, Clone)]
pub struct TextPatch {
    /// Patch name used in logs and reports
    pub name: String,
    /// Dialect the patch understands
    pub dialect: Dialect,
    /// Where the block attaches
    pub anchor: Anchor,
    /// Text to insert
    pub block: PatchBlock,
    /// Marker check skipping already patched files
    pub guard: Option<IdempotencyGuard>,
    /// Used when the anchor is missing
    pub fallback: Fallback,
}

impl TextPatch {
    /// Groovy patch on a literal anchor with the default fallback
    pub fn new(name: impl Into<String>, anchor: impl Into<String>, block: PatchBlock) -> Self {
        let anchor = anchor.into();
        Self {
            name: name.into(),
            dialect: Dialect::Groovy,
            fallback: Fallback::reopen(&anchor),
            anchor: Anchor::Literal(anchor),
            block,
            guard: None,
        }
    }

    /// Patch on a regex anchor; a regex has no text to re-open, so the
    /// fallback is explicit
    pub fn with_pattern(
        name: impl Into<String>,
        anchor: Anchor,
        block: PatchBlock,
        fallback: Fallback,
    ) -> Self {
        Self {
            name: name.into(),
            dialect: Dialect::Groovy,
            anchor,
            block,
            guard: None,
            fallback,
        }
    }

    /// Skip files that already carry the guard marker
    pub fn guarded(mut self, guard: IdempotencyGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Whether this patch handles files of `dialect`
    pub fn supports(&self, dialect: &Dialect) -> bool {
        &self.dialect == dialect
    }

    /// Apply to raw text, ignoring dialect
    pub fn apply_to(&self, contents: &str) -> (String, PatchOutcome) {
        if let Some(guard) = &self.guard {
            if guard.is_applied(contents) {
                tracing::debug!(patch = %self.name, marker = guard.marker(), "Patch already applied");
                return (contents.to_string(), PatchOutcome::AlreadyApplied);
            }
        }

        let Some(found) = find_anchor(contents, &self.anchor) else {
            let err = Error::anchor_not_found(&self.anchor);
            tracing::warn!(
                patch = %self.name,
                code = %err.code,
                "{}, appending block at end of file",
                err.message
            );
            let mut patched = String::with_capacity(contents.len() + self.block.text.len() + 16);
            patched.push_str(contents);
            patched.push_str(&self.fallback.render(&self.block));
            return (patched, PatchOutcome::Appended);
        };

        if found.occurrences > 1 {
            tracing::warn!(
                patch = %self.name,
                anchor = %self.anchor,
                occurrences = found.occurrences,
                "Anchor is not unique, patching the first occurrence"
            );
        }

        let (offset, tail) = match self.block.placement {
            Placement::AfterAnchor => (found.end, found.end),
            Placement::BeforeAnchor => (found.start, found.start),
            Placement::ReplaceAnchor => (found.start, found.end),
        };

        let mut patched = String::with_capacity(contents.len() + self.block.text.len());
        patched.push_str(&contents[..offset]);
        patched.push_str(&self.block.text);
        patched.push_str(&contents[tail..]);

        (
            patched,
            PatchOutcome::Inserted {
                offset,
                occurrences: found.occurrences,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_patch() -> TextPatch {
        TextPatch::new("sample", "android {", PatchBlock::after("\n    packagingOptions {}\n"))
    }

    #[test]
    fn test_insert_after_anchor() {
        let (out, outcome) = sample_patch().apply_to("apply plugin\nandroid {\n}\n");
        assert_eq!(out, "apply plugin\nandroid {\n    packagingOptions {}\n\n}\n");
        assert_eq!(
            outcome,
            PatchOutcome::Inserted {
                offset: 22,
                occurrences: 1
            }
        );
    }

    #[test]
    fn test_insert_before_anchor() {
        let patch = TextPatch::new("before", "android {", PatchBlock::before("// patched\n"));
        let (out, _) = patch.apply_to("android {\n}");
        assert_eq!(out, "// patched\nandroid {\n}");
    }

    #[test]
    fn test_replace_anchor() {
        let patch = TextPatch::new("replace", "android {", PatchBlock::replacing("android { // ok"));
        let (out, _) = patch.apply_to("android {\n}");
        assert_eq!(out, "android { // ok\n}");
    }

    #[test]
    fn test_only_first_occurrence_patched() {
        let (out, outcome) = sample_patch().apply_to("android {\n}\nandroid {\n}");
        assert_eq!(out.matches("packagingOptions").count(), 1);
        assert!(matches!(outcome, PatchOutcome::Inserted { offset: 9, occurrences: 2 }));
    }

    #[test]
    fn test_fallback_appends() {
        let (out, outcome) = sample_patch().apply_to("apply plugin: 'com.android.application'");
        assert_eq!(
            out,
            "apply plugin: 'com.android.application'\nandroid {\n    packagingOptions {}\n\n}\n"
        );
        assert_eq!(outcome, PatchOutcome::Appended);
    }

    #[test]
    fn test_pattern_anchor_with_explicit_fallback() {
        let patch = TextPatch::with_pattern(
            "pattern",
            Anchor::pattern(r"android\s*\{").unwrap(),
            PatchBlock::after(" // here"),
            Fallback::new("\n// start", "\n// end\n"),
        );
        let (out, _) = patch.apply_to("android   {\n}");
        assert_eq!(out, "android   { // here\n}");

        let (out, outcome) = patch.apply_to("");
        assert_eq!(out, "\n// start // here\n// end\n");
        assert_eq!(outcome, PatchOutcome::Appended);
    }

    #[test]
    fn test_guard_blocks_reapply() {
        let patch = sample_patch().guarded(IdempotencyGuard::new("packagingOptions"));
        let (once, _) = patch.apply_to("android {\n}");
        let (twice, outcome) = patch.apply_to(&once);
        assert_eq!(once, twice);
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
    }

    #[test]
    fn test_unguarded_reapplies() {
        let patch = sample_patch();
        let (once, _) = patch.apply_to("android {\n}");
        let (twice, _) = patch.apply_to(&once);
        assert_eq!(twice.matches("packagingOptions").count(), 2);
    }

    #[test]
    fn test_outcome_labels() {
        assert!(PatchOutcome::Appended.is_change());
        assert!(!PatchOutcome::AlreadyApplied.is_change());
        assert!(!PatchOutcome::AttributesSet { changed: 0 }.is_change());
        assert_eq!(PatchOutcome::AttributesSet { changed: 0 }.label(), "unchanged");
        assert_eq!(
            PatchOutcome::skipped(ErrorCode::UnsupportedDialect, "kt").label(),
            "skipped"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&PatchOutcome::Inserted {
            offset: 3,
            occurrences: 1,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"inserted","offset":3,"occurrences":1}"#);
    }

    proptest! {
        #[test]
        fn prop_anchor_present_is_pure_insertion(
            prefix in "[a-z \n]{0,40}",
            suffix in "[a-z \n}]{0,40}",
        ) {
            let contents = format!("{}android {{{}", prefix, suffix);
            let patch = sample_patch();
            let (out, _) = patch.apply_to(&contents);
            let anchor_end = prefix.len() + "android {".len();

            prop_assert_eq!(&out[..anchor_end], &contents[..anchor_end]);
            prop_assert_eq!(
                &out[anchor_end..anchor_end + patch.block.text.len()],
                patch.block.text.as_str()
            );
            prop_assert_eq!(&out[anchor_end + patch.block.text.len()..], &contents[anchor_end..]);
        }

        #[test]
        fn prop_anchor_absent_appends(contents in "[a-z \n{}]{0,60}") {
            prop_assume!(!contents.contains("android {"));
            let patch = sample_patch();
            let (out, outcome) = patch.apply_to(&contents);

            prop_assert_eq!(outcome, PatchOutcome::Appended);
            prop_assert_eq!(out, format!("{}{}", contents, patch.fallback.render(&patch.block)));
        }

        #[test]
        fn prop_guarded_patch_is_idempotent(contents in "[a-z \n{}]{0,60}") {
            let patch = sample_patch().guarded(IdempotencyGuard::new("packagingOptions"));
            let (once, _) = patch.apply_to(&contents);
            let (twice, _) = patch.apply_to(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
