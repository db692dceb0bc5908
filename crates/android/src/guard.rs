//! Idempotency guard for text patches
//!
//! Inserting a text block is not idempotent by itself. A guard names a
//! marker substring that only exists once the block was inserted, so a
//! second prebuild run leaves the file alone.

/// Marker check preventing duplicate insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyGuard {
    marker: String,
}

impl IdempotencyGuard {
    /// Guard on the given marker substring
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// The marker substring
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether `contents` already carries the marker
    ///
    /// An empty marker never reports applied.
    pub fn is_applied(&self, contents: &str) -> bool {
        !self.marker.is_empty() && contents.contains(&self.marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_marker() {
        let guard = IdempotencyGuard::new("resolutionStrategy");
        assert!(guard.is_applied("configurations.all { resolutionStrategy { } }"));
        assert!(!guard.is_applied("allprojects {\n}"));
    }

    #[test]
    fn test_empty_marker() {
        let guard = IdempotencyGuard::new("");
        assert!(!guard.is_applied("anything"));
        assert_eq!(guard.marker(), "");
    }
}
