//! Surface mutation summaries and expectation matching.
//!
//! After an edit is allowed to happen on the surface, the observer reports
//! what actually changed. The controller compares that against what it
//! expected from the event it translated; only a match lets the incremental
//! interpretation stand. Everything else is grounds for a full reparse.

use tracing::trace;

/// What the surface observer saw change, net of the observed records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationSummary {
    /// Characters that appeared.
    pub text_added: Option<String>,
    /// Number of codepoints that disappeared.
    pub text_deleted: usize,
}

impl MutationSummary {
    pub fn added(text: impl Into<String>) -> Self {
        Self {
            text_added: Some(text.into()),
            text_deleted: 0,
        }
    }

    pub fn deleted(count: usize) -> Self {
        Self {
            text_added: None,
            text_deleted: count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_added.is_none() && self.text_deleted == 0
    }

    /// A summary is simple when it describes one-sided change: only an
    /// insertion or only a deletion. Anything two-sided cannot be applied
    /// incrementally with confidence.
    pub fn is_simple(&self) -> bool {
        !(self.text_added.is_some() && self.text_deleted > 0)
    }

    pub fn matches_expectation(&self, expected: &ExpectedMutation) -> bool {
        let added_matches = match (&self.text_added, &expected.inserted) {
            (None, None) => true,
            (Some(actual), Some(intended)) => actual == intended,
            _ => false,
        };
        let matched = added_matches && self.text_deleted == expected.deleted;
        if !matched {
            trace!(
                target: "input.mutation",
                actual_added = self.text_added.as_ref().map(|s| s.chars().count()),
                actual_deleted = self.text_deleted,
                expected_added = expected.inserted.as_ref().map(|s| s.chars().count()),
                expected_deleted = expected.deleted,
                "mutation_expectation_mismatch"
            );
        }
        matched
    }
}

/// The mutation the controller expects the surface to report for the edit
/// it just performed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedMutation {
    pub inserted: Option<String>,
    pub deleted: usize,
}

impl ExpectedMutation {
    pub fn insertion(text: impl Into<String>) -> Self {
        Self {
            inserted: Some(text.into()),
            deleted: 0,
        }
    }

    pub fn deletion(count: usize) -> Self {
        Self {
            inserted: None,
            deleted: count,
        }
    }

    pub fn replacement(text: impl Into<String>, deleted: usize) -> Self {
        Self {
            inserted: Some(text.into()),
            deleted,
        }
    }
}

/// True when two strings differ only in whitespace. The corrupting mobile
/// keyboard sequence re-sends the surface's whole content with whitespace
/// normalized; this is how it gets recognized.
pub fn differs_only_in_whitespace(a: &str, b: &str) -> bool {
    let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    a != b && squash(a) == squash(b)
}
