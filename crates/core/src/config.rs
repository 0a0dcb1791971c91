//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! core services behind an `Arc`. Request handling never reads process-wide
//! environment variables, which can lead to inconsistent behaviour in
//! multi-threaded runtimes and test harnesses.

use crate::{WorkflowError, WorkflowResult};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    legacy_prefix: String,
    legacy_width: usize,
    legacy_prefix_variants: Vec<String>,
    allocation_retries: u32,
    store_timeout: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `legacy_prefix` is the prefix assigned to newly allocated legacy
    /// identifiers; `legacy_prefix_variants` lists every historical prefix
    /// that participates in the same numbering sequence (the active prefix is
    /// added automatically if absent). Variants are kept sorted longest-first
    /// so that prefix stripping is unambiguous when one variant is a prefix
    /// of another (e.g. `PT` and `PAT`... stripping must try `PAT` first).
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidInput` if the prefix is not purely
    /// ASCII letters, the width is zero, or a variant is malformed.
    pub fn new(
        legacy_prefix: impl Into<String>,
        legacy_width: usize,
        legacy_prefix_variants: Vec<String>,
        allocation_retries: u32,
        store_timeout: Duration,
    ) -> WorkflowResult<Self> {
        let legacy_prefix = legacy_prefix.into();
        validate_prefix(&legacy_prefix)?;

        if legacy_width == 0 {
            return Err(WorkflowError::InvalidInput(
                "legacy_width must be at least 1".into(),
            ));
        }

        let mut variants = legacy_prefix_variants;
        for variant in &variants {
            validate_prefix(variant)?;
        }
        if !variants.iter().any(|v| v == &legacy_prefix) {
            variants.push(legacy_prefix.clone());
        }
        variants.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        variants.dedup();

        Ok(Self {
            legacy_prefix,
            legacy_width,
            legacy_prefix_variants: variants,
            allocation_retries,
            store_timeout,
        })
    }

    pub fn legacy_prefix(&self) -> &str {
        &self.legacy_prefix
    }

    pub fn legacy_width(&self) -> usize {
        self.legacy_width
    }

    /// Recognised historical prefixes, longest first.
    pub fn legacy_prefix_variants(&self) -> &[String] {
        &self.legacy_prefix_variants
    }

    pub fn allocation_retries(&self) -> u32 {
        self.allocation_retries
    }

    /// Upper bound applied to every individual store call.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}

fn validate_prefix(prefix: &str) -> WorkflowResult<()> {
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(WorkflowError::InvalidInput(format!(
            "legacy prefix must be one or more ASCII letters, got '{}'",
            prefix
        )));
    }
    Ok(())
}
