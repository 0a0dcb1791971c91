//! Identifier Allocator: computes the next human-facing legacy identifier.
//!
//! The population may contain more than one historical prefix variant (for
//! example a 2-letter `PT` form alongside the current `PAT` form); all
//! variants feed one shared numbering sequence. The scan-then-increment
//! computation here is inherently racy, which is why the store enforces the
//! unique constraint and [`crate::subjects::SubjectService::register`]
//! retries on collision. The allocator itself is a pure read.

use crate::config::CoreConfig;
use crate::directory::SubjectDirectory;
use crate::error::{WorkflowError, WorkflowResult};
use chrono::Utc;
use clinic_types::LegacyId;
use std::sync::Arc;
use uuid::Uuid;

pub struct IdentifierAllocator<D> {
    cfg: Arc<CoreConfig>,
    directory: Arc<D>,
}

impl<D> Clone for IdentifierAllocator<D> {
    fn clone(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            directory: self.directory.clone(),
        }
    }
}

impl<D: SubjectDirectory> IdentifierAllocator<D> {
    pub fn new(cfg: Arc<CoreConfig>, directory: Arc<D>) -> Self {
        Self { cfg, directory }
    }

    /// Computes the next legacy identifier to assign.
    ///
    /// Scans the current population, keeps identifiers whose prefix is a
    /// recognised variant and whose suffix is numeric, and returns the active
    /// prefix with the maximum suffix plus one, zero-padded to the configured
    /// width. An empty population starts the sequence at 1.
    ///
    /// If the directory scan fails the request is not failed: allocation
    /// degrades to a collision-resistant time-derived identifier, logged as a
    /// warning. A scan that exceeds the store deadline is a real failure and
    /// surfaces as [`WorkflowError::Timeout`].
    pub async fn next_legacy_id(&self) -> WorkflowResult<LegacyId> {
        let scan = tokio::time::timeout(
            self.cfg.store_timeout(),
            self.directory.list_legacy_ids(),
        )
        .await;

        let ids = match scan {
            Err(_) => return Err(WorkflowError::Timeout),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "legacy id scan failed; degrading to time-derived allocation");
                return Ok(self.time_derived_id());
            }
            Ok(Ok(ids)) => ids,
        };

        let max_suffix = ids
            .iter()
            .filter_map(|id| self.sequence_number(id))
            .max()
            .unwrap_or(0);

        Ok(self.sequence_id(max_suffix + 1))
    }

    /// Parses the numeric suffix of `id` when its prefix is a recognised
    /// variant. Identifiers with unknown prefixes or non-numeric suffixes
    /// (such as degraded time-derived ids) do not participate in the
    /// sequence.
    fn sequence_number(&self, id: &LegacyId) -> Option<u64> {
        // Variants are sorted longest-first, so PAT wins over PT for PAT0011.
        for variant in self.cfg.legacy_prefix_variants() {
            if let Some(suffix) = id.as_str().strip_prefix(variant.as_str()) {
                return suffix.parse::<u64>().ok();
            }
        }
        None
    }

    fn sequence_id(&self, n: u64) -> LegacyId {
        let formatted = format!(
            "{}{:0width$}",
            self.cfg.legacy_prefix(),
            n,
            width = self.cfg.legacy_width()
        );
        LegacyId::new(formatted).expect("prefix and zero-padded number form a valid legacy id")
    }

    /// Collision-resistant fallback: prefix + compact UTC timestamp + a short
    /// random fragment. Shaped like a legacy id but never parsed back into
    /// the sequence.
    fn time_derived_id(&self) -> LegacyId {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let fragment = &Uuid::new_v4().simple().to_string()[..6];
        let formatted = format!("{}{}{}", self.cfg.legacy_prefix(), stamp, fragment);
        LegacyId::new(formatted).expect("timestamp and hex fragment form a valid legacy id")
    }
}
