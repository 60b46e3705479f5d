//! Instrument → taxonomy membership for one build.

use crate::domain::{InstrumentId, MasterRecord, TaxonomyEntry, TaxonomyMap};
use crate::error::{CoreError, CoreResult};
use std::collections::HashSet;

/// Resolved taxonomy join: which instruments participate and under which
/// entry.
///
/// Instruments absent from the master participate with a blank entry (every
/// level renders as `Unknown`). Instruments listed under an excluded wrapper
/// market do not participate at all.
#[derive(Debug, Clone, Default)]
pub struct IndustryMembership {
    entries: TaxonomyMap,
    excluded: HashSet<InstrumentId>,
}

impl IndustryMembership {
    /// Build from master rows.
    ///
    /// `code_width` left-pads codes with `'0'` so they match the panel's ids.
    /// Market labels are compared case-insensitively after trimming. A code
    /// appearing twice keeps its first row.
    pub fn from_master(
        master: &[MasterRecord],
        excluded_markets: &[String],
        code_width: Option<usize>,
    ) -> CoreResult<Self> {
        if master.is_empty() {
            return Err(CoreError::Aggregation("taxonomy master is empty".into()));
        }

        let mut entries = TaxonomyMap::with_capacity(master.len());
        let mut excluded = HashSet::new();
        for record in master {
            let id = match code_width {
                Some(w) => InstrumentId::padded(&record.code, w),
                None => InstrumentId::new(&record.code),
            };
            if id.is_empty() {
                continue;
            }
            let market = record.market_label();
            if excluded_markets
                .iter()
                .any(|m| m.trim().eq_ignore_ascii_case(market))
            {
                excluded.insert(id);
                continue;
            }
            entries
                .entry(id)
                .or_insert_with(|| TaxonomyEntry::from_master(record));
        }

        Ok(Self { entries, excluded })
    }

    /// Entry for `id`, or `None` if the instrument is excluded.
    pub fn resolve(&self, id: &InstrumentId) -> Option<TaxonomyEntry> {
        if self.is_excluded(id) {
            return None;
        }
        Some(self.entries.get(id).cloned().unwrap_or_default())
    }

    pub fn is_excluded(&self, id: &InstrumentId) -> bool {
        self.excluded.contains(id)
    }

    /// Number of classified (non-excluded) master rows.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }
}
