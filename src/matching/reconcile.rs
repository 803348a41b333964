//! Left-join of records against the facility reference table.

use std::collections::HashMap;

use crate::config::MatchingConfig;
use crate::error::MatchError;
use crate::matching::key::{record_key, reference_key};
use crate::models::{FacilityReference, PatientRecord, UnmatchedEntry};

/// Join `records` to `references` on the match key.
///
/// Every record is kept. A record that already carries a facility keeps it;
/// otherwise the first reference row sharing its key fills it in.
pub fn reconcile(
    mut records: Vec<PatientRecord>,
    references: &[FacilityReference],
    cfg: &MatchingConfig,
) -> (Vec<PatientRecord>, Vec<UnmatchedEntry>) {
    let mut index: HashMap<String, &str> = HashMap::with_capacity(references.len());
    for r in references {
        if let Some(k) = reference_key(r, cfg.key_id_prefix_len) {
            index.entry(k).or_insert(r.facility_name.as_str());
        }
    }

    let mut matched = 0usize;
    for rec in records.iter_mut() {
        if rec.facility_name.is_some() {
            continue;
        }
        let Some(k) = record_key(rec, cfg.key_id_prefix_len) else {
            continue;
        };
        if let Some(f) = index.get(&k) {
            rec.facility_name = Some((*f).to_string());
            matched += 1;
        }
    }

    let unmatched = unmatched_entries(&records);
    log::info!(
        "reconciled {} records against {} reference rows: {} matched by key, {} unmatched",
        records.len(),
        references.len(),
        matched,
        unmatched.len()
    );
    (records, unmatched)
}

/// Records without a facility, in table order.
pub fn unmatched_entries(merged: &[PatientRecord]) -> Vec<UnmatchedEntry> {
    merged
        .iter()
        .enumerate()
        .filter(|(_, r)| r.facility_name.is_none())
        .map(|(i, r)| UnmatchedEntry::from_record(i, r))
        .collect()
}

pub fn is_fully_resolved(merged: &[PatientRecord]) -> bool {
    merged.iter().all(|r| r.facility_name.is_some())
}

/// Set the facility of exactly one unmatched row and return the new association.
pub fn apply_manual_resolution(
    merged: &mut [PatientRecord],
    entry_id: usize,
    facility_name: &str,
) -> Result<FacilityReference, MatchError> {
    let rec = merged
        .get_mut(entry_id)
        .ok_or(MatchError::UnknownEntry(entry_id))?;
    if rec.facility_name.is_some() {
        return Err(MatchError::AlreadyResolved(entry_id));
    }
    let facility_name = facility_name.trim();
    if facility_name.is_empty() {
        return Err(MatchError::EmptyFacility(entry_id));
    }
    rec.facility_name = Some(facility_name.to_string());
    log::debug!(
        "row {}: {} resolved manually to {}",
        rec.row,
        rec.name,
        facility_name
    );
    Ok(FacilityReference {
        name: rec.name.clone(),
        national_id: rec.national_id.clone(),
        facility_name: facility_name.to_string(),
    })
}

/// Merged records proven to have a facility on every row.
///
/// Formatting and export take this type, so they cannot run on a table
/// with unresolved entries.
#[derive(Debug, Clone, Copy)]
pub struct ReconciledTable<'a> {
    records: &'a [PatientRecord],
}

impl<'a> ReconciledTable<'a> {
    pub fn new(records: &'a [PatientRecord]) -> Result<Self, MatchError> {
        let mut pending = records.iter().filter(|r| r.facility_name.is_none());
        if let Some(first) = pending.next() {
            return Err(MatchError::Unresolved {
                count: 1 + pending.count(),
                first_row: first.row,
            });
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &'a [PatientRecord] {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Facility of a record; always present for rows of a [`ReconciledTable`].
pub fn facility_of(r: &PatientRecord) -> &str {
    r.facility_name.as_deref().unwrap_or_default()
}
