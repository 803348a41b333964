use anyhow::Result;

use crate::config::MatchingConfig;
use crate::error::MatchError;
use crate::matching::manual::ManualEntryCollector;
use crate::matching::reconcile::{
    apply_manual_resolution, is_fully_resolved, reconcile, unmatched_entries, ReconciledTable,
};
use crate::models::{FacilityReference, PatientRecord, UnmatchedEntry};

/// Working table for one reconciliation run.
///
/// The caller owns the session and passes it between steps; nothing is kept
/// outside it.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationSession {
    records: Vec<PatientRecord>,
    new_associations: Vec<FacilityReference>,
    excluded: Vec<PatientRecord>,
}

impl ReconciliationSession {
    pub fn new(
        records: Vec<PatientRecord>,
        references: &[FacilityReference],
        cfg: &MatchingConfig,
    ) -> Self {
        let (records, _) = reconcile(records, references, cfg);
        Self {
            records,
            new_associations: Vec::new(),
            excluded: Vec::new(),
        }
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn unmatched(&self) -> Vec<UnmatchedEntry> {
        unmatched_entries(&self.records)
    }

    pub fn is_fully_resolved(&self) -> bool {
        is_fully_resolved(&self.records)
    }

    /// Resolve one entry and remember the association for the reference update.
    pub fn apply_manual_resolution(
        &mut self,
        entry_id: usize,
        facility_name: &str,
    ) -> Result<(), MatchError> {
        let assoc = apply_manual_resolution(&mut self.records, entry_id, facility_name)?;
        if !self.new_associations.contains(&assoc) {
            self.new_associations.push(assoc);
        }
        Ok(())
    }

    /// Offer each currently unmatched entry to `collector`, one at a time.
    /// Returns how many entries were resolved.
    pub fn resolve_with<C: ManualEntryCollector + ?Sized>(
        &mut self,
        collector: &mut C,
    ) -> Result<usize> {
        let mut resolved = 0usize;
        for entry in self.unmatched() {
            let Some(answer) = collector.collect(&entry)? else {
                continue;
            };
            if answer.trim().is_empty() {
                continue;
            }
            self.apply_manual_resolution(entry.entry_id, &answer)?;
            resolved += 1;
        }
        let left = self.records.iter().filter(|r| r.facility_name.is_none()).count();
        if left > 0 {
            log::warn!("{} manual entries resolved, {} still unmatched", resolved, left);
        } else {
            log::info!("{} manual entries resolved, all records matched", resolved);
        }
        Ok(resolved)
    }

    /// Drop the rows that are still unmatched and hand them back.
    ///
    /// Entry ids of earlier [`UnmatchedEntry`] snapshots are invalid afterwards.
    pub fn exclude_unresolved(&mut self) -> Vec<PatientRecord> {
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| r.facility_name.is_some());
        self.records = kept;
        if !dropped.is_empty() {
            log::warn!(
                "excluded {} unmatched record(s) from invoicing (rows {})",
                dropped.len(),
                dropped
                    .iter()
                    .map(|r| r.row.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        self.excluded.extend(dropped.iter().cloned());
        dropped
    }

    pub fn excluded(&self) -> &[PatientRecord] {
        &self.excluded
    }

    /// Associations created by manual entry, in resolution order.
    pub fn new_associations(&self) -> &[FacilityReference] {
        &self.new_associations
    }

    /// The readiness gate: fails while any row lacks a facility.
    pub fn reconciled(&self) -> Result<ReconciledTable<'_>, MatchError> {
        ReconciledTable::new(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::reconcile::tests::{rec, reference};
    use crate::models::UnmatchedEntry;

    fn session() -> ReconciliationSession {
        let records = vec![
            rec(2, "Kim", "9001011234567", "2024-06-02", 100.0),
            rec(3, "Lee", "8505052234567", "2024-06-03", 50.0),
            rec(4, "Lee", "8505052234567", "2024-06-09", 70.0),
            rec(5, "Park", "7001011234567", "2024-06-04", 10.0),
        ];
        let refs = vec![reference("Kim", "9001011234567", "Facility A")];
        ReconciliationSession::new(records, &refs, &MatchingConfig::default())
    }

    #[test]
    fn gate_opens_only_after_every_entry_is_resolved() {
        let mut s = session();
        assert_eq!(s.unmatched().len(), 3);
        assert!(!s.is_fully_resolved());
        assert!(s.reconciled().is_err());

        let mut answers = |e: &UnmatchedEntry| match e.name.as_str() {
            "Lee" => Some("Facility B".to_string()),
            _ => None,
        };
        assert_eq!(s.resolve_with(&mut answers).unwrap(), 2);
        assert_eq!(s.unmatched().len(), 1);
        assert!(s.reconciled().is_err());

        s.apply_manual_resolution(3, "Facility C").unwrap();
        assert!(s.is_fully_resolved());
        assert_eq!(s.reconciled().unwrap().len(), 4);
    }

    #[test]
    fn associations_are_recorded_once() {
        let mut s = session();
        let mut all = |_: &UnmatchedEntry| Some("Facility B".to_string());
        s.resolve_with(&mut all).unwrap();
        assert_eq!(
            s.new_associations(),
            &[
                reference("Lee", "8505052234567", "Facility B"),
                reference("Park", "7001011234567", "Facility B"),
            ]
        );
    }

    #[test]
    fn blank_answers_leave_entries_unresolved() {
        let mut s = session();
        let mut blank = |_: &UnmatchedEntry| Some("   ".to_string());
        assert_eq!(s.resolve_with(&mut blank).unwrap(), 0);
        assert_eq!(s.unmatched().len(), 3);
        assert!(s.new_associations().is_empty());
    }

    #[test]
    fn exclusion_is_explicit() {
        let mut s = session();
        let dropped = s.exclude_unresolved();
        assert_eq!(dropped.len(), 3);
        assert_eq!(s.excluded().len(), 3);
        assert_eq!(s.records().len(), 1);
        assert!(s.reconciled().is_ok());
    }
}
