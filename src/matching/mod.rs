//! Patient ↔ facility matching: key construction, the left-join reconciler,
//! the per-run session and the manual-entry interface.

pub mod key;
pub mod manual;
pub mod reconcile;
pub mod session;

pub use key::key_for;
pub use manual::{ManualEntryCollector, PromptCollector};
pub use reconcile::{
    apply_manual_resolution, facility_of, is_fully_resolved, reconcile, unmatched_entries,
    ReconciledTable,
};
pub use session::ReconciliationSession;
