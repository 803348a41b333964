use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One visit line from the billing/prescription sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// 1-based spreadsheet row (header is row 1).
    pub row: usize,
    pub name: String,
    pub national_id: String,
    /// Raw visit date text; Excel date cells arrive as `YYYY-MM-DD`.
    pub visit_date: String,
    pub billed_total: f64,
    pub covered_amount: f64,
    pub uncovered_amount: f64,
    pub facility_name: Option<String>,
    #[serde(default)]
    pub extra_fields: HashMap<String, String>, // Input columns beyond the declared schema
}

/// Known patient → facility association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacilityReference {
    pub name: String,
    pub national_id: String,
    pub facility_name: String,
}

/// A record that still has no facility after the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedEntry {
    /// Index of the record in the merged table.
    pub entry_id: usize,
    pub row: usize,
    pub name: String,
    pub national_id: String,
}

impl UnmatchedEntry {
    pub fn from_record(entry_id: usize, r: &PatientRecord) -> Self {
        Self {
            entry_id,
            row: r.row,
            name: r.name.clone(),
            national_id: r.national_id.clone(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} / {}", self.name, self.national_id)
    }
}
