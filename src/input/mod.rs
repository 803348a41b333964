//! Input loading: declared column schemas for the two sheets and conversion
//! of their rows into [`PatientRecord`] / [`FacilityReference`].

pub mod xlsx_reader;

use std::collections::HashMap;

use crate::config::{ColumnNames, MatchingConfig};
use crate::error::InputError;
use crate::models::{FacilityReference, PatientRecord};
use crate::normalize::normalize_name;
pub use xlsx_reader::{read_first_sheet, read_first_sheet_from_bytes, SheetData};
use xlsx_reader::{cell_amount, cell_national_id, cell_text};

pub const RECORDS_TABLE: &str = "records";
pub const REFERENCE_TABLE: &str = "reference";

/// Column positions of the records sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordColumns {
    pub name: usize,
    pub national_id: usize,
    pub visit_date: usize,
    pub billed_total: usize,
    pub covered_amount: usize,
    pub uncovered_amount: usize,
    pub facility_name: Option<usize>,
    /// Every other non-blank header, in sheet order.
    pub extras: Vec<(usize, String)>,
}

impl RecordColumns {
    pub fn resolve(headers: &[String], names: &ColumnNames) -> Result<Self, InputError> {
        let find = |h: &str| headers.iter().position(|x| x == h);
        let required = [
            &names.name,
            &names.national_id,
            &names.visit_date,
            &names.billed_total,
            &names.covered_amount,
            &names.uncovered_amount,
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|h| find(h).is_none())
            .map(|h| h.to_string())
            .collect();
        let (
            Some(name),
            Some(national_id),
            Some(visit_date),
            Some(billed_total),
            Some(covered_amount),
            Some(uncovered_amount),
        ) = (
            find(&names.name),
            find(&names.national_id),
            find(&names.visit_date),
            find(&names.billed_total),
            find(&names.covered_amount),
            find(&names.uncovered_amount),
        )
        else {
            return Err(InputError::MissingColumns {
                table: RECORDS_TABLE,
                columns: missing,
            });
        };
        let facility_name = find(&names.facility_name);
        let known = [
            Some(name),
            Some(national_id),
            Some(visit_date),
            Some(billed_total),
            Some(covered_amount),
            Some(uncovered_amount),
            facility_name,
        ];
        let extras = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| !h.is_empty() && !known.contains(&Some(*i)))
            .map(|(i, h)| (i, h.clone()))
            .collect();
        Ok(Self {
            name,
            national_id,
            visit_date,
            billed_total,
            covered_amount,
            uncovered_amount,
            facility_name,
            extras,
        })
    }
}

/// Column positions of the reference sheet, in either accepted layout.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceColumns {
    Split {
        name: usize,
        national_id: usize,
        facility_name: usize,
    },
    Combined {
        combined_key: usize,
        facility_name: usize,
    },
}

impl ReferenceColumns {
    pub fn resolve(headers: &[String], names: &ColumnNames) -> Result<Self, InputError> {
        let find = |h: &str| headers.iter().position(|x| x == h);
        let facility = find(&names.facility_name);
        if let (Some(name), Some(national_id), Some(facility_name)) =
            (find(&names.name), find(&names.national_id), facility)
        {
            return Ok(Self::Split {
                name,
                national_id,
                facility_name,
            });
        }
        if let (Some(combined_key), Some(facility_name)) = (find(&names.combined_key), facility) {
            return Ok(Self::Combined {
                combined_key,
                facility_name,
            });
        }

        let mut missing = Vec::new();
        if find(&names.combined_key).is_none() {
            for h in [&names.name, &names.national_id] {
                if find(h).is_none() {
                    missing.push(h.to_string());
                }
            }
            if !missing.is_empty() {
                missing = vec![format!(
                    "{} (or {} + {})",
                    names.combined_key, names.name, names.national_id
                )];
            }
        }
        if facility.is_none() {
            missing.push(names.facility_name.clone());
        }
        Err(InputError::MissingColumns {
            table: REFERENCE_TABLE,
            columns: missing,
        })
    }
}

/// Split a "name+ID" key at the first ASCII digit.
pub fn split_combined_key(s: &str) -> (String, String) {
    let s = s.trim();
    match s.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => (s[..idx].trim().to_string(), s[idx..].trim().to_string()),
        None => (s.to_string(), String::new()),
    }
}

pub fn load_records(
    sheet: &SheetData,
    names: &ColumnNames,
    matching: &MatchingConfig,
) -> Result<Vec<PatientRecord>, InputError> {
    let cols = RecordColumns::resolve(&sheet.headers, names)?;
    let amount = |cells: &[calamine::Data], col: usize, header: &str, row: usize| {
        let v = sheet.cell(cells, col);
        cell_amount(v).ok_or_else(|| InputError::InvalidNumber {
            table: RECORDS_TABLE,
            row,
            column: header.to_string(),
            value: cell_text(v),
        })
    };

    let mut out = Vec::with_capacity(sheet.rows.len());
    for (row, cells) in &sheet.rows {
        let row = *row;
        let facility_name = cols
            .facility_name
            .map(|c| cell_text(sheet.cell(cells, c)))
            .filter(|s| !s.is_empty());
        let mut extra_fields = HashMap::new();
        for (c, header) in &cols.extras {
            let v = cell_text(sheet.cell(cells, *c));
            if !v.is_empty() {
                extra_fields.insert(header.clone(), v);
            }
        }
        out.push(PatientRecord {
            row,
            name: normalize_name(&cell_text(sheet.cell(cells, cols.name))),
            national_id: cell_national_id(
                sheet.cell(cells, cols.national_id),
                matching.national_id_width,
            ),
            visit_date: cell_text(sheet.cell(cells, cols.visit_date)),
            billed_total: amount(cells, cols.billed_total, &names.billed_total, row)?,
            covered_amount: amount(cells, cols.covered_amount, &names.covered_amount, row)?,
            uncovered_amount: amount(cells, cols.uncovered_amount, &names.uncovered_amount, row)?,
            facility_name,
            extra_fields,
        });
    }
    log::info!("loaded {} records", out.len());
    Ok(out)
}

pub fn load_references(
    sheet: &SheetData,
    names: &ColumnNames,
    matching: &MatchingConfig,
) -> Result<Vec<FacilityReference>, InputError> {
    let cols = ReferenceColumns::resolve(&sheet.headers, names)?;
    let mut out = Vec::with_capacity(sheet.rows.len());
    let mut skipped = 0usize;
    for (_, cells) in &sheet.rows {
        let (name, national_id, facility_col) = match cols {
            ReferenceColumns::Split {
                name,
                national_id,
                facility_name,
            } => (
                cell_text(sheet.cell(cells, name)),
                cell_national_id(sheet.cell(cells, national_id), matching.national_id_width),
                facility_name,
            ),
            ReferenceColumns::Combined {
                combined_key,
                facility_name,
            } => {
                let (n, id) = split_combined_key(&cell_text(sheet.cell(cells, combined_key)));
                (n, id, facility_name)
            }
        };
        let facility_name = cell_text(sheet.cell(cells, facility_col));
        if facility_name.is_empty() || name.is_empty() || national_id.is_empty() {
            skipped += 1;
            continue;
        }
        out.push(FacilityReference {
            name: normalize_name(&name),
            national_id,
            facility_name,
        });
    }
    if skipped > 0 {
        log::warn!("skipped {} reference rows without name, ID or facility", skipped);
    }
    log::info!("loaded {} facility references", out.len());
    Ok(out)
}
