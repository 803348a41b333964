//! Per-facility invoice views over a reconciled table.

pub mod names;
pub mod pivot;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::config::{AppConfig, ColumnNames};
use crate::error::FormatError;
use crate::matching::{facility_of, ReconciledTable};
use crate::models::{FacilityReference, PatientRecord};
use crate::normalize::parse_visit_date;
pub use names::DisplayNames;
pub use pivot::{PivotRow, PivotTable};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Header row plus data rows; what the formatter hands to the exporter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn column_sum(&self, col: usize) -> f64 {
        self.rows
            .iter()
            .filter_map(|r| r.get(col).and_then(Cell::as_number))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// One line per visit (기본형).
    Flat,
    /// Display name × day of month (피벗형).
    Pivot,
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" | "기본형" => Ok(Self::Flat),
            "pivot" | "피벗형" => Ok(Self::Pivot),
            other => Err(format!("unknown view mode: {}", other)),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Pivot => write!(f, "pivot"),
        }
    }
}

/// Distinct facility names, sorted.
pub fn facilities(table: &ReconciledTable<'_>) -> Vec<String> {
    table
        .records()
        .iter()
        .map(|r| facility_of(r).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn records_of<'a>(
    table: &ReconciledTable<'a>,
    facility: &str,
) -> Result<Vec<&'a PatientRecord>, FormatError> {
    let rows: Vec<&PatientRecord> = table
        .records()
        .iter()
        .filter(|r| facility_of(r) == facility)
        .collect();
    if rows.is_empty() {
        return Err(FormatError::UnknownFacility(facility.to_string()));
    }
    Ok(rows)
}

fn visit_date_of(r: &PatientRecord) -> Option<NaiveDate> {
    let parsed = parse_visit_date(&r.visit_date);
    if parsed.is_none() {
        log::warn!(
            "row {}: visit date '{}' could not be parsed; left out of the pivot",
            r.row,
            r.visit_date
        );
    }
    parsed
}

/// Invoice view of one facility. Display names are computed over the whole
/// table, not just the facility.
pub fn format_for_facility(
    table: &ReconciledTable<'_>,
    facility: &str,
    view: ViewMode,
    cfg: &AppConfig,
) -> Result<Table, FormatError> {
    let rows = records_of(table, facility)?;
    let names = DisplayNames::new(table.records(), cfg.matching.display_id_prefix_len);
    let dated: Vec<(Option<NaiveDate>, &PatientRecord)> =
        rows.into_iter().map(|r| (visit_date_of(r), r)).collect();

    let out = match view {
        ViewMode::Flat => flat_view(dated, &names, cfg),
        ViewMode::Pivot => PivotTable::build(
            dated
                .into_iter()
                .map(|(d, r)| (names.get(r), d, r.billed_total)),
        )
        .into_table(
            &cfg.display.display_name_header,
            &cfg.display.pivot_total_header,
        ),
    };
    log::debug!(
        "{} view for {}: {} rows, {} columns",
        view,
        facility,
        out.rows.len(),
        out.headers.len()
    );
    Ok(out)
}

fn flat_view(
    mut dated: Vec<(Option<NaiveDate>, &PatientRecord)>,
    names: &DisplayNames,
    cfg: &AppConfig,
) -> Table {
    // Stable: undated rows go last in input order.
    dated.sort_by_key(|(d, _)| (d.is_none(), *d));
    let c = &cfg.columns;
    let headers = vec![
        cfg.display.date_header.clone(),
        cfg.display.display_name_header.clone(),
        c.national_id.clone(),
        c.billed_total.clone(),
        c.covered_amount.clone(),
        c.uncovered_amount.clone(),
    ];
    let rows = dated
        .into_iter()
        .map(|(d, r)| {
            vec![
                d.map(|d| Cell::Text(d.format(&cfg.display.date_format).to_string()))
                    .unwrap_or(Cell::Empty),
                Cell::Text(names.get(r)),
                Cell::text(&r.national_id),
                Cell::Number(r.billed_total),
                Cell::Number(r.covered_amount),
                Cell::Number(r.uncovered_amount),
            ]
        })
        .collect();
    Table { headers, rows }
}

fn extra_field_names<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a PatientRecord>,
{
    let mut set = BTreeSet::new();
    for r in records {
        for k in r.extra_fields.keys() {
            set.insert(k.clone());
        }
    }
    set.into_iter().collect()
}

/// Every input column of `records`, facility last; used for the full-table
/// export and for the per-facility sheets of the combined workbook.
pub fn records_table(records: &[&PatientRecord], names: &ColumnNames) -> Table {
    let extras = extra_field_names(records.iter().copied());
    let mut headers = vec![
        names.name.clone(),
        names.national_id.clone(),
        names.visit_date.clone(),
        names.billed_total.clone(),
        names.covered_amount.clone(),
        names.uncovered_amount.clone(),
    ];
    headers.extend(extras.iter().cloned());
    headers.push(names.facility_name.clone());

    let rows = records
        .iter()
        .map(|r| {
            let mut cells = vec![
                Cell::text(&r.name),
                Cell::text(&r.national_id),
                Cell::text(&r.visit_date),
                Cell::Number(r.billed_total),
                Cell::Number(r.covered_amount),
                Cell::Number(r.uncovered_amount),
            ];
            for e in &extras {
                cells.push(Cell::text(
                    r.extra_fields.get(e).map(String::as_str).unwrap_or(""),
                ));
            }
            cells.push(Cell::text(r.facility_name.as_deref().unwrap_or("")));
            cells
        })
        .collect();
    Table { headers, rows }
}

pub fn reconciled_table(table: &ReconciledTable<'_>, names: &ColumnNames) -> Table {
    let all: Vec<&PatientRecord> = table.records().iter().collect();
    records_table(&all, names)
}

/// One full-column table per facility, in facility name order.
pub fn facility_tables(table: &ReconciledTable<'_>, names: &ColumnNames) -> Vec<(String, Table)> {
    facilities(table)
        .into_iter()
        .map(|f| {
            let rows: Vec<&PatientRecord> = table
                .records()
                .iter()
                .filter(|r| facility_of(r) == f)
                .collect();
            let t = records_table(&rows, names);
            (f, t)
        })
        .collect()
}

/// Manually created associations as a standalone reference table.
pub fn associations_table(assocs: &[FacilityReference], names: &ColumnNames) -> Table {
    Table {
        headers: vec![
            names.name.clone(),
            names.national_id.clone(),
            names.facility_name.clone(),
        ],
        rows: assocs
            .iter()
            .map(|a| {
                vec![
                    Cell::text(&a.name),
                    Cell::text(&a.national_id),
                    Cell::text(&a.facility_name),
                ]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::reconcile::tests::{rec, reference};
    use crate::matching::ReconciliationSession;

    fn merged() -> Vec<PatientRecord> {
        let mut records = vec![
            rec(2, "Kim", "9001011234567", "2024-06-05", 30.0),
            rec(3, "Kim", "9001021234567", "2024-06-02", 100.0),
            rec(4, "Lee", "8505052234567", "not a date", 50.0),
            rec(5, "Lee", "8505052234567", "2024-06-02", 70.0),
            rec(6, "Park", "7001011234567", "2024-06-03", 10.0),
        ];
        records[1].extra_fields.insert("보험".into(), "건강".into());
        let refs = vec![
            reference("Kim", "9001011234567", "Facility A"),
            reference("Kim", "9001021234567", "Facility B"),
            reference("Lee", "8505052234567", "Facility A"),
            reference("Park", "7001011234567", "Facility B"),
        ];
        let s = ReconciliationSession::new(records, &refs, &AppConfig::default().matching);
        assert!(s.is_fully_resolved());
        s.records().to_vec()
    }

    #[test]
    fn scenario_single_record() {
        let records = vec![rec(2, "Kim", "9001011234567", "2024-06-02", 100.0)];
        let refs = vec![reference("Kim", "9001011234567", "Facility A")];
        let cfg = AppConfig::default();
        let s = ReconciliationSession::new(records, &refs, &cfg.matching);
        let t = s.reconciled().unwrap();
        let view = format_for_facility(&t, "Facility A", ViewMode::Flat, &cfg).unwrap();
        assert_eq!(
            view.headers,
            vec!["날짜", "표시이름", "주민등록번호", "계", "요양급여액", "비급여액"]
        );
        assert_eq!(view.rows[0][0], Cell::Text("06월2일".into()));
        assert_eq!(view.rows[0][1], Cell::Text("Kim".into()));
        assert_eq!(view.rows[0][3], Cell::Number(100.0));
    }

    #[test]
    fn flat_view_sorts_by_date_and_keeps_unparsed_rows() {
        let records = merged();
        let t = ReconciledTable::new(&records).unwrap();
        let cfg = AppConfig::default();
        let view = format_for_facility(&t, "Facility A", ViewMode::Flat, &cfg).unwrap();
        let dates: Vec<&Cell> = view.rows.iter().map(|r| &r[0]).collect();
        assert_eq!(
            dates,
            vec![
                &Cell::Text("06월2일".into()),
                &Cell::Text("06월5일".into()),
                &Cell::Empty
            ]
        );
        // Kim is a namesake across the whole table even though Facility A has one Kim.
        assert_eq!(view.rows[1][1], Cell::Text("Kim(90)".into()));
        // Lee has two visits, so the name is annotated as well.
        assert_eq!(view.rows[0][1], Cell::Text("Lee(85)".into()));
    }

    #[test]
    fn pivot_excludes_unparsed_dates() {
        let records = merged();
        let t = ReconciledTable::new(&records).unwrap();
        let cfg = AppConfig::default();
        let view = format_for_facility(&t, "Facility A", ViewMode::Pivot, &cfg).unwrap();
        assert_eq!(view.headers, vec!["표시이름", "2일", "5일", "합계"]);
        assert_eq!(
            view.rows,
            vec![
                vec![
                    Cell::Text("Kim(90)".into()),
                    Cell::Number(0.0),
                    Cell::Number(30.0),
                    Cell::Number(30.0)
                ],
                vec![
                    Cell::Text("Lee(85)".into()),
                    Cell::Number(70.0),
                    Cell::Number(0.0),
                    Cell::Number(70.0)
                ],
            ]
        );
    }

    #[test]
    fn formatting_does_not_touch_input() {
        let records = merged();
        let before = records.clone();
        let t = ReconciledTable::new(&records).unwrap();
        let cfg = AppConfig::default();
        let _ = format_for_facility(&t, "Facility B", ViewMode::Pivot, &cfg).unwrap();
        let _ = format_for_facility(&t, "Facility B", ViewMode::Flat, &cfg).unwrap();
        assert_eq!(records, before);
    }

    #[test]
    fn unknown_facility_is_an_error() {
        let records = merged();
        let t = ReconciledTable::new(&records).unwrap();
        let err = format_for_facility(&t, "Nowhere", ViewMode::Flat, &AppConfig::default())
            .unwrap_err();
        assert_eq!(err, FormatError::UnknownFacility("Nowhere".into()));
    }

    #[test]
    fn facility_tables_are_sorted_and_complete() {
        let records = merged();
        let t = ReconciledTable::new(&records).unwrap();
        let names = ColumnNames::default();
        let sheets = facility_tables(&t, &names);
        let facilities: Vec<&str> = sheets.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(facilities, vec!["Facility A", "Facility B"]);
        let b = &sheets[1].1;
        assert_eq!(
            b.headers,
            vec!["고객이름", "주민등록번호", "내방일", "계", "요양급여액", "비급여액", "보험", "요양원명"]
        );
        assert_eq!(b.rows.len(), 2);
        assert_eq!(b.column_sum(3), 110.0);
        assert_eq!(b.rows[1][6], Cell::Empty);
    }

    #[test]
    fn view_mode_parses_both_languages() {
        assert_eq!("pivot".parse::<ViewMode>(), Ok(ViewMode::Pivot));
        assert_eq!("기본형".parse::<ViewMode>(), Ok(ViewMode::Flat));
        assert!("table".parse::<ViewMode>().is_err());
    }
}
