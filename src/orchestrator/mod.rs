//! Pipeline helpers shared by the CLI: loading both sheets, building the
//! output workbooks in memory and writing them out.
//!
//! Every workbook of a run is built before [`write_outputs`] touches the
//! filesystem, so a failing step never leaves a partial export behind.

pub mod summary;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::config::AppConfig;
use crate::display::{self, ViewMode};
use crate::export::xlsx_export::{export_facilities, export_table};
use crate::input::{load_records, load_references, read_first_sheet, read_first_sheet_from_bytes};
use crate::matching::{ReconciledTable, ReconciliationSession};
use crate::models::{FacilityReference, PatientRecord};

pub const RECONCILED_FILE_NAME: &str = "전체리스트_요양원자동입력.xlsx";
pub const FACILITIES_FILE_NAME: &str = "요양원별_청구파일_자동생성.xlsx";
const ASSOCIATIONS_FILE_PREFIX: &str = "신규요양원등록";
const INVOICE_FILE_SUFFIX: &str = "청구서";

/// Characters that cannot appear in a file name on common filesystems.
const FILE_NAME_FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone)]
pub struct Inputs {
    pub records: Vec<PatientRecord>,
    pub references: Vec<FacilityReference>,
}

impl Inputs {
    /// Join the two tables and open a session on the result.
    pub fn into_session(self, cfg: &AppConfig) -> ReconciliationSession {
        let session = ReconciliationSession::new(self.records, &self.references, &cfg.matching);
        let pending = session.unmatched().len();
        if pending > 0 {
            info!(
                "{} of {} records have no facility after the join",
                pending,
                session.records().len()
            );
        } else {
            info!("all {} records matched a facility", session.records().len());
        }
        session
    }
}

pub fn load_inputs(records: &Path, reference: &Path, cfg: &AppConfig) -> Result<Inputs> {
    let rec_sheet = read_first_sheet(records)
        .with_context(|| format!("reading records from {}", records.display()))?;
    let ref_sheet = read_first_sheet(reference)
        .with_context(|| format!("reading reference from {}", reference.display()))?;
    Ok(Inputs {
        records: load_records(&rec_sheet, &cfg.columns, &cfg.matching)?,
        references: load_references(&ref_sheet, &cfg.columns, &cfg.matching)?,
    })
}

/// Same as [`load_inputs`] for workbooks already held in memory (uploads).
pub fn load_inputs_from_bytes(records: &[u8], reference: &[u8], cfg: &AppConfig) -> Result<Inputs> {
    let rec_sheet = read_first_sheet_from_bytes(records, "records upload")?;
    let ref_sheet = read_first_sheet_from_bytes(reference, "reference upload")?;
    Ok(Inputs {
        records: load_records(&rec_sheet, &cfg.columns, &cfg.matching)?,
        references: load_references(&ref_sheet, &cfg.columns, &cfg.matching)?,
    })
}

/// A finished workbook waiting to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// File-system safe version of a facility name.
pub fn file_name_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if FILE_NAME_FORBIDDEN.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "facility".to_string()
    } else {
        cleaned
    }
}

pub fn invoice_file_name(facility: &str) -> String {
    format!("{}_{}.xlsx", file_name_component(facility), INVOICE_FILE_SUFFIX)
}

pub fn associations_file_name(date: NaiveDate) -> String {
    format!("{}_{}.xlsx", ASSOCIATIONS_FILE_PREFIX, date.format("%Y%m%d"))
}

/// The full reconciled table, every input column plus the facility.
pub fn reconciled_workbook(table: &ReconciledTable<'_>, cfg: &AppConfig) -> Result<OutputFile> {
    let t = display::reconciled_table(table, &cfg.columns);
    let bytes = export_table(&t, Some(cfg.export.reconciled_sheet_name.as_str()), &cfg.export)?;
    Ok(OutputFile {
        file_name: RECONCILED_FILE_NAME.to_string(),
        bytes,
    })
}

/// Associations created by manual entry, or `None` when there are none.
pub fn associations_workbook(
    session: &ReconciliationSession,
    date: NaiveDate,
    cfg: &AppConfig,
) -> Result<Option<OutputFile>> {
    let assocs = session.new_associations();
    if assocs.is_empty() {
        return Ok(None);
    }
    let t = display::associations_table(assocs, &cfg.columns);
    let bytes = export_table(&t, Some(cfg.export.associations_sheet_name.as_str()), &cfg.export)?;
    info!("{} new facility association(s) to register", assocs.len());
    Ok(Some(OutputFile {
        file_name: associations_file_name(date),
        bytes,
    }))
}

/// Invoice for one facility in the requested view.
pub fn invoice_workbook(
    table: &ReconciledTable<'_>,
    facility: &str,
    view: ViewMode,
    cfg: &AppConfig,
) -> Result<OutputFile> {
    let t = display::format_for_facility(table, facility, view, cfg)?;
    let bytes = export_table(&t, None, &cfg.export)
        .with_context(|| format!("exporting invoice for {}", facility))?;
    Ok(OutputFile {
        file_name: invoice_file_name(facility),
        bytes,
    })
}

/// One workbook with an index sheet and a sheet per facility.
pub fn facilities_workbook(table: &ReconciledTable<'_>, cfg: &AppConfig) -> Result<OutputFile> {
    let sheets = display::facility_tables(table, &cfg.columns);
    let bytes = export_facilities(&sheets, &cfg.export)?;
    Ok(OutputFile {
        file_name: FACILITIES_FILE_NAME.to_string(),
        bytes,
    })
}

/// Readiness gate for a run. While rows are still unmatched the manual
/// associations made so far are written to `dir` before the error is
/// returned, so facility names typed during the run are not lost.
pub fn reconciled_or_save_associations<'a>(
    session: &'a ReconciliationSession,
    associations: Option<&OutputFile>,
    dir: &Path,
) -> Result<ReconciledTable<'a>> {
    match session.reconciled() {
        Ok(table) => Ok(table),
        Err(e) => {
            if let Some(file) = associations {
                let path = write_output(dir, file)?;
                log::warn!(
                    "{} manual association(s) kept in {}",
                    session.new_associations().len(),
                    path.display()
                );
            }
            Err(e.into())
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    Ok(())
}

pub fn write_output(dir: &Path, file: &OutputFile) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(&file.file_name);
    fs::write(&path, &file.bytes).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {} ({} bytes)", path.display(), file.bytes.len());
    Ok(path)
}

pub fn write_outputs(dir: &Path, files: &[OutputFile]) -> Result<Vec<PathBuf>> {
    files.iter().map(|f| write_output(dir, f)).collect()
}
