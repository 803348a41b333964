use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, DataType, Reader, Sheets};

use crate::error::InputError;
use crate::normalize::numeric_id_to_string;

/// Header row plus data rows of the first worksheet.
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub headers: Vec<String>,
    /// (1-based spreadsheet row, cells)
    pub rows: Vec<(usize, Vec<Data>)>,
}

impl SheetData {
    pub fn cell<'a>(&'a self, cells: &'a [Data], col: usize) -> &'a Data {
        cells.get(col).unwrap_or(&Data::Empty)
    }
}

pub fn read_first_sheet<P: AsRef<Path>>(path: P) -> Result<SheetData, InputError> {
    let source_name = path.as_ref().display().to_string();
    let wb = open_workbook_auto(&path).map_err(|e| InputError::Open {
        source_name: source_name.clone(),
        reason: e.to_string(),
    })?;
    first_sheet(wb, &source_name)
}

/// Same as [`read_first_sheet`] for uploads already held in memory.
pub fn read_first_sheet_from_bytes(bytes: &[u8], source_name: &str) -> Result<SheetData, InputError> {
    let wb = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| {
        InputError::Open {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        }
    })?;
    first_sheet(wb, source_name)
}

fn first_sheet<RS: Read + Seek>(mut wb: Sheets<RS>, source_name: &str) -> Result<SheetData, InputError> {
    let range = wb
        .worksheet_range_at(0)
        .ok_or_else(|| InputError::NoWorksheet {
            source_name: source_name.to_string(),
        })?
        .map_err(|e| InputError::Open {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })?;

    // Ranges start at the first used cell; keep row numbers relative to the sheet.
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(h) => h.iter().map(cell_text).collect(),
        None => return Ok(SheetData::default()),
    };

    let mut rows = Vec::new();
    for (i, cells) in rows_iter.enumerate() {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        rows.push((first_row + i + 2, cells.to_vec()));
    }
    log::debug!(
        "read {} data rows, {} columns from {}",
        rows.len(),
        headers.len(),
        source_name
    );
    Ok(SheetData { headers, rows })
}

/// Cell rendered as trimmed text. Excel dates become `YYYY-MM-DD`.
pub fn cell_text(v: &Data) -> String {
    match v {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(_) => v
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| v.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Error(e) => format!("#ERROR:{:?}", e),
    }
}

/// National ID cell as text without losing digits to number formatting.
pub fn cell_national_id(v: &Data, width: Option<usize>) -> String {
    match v {
        Data::Float(f) => numeric_id_to_string(*f, width),
        Data::Int(i) => numeric_id_to_string(*i as f64, width),
        _ => cell_text(v),
    }
}

/// Numeric cell, or `None` when the value cannot be read as an amount.
pub fn cell_amount(v: &Data) -> Option<f64> {
    match v {
        Data::Empty => Some(0.0),
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => crate::normalize::parse_amount(s),
        _ => None,
    }
}
