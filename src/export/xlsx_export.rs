use std::collections::HashSet;

use rust_xlsxwriter::utility::column_number_to_name;
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatUnderline, Formula, Url, Workbook, Worksheet, XlsxError,
};

use crate::config::ExportConfig;
use crate::display::{Cell, Table};
use crate::error::ExportError;

pub(crate) const SHEET_NAME_MAX: usize = 31;
pub(crate) const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// What to put in a workbook.
#[derive(Debug, Clone, Copy)]
pub enum ExportTables<'a> {
    /// One sheet holding `table`; `sheet_title` falls back to the invoice sheet name.
    Single {
        table: &'a Table,
        sheet_title: Option<&'a str>,
    },
    /// Index sheet plus one sheet per (facility, rows), in the given order.
    PerFacility(&'a [(String, Table)]),
}

pub fn export(tables: ExportTables<'_>, cfg: &ExportConfig) -> Result<Vec<u8>, ExportError> {
    match tables {
        ExportTables::Single { table, sheet_title } => export_table(table, sheet_title, cfg),
        ExportTables::PerFacility(sheets) => export_facilities(sheets, cfg),
    }
}

fn header_format() -> Format {
    Format::new().set_bold().set_align(FormatAlign::Center)
}

fn row_format_even() -> Format {
    Format::new().set_background_color(Color::RGB(0xF2F2F2))
}

fn title_format() -> Format {
    Format::new().set_bold().set_font_size(14)
}

fn link_format() -> Format {
    Format::new()
        .set_font_color(Color::RGB(0x0000FF))
        .set_underline(FormatUnderline::Single)
}

/// Excel-safe sheet name: forbidden characters become `_`, at most 31 characters.
pub fn sheet_name_for(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if SHEET_NAME_FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    let truncated: String = cleaned
        .trim_matches('\'')
        .chars()
        .take(SHEET_NAME_MAX)
        .collect();
    let truncated = truncated.trim_end_matches('\'');
    if truncated.is_empty() {
        "Sheet".to_string()
    } else {
        truncated.to_string()
    }
}

/// Reserve `base` in `used` (case-insensitive), appending `~N` when it is taken.
fn unique_sheet_name(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_lowercase()) {
        return base.to_string();
    }
    let mut n = 2usize;
    loop {
        let suffix = format!("~{}", n);
        let head: String = base
            .chars()
            .take(SHEET_NAME_MAX - suffix.chars().count())
            .collect();
        let candidate = format!("{}{}", head, suffix);
        if used.insert(candidate.to_lowercase()) {
            log::warn!(
                "sheet name '{}' is already used; writing '{}' instead",
                base,
                candidate
            );
            return candidate;
        }
        n += 1;
    }
}

fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn format_result(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
        format!("{:.0}", v)
    } else {
        v.to_string()
    }
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    match cell {
        Cell::Empty => {}
        Cell::Text(s) => {
            ws.write_string(row, col, s)?;
        }
        Cell::Number(v) => {
            ws.write_number(row, col, *v)?;
        }
    }
    Ok(())
}

/// Header row at row 0, data from row 1.
fn write_table(ws: &mut Worksheet, table: &Table) -> Result<(), XlsxError> {
    let hfmt = header_format();
    for (c, h) in table.headers.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, h, &hfmt)?;
    }

    let even = row_format_even();
    for (i, cells) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        if i % 2 == 0 {
            ws.set_row_format(r, &even)?;
        }
        for (c, cell) in cells.iter().enumerate() {
            write_cell(ws, r, c as u16, cell)?;
        }
    }
    Ok(())
}

/// Totals row under the data: the label in column A and a live SUM over
/// rows 2..=last for each configured total column.
fn write_totals_row(ws: &mut Worksheet, table: &Table, cfg: &ExportConfig) -> Result<(), XlsxError> {
    if table.rows.is_empty() {
        return Ok(());
    }
    let totals_row = (table.rows.len() + 1) as u32;
    let last_data_row = table.rows.len() + 1; // 1-based
    let bold = Format::new().set_bold();
    ws.write_string_with_format(totals_row, 0, &cfg.totals_label, &bold)?;
    for header in &cfg.total_columns {
        let Some(col) = table.column(header) else {
            continue;
        };
        let letter = column_number_to_name(col as u16);
        let formula = Formula::new(format!("=SUM({0}2:{0}{1})", letter, last_data_row))
            .set_result(format_result(table.column_sum(col)));
        ws.write_formula_with_format(totals_row, col as u16, formula, &bold)?;
    }
    Ok(())
}

pub fn export_table(
    table: &Table,
    sheet_title: Option<&str>,
    cfg: &ExportConfig,
) -> Result<Vec<u8>, ExportError> {
    let name = sheet_title
        .map(sheet_name_for)
        .unwrap_or_else(|| cfg.invoice_sheet_name.clone());
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.set_name(&name)?;
    write_table(ws, table)?;
    let buf = workbook.save_to_buffer()?;
    log::info!(
        "exported sheet '{}' ({} rows, {} bytes)",
        name,
        table.rows.len(),
        buf.len()
    );
    Ok(buf)
}

/// Index sheet first, then one sheet per facility with a totals row.
/// The index is the active sheet, so the workbook opens on it.
pub fn export_facilities(
    sheets: &[(String, Table)],
    cfg: &ExportConfig,
) -> Result<Vec<u8>, ExportError> {
    if sheets.is_empty() {
        return Err(ExportError::Empty("no facilities to export"));
    }

    let mut used = HashSet::new();
    used.insert(cfg.index_sheet_name.to_lowercase());
    // Excel reserves "History" for its change-tracking sheet.
    used.insert("history".to_string());
    let names: Vec<String> = sheets
        .iter()
        .map(|(facility, _)| unique_sheet_name(&sheet_name_for(facility), &mut used))
        .collect();

    let mut workbook = Workbook::new();
    {
        let index = workbook.add_worksheet();
        index.set_name(&cfg.index_sheet_name)?;
        index.write_string_with_format(0, 0, &cfg.index_title, &title_format())?;
        index.set_column_width(0, 40.0)?;
        let link = link_format();
        for (i, ((facility, _), sheet)) in sheets.iter().zip(&names).enumerate() {
            let url = Url::new(format!("internal:{}!A1", quote_sheet_name(sheet)))
                .set_text(facility);
            index.write_url_with_format((i + 2) as u32, 0, url, &link)?;
        }
        index.set_active(true);
    }

    for ((facility, table), sheet) in sheets.iter().zip(&names) {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet)?;
        write_table(ws, table)?;
        write_totals_row(ws, table, cfg)?;
        log::debug!("sheet '{}' for {}: {} rows", sheet, facility, table.rows.len());
    }

    let buf = workbook.save_to_buffer()?;
    log::info!(
        "exported {} facility sheets plus index ({} bytes)",
        sheets.len(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::{Cursor, Read};

    /// Raw XML of one part of the written package.
    fn xml_part(bytes: &[u8], part: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name(part)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml.replace("&apos;", "'")
    }

    fn table(rows: &[(&str, f64, f64)]) -> Table {
        Table {
            headers: vec!["고객이름".into(), "요양급여액".into(), "계".into(), "비고".into()],
            rows: rows
                .iter()
                .map(|(n, covered, billed)| {
                    vec![
                        Cell::Text(n.to_string()),
                        Cell::Number(*covered),
                        Cell::Number(*billed),
                        Cell::Empty,
                    ]
                })
                .collect(),
        }
    }

    fn number(v: Option<&Data>) -> f64 {
        match v {
            Some(Data::Float(f)) => *f,
            Some(Data::Int(i)) => *i as f64,
            Some(Data::String(s)) => s.parse().unwrap(),
            other => panic!("not a number: {other:?}"),
        }
    }

    #[test]
    fn sheet_names_are_cleaned_and_truncated() {
        assert_eq!(sheet_name_for("A/B:C"), "A_B_C");
        let long = "가".repeat(40);
        assert_eq!(sheet_name_for(&long).chars().count(), 31);
        assert_eq!(sheet_name_for("  "), "Sheet");
    }

    #[test]
    fn truncation_collisions_get_a_suffix() {
        let mut used = HashSet::new();
        let base = "x".repeat(31);
        assert_eq!(unique_sheet_name(&base, &mut used), base);
        let second = unique_sheet_name(&base, &mut used);
        assert_eq!(second.chars().count(), 31);
        assert!(second.ends_with("~2"));
        assert_eq!(unique_sheet_name("X", &mut used), "X");
        assert_eq!(unique_sheet_name("x", &mut used), "x~2");
    }

    #[test]
    fn single_table_round_trip_keeps_headers() {
        let t = table(&[("Kim", 80.0, 100.0)]);
        let bytes = export_table(&t, None, &ExportConfig::default()).unwrap();
        let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(wb.sheet_names(), vec!["청구서".to_string()]);
        let range = wb.worksheet_range("청구서").unwrap();
        let headers: Vec<String> = (0..4)
            .map(|c| match range.get_value((0, c)) {
                Some(Data::String(s)) => s.clone(),
                other => panic!("bad header {other:?}"),
            })
            .collect();
        assert_eq!(headers, t.headers);
        assert_eq!(number(range.get_value((1, 2))), 100.0);
    }

    #[test]
    fn per_facility_workbook_layout() {
        let sheets = vec![
            (
                "Facility A".to_string(),
                table(&[("Kim", 80.0, 100.0), ("Lee", 40.0, 50.0), ("Lee", 24.0, 30.0)]),
            ),
            ("Facility B".to_string(), table(&[("Park", 8.0, 10.0)])),
        ];
        let cfg = ExportConfig::default();
        let bytes = export(ExportTables::PerFacility(&sheets), &cfg).unwrap();
        let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(
            wb.sheet_names(),
            vec![
                "목차".to_string(),
                "Facility A".to_string(),
                "Facility B".to_string()
            ]
        );

        let index = wb.worksheet_range("목차").unwrap();
        assert_eq!(
            index.get_value((0, 0)),
            Some(&Data::String("요양원 청구 리스트".into()))
        );
        assert_eq!(
            index.get_value((2, 0)),
            Some(&Data::String("Facility A".into()))
        );
        assert_eq!(
            index.get_value((3, 0)),
            Some(&Data::String("Facility B".into()))
        );

        let a = wb.worksheet_range("Facility A").unwrap();
        assert_eq!(a.get_value((4, 0)), Some(&Data::String("합계".into())));
        let data_sum: f64 = (1..=3).map(|r| number(a.get_value((r, 2)))).sum();
        assert_eq!(number(a.get_value((4, 2))), data_sum);
        assert_eq!(number(a.get_value((4, 1))), 144.0);

        let formulas = wb.worksheet_formula("Facility A").unwrap();
        let f = formulas.get_value((4, 2)).cloned().unwrap_or_default();
        assert!(f.contains("SUM(C2:C4)"), "formula was {f}");
        let f = formulas.get_value((4, 1)).cloned().unwrap_or_default();
        assert!(f.contains("SUM(B2:B4)"), "formula was {f}");
    }

    #[test]
    fn empty_facility_list_is_rejected() {
        let err = export_facilities(&[], &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, ExportError::Empty(_)));
    }

    #[test]
    fn colliding_facility_names_still_export() {
        let long_a = format!("{}A", "요양원".repeat(11));
        let long_b = format!("{}B", "요양원".repeat(11));
        let sheets = vec![
            (long_a, table(&[("Kim", 1.0, 2.0)])),
            (long_b, table(&[("Lee", 1.0, 2.0)])),
        ];
        let bytes = export_facilities(&sheets, &ExportConfig::default()).unwrap();
        let wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        let names = wb.sheet_names();
        assert_eq!(names.len(), 3);
        assert_ne!(names[1], names[2]);
        assert!(names.iter().all(|n| n.chars().count() <= 31));
    }

    #[test]
    fn index_links_target_each_sheet_and_opens_first() {
        let long_a = format!("{}A", "요양원".repeat(11));
        let long_b = format!("{}B", "요양원".repeat(11));
        let sheets = vec![
            ("Facility A".to_string(), table(&[("Kim", 1.0, 2.0)])),
            (long_a, table(&[("Lee", 1.0, 2.0)])),
            (long_b, table(&[("Park", 1.0, 2.0)])),
        ];
        let bytes = export_facilities(&sheets, &ExportConfig::default()).unwrap();
        let wb = open_workbook_auto_from_rs(Cursor::new(bytes.clone())).unwrap();
        let names = wb.sheet_names();
        assert!(names[3].ends_with("~2"));

        let index = xml_part(&bytes, "xl/worksheets/sheet1.xml");
        for sheet in &names[1..] {
            let target = format!("location=\"'{}'!A1\"", sheet);
            assert!(index.contains(&target), "missing link {target}");
        }
        assert!(index.contains("tabSelected=\"1\""));
        for part in ["xl/worksheets/sheet2.xml", "xl/worksheets/sheet4.xml"] {
            assert!(!xml_part(&bytes, part).contains("tabSelected=\"1\""));
        }
    }
}
