pub mod xlsx_export;

pub use xlsx_export::{export, export_facilities, export_table, sheet_name_for, ExportTables};
