use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to open workbook {source_name}: {reason}")]
    Open { source_name: String, reason: String },
    #[error("workbook {source_name} has no worksheets")]
    NoWorksheet { source_name: String },
    #[error("{table} table is missing required column(s): {}", columns.join(", "))]
    MissingColumns {
        table: &'static str,
        columns: Vec<String>,
    },
    #[error("{table} table row {row}: column '{column}' value '{value}' is not a number")]
    InvalidNumber {
        table: &'static str,
        row: usize,
        column: String,
        value: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("{count} record(s) still have no facility (first at row {first_row})")]
    Unresolved { count: usize, first_row: usize },
    #[error("no record with entry id {0}")]
    UnknownEntry(usize),
    #[error("entry {0} already has a facility")]
    AlreadyResolved(usize),
    #[error("facility name for entry {0} is blank")]
    EmptyFacility(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("no records for facility '{0}'")]
    UnknownFacility(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("xlsx export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("nothing to export: {0}")]
    Empty(&'static str),
}
