use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::export::xlsx_export::{SHEET_NAME_FORBIDDEN, SHEET_NAME_MAX};

/// Column headers as they appear in the two input sheets.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ColumnNames {
    pub name: String,
    pub national_id: String,
    pub visit_date: String,
    pub billed_total: String,
    pub covered_amount: String,
    pub uncovered_amount: String,
    pub facility_name: String,
    /// Pre-concatenated name + national ID column some reference sheets carry instead of the pair.
    pub combined_key: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            name: "고객이름".into(),
            national_id: "주민등록번호".into(),
            visit_date: "내방일".into(),
            billed_total: "계".into(),
            covered_amount: "요양급여액".into(),
            uncovered_amount: "비급여액".into(),
            facility_name: "요양원명".into(),
            combined_key: "고객이름+주민등록번호".into(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MatchingConfig {
    /// National ID characters appended to the name to form the match key.
    pub key_id_prefix_len: usize,
    /// National ID characters shown after duplicate display names.
    pub display_id_prefix_len: usize,
    /// Numeric ID cells are zero-padded back to this width; `None` disables padding.
    pub national_id_width: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            key_id_prefix_len: 6,
            display_id_prefix_len: 2,
            national_id_width: Some(13),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct DisplayConfig {
    pub date_header: String,
    pub display_name_header: String,
    pub pivot_total_header: String,
    /// chrono format string for visit dates, e.g. "06월2일".
    pub date_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_header: "날짜".into(),
            display_name_header: "표시이름".into(),
            pivot_total_header: "합계".into(),
            date_format: "%m월%-d일".into(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ExportConfig {
    pub invoice_sheet_name: String,
    pub index_sheet_name: String,
    pub index_title: String,
    pub totals_label: String,
    /// Headers of the columns that get a SUM formula in the totals row.
    pub total_columns: Vec<String>,
    pub reconciled_sheet_name: String,
    pub associations_sheet_name: String,
    pub out_dir: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            invoice_sheet_name: "청구서".into(),
            index_sheet_name: "목차".into(),
            index_title: "요양원 청구 리스트".into(),
            totals_label: "합계".into(),
            total_columns: vec!["요양급여액".into(), "계".into()],
            reconciled_sheet_name: "전체리스트".into(),
            associations_sheet_name: "신규요양원".into(),
            out_dir: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub columns: ColumnNames,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

fn check_sheet_name(field: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    if name.chars().count() > SHEET_NAME_MAX {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("'{}' is longer than {} characters", name, SHEET_NAME_MAX),
        });
    }
    if name.contains(SHEET_NAME_FORBIDDEN) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("'{}' contains a character not allowed in sheet names", name),
        });
    }
    Ok(())
}

fn check_not_blank(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    Ok(())
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.columns;
        check_not_blank("columns.name", &c.name)?;
        check_not_blank("columns.national_id", &c.national_id)?;
        check_not_blank("columns.visit_date", &c.visit_date)?;
        check_not_blank("columns.billed_total", &c.billed_total)?;
        check_not_blank("columns.covered_amount", &c.covered_amount)?;
        check_not_blank("columns.uncovered_amount", &c.uncovered_amount)?;
        check_not_blank("columns.facility_name", &c.facility_name)?;

        if self.matching.key_id_prefix_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.key_id_prefix_len",
                reason: "must be > 0".into(),
            });
        }
        if self.matching.display_id_prefix_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "matching.display_id_prefix_len",
                reason: "must be > 0".into(),
            });
        }
        if let Some(width) = self.matching.national_id_width {
            if width < self.matching.key_id_prefix_len {
                return Err(ConfigError::InvalidValue {
                    field: "matching.national_id_width",
                    reason: format!(
                        "{} is shorter than the key prefix ({})",
                        width, self.matching.key_id_prefix_len
                    ),
                });
            }
        }

        check_not_blank("display.date_format", &self.display.date_format)?;
        check_not_blank("display.pivot_total_header", &self.display.pivot_total_header)?;

        let e = &self.export;
        check_sheet_name("export.invoice_sheet_name", &e.invoice_sheet_name)?;
        check_sheet_name("export.index_sheet_name", &e.index_sheet_name)?;
        check_sheet_name("export.reconciled_sheet_name", &e.reconciled_sheet_name)?;
        check_sheet_name("export.associations_sheet_name", &e.associations_sheet_name)?;
        check_not_blank("export.totals_label", &e.totals_label)?;
        Ok(())
    }

    /// Load a JSON config file; absent sections fall back to their defaults.
    pub fn from_json_file(path: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path))?;
        let cfg: AppConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
