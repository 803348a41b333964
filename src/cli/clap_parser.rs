use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use carehome_billing::config::AppConfig;
use carehome_billing::display::ViewMode;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, ValueEnum, Debug)]
pub enum ViewOpt {
    Flat,
    Pivot,
}

impl ViewOpt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Pivot => "pivot",
        }
    }
}

impl std::fmt::Display for ViewOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ViewOpt> for ViewMode {
    fn from(v: ViewOpt) -> Self {
        match v {
            ViewOpt::Flat => ViewMode::Flat,
            ViewOpt::Pivot => ViewMode::Pivot,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "carehome_billing",
    version,
    about = "Match care-home visits to facilities and build billing workbooks",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// JSON config file (env: CAREHOME_BILLING_CONFIG)
    #[arg(long, global = true, value_name = "FILE", env = "CAREHOME_BILLING_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

/// Inputs and resolution options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Visit records workbook
    #[arg(long, value_name = "XLSX")]
    pub records: PathBuf,
    /// Facility reference workbook
    #[arg(long, value_name = "XLSX")]
    pub reference: PathBuf,
    /// Output directory (default: export.out_dir from the config, else ".")
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
    /// Prompt on stdin for the facility of each unmatched record
    #[arg(long)]
    pub manual: bool,
    /// Leave records that are still unmatched out of every output
    #[arg(long = "exclude-unresolved")]
    pub exclude_unresolved: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the reconciled full table
    Reconcile(RunArgs),
    /// Write the invoice of one facility
    Invoice {
        #[command(flatten)]
        run: RunArgs,
        /// Facility name as it appears in the reference
        #[arg(long, value_name = "NAME")]
        facility: String,
        #[arg(long, value_enum, default_value_t = ViewOpt::Flat)]
        view: ViewOpt,
    },
    /// Write one workbook with a sheet per facility
    Facilities(RunArgs),
}

impl Command {
    pub fn run_args(&self) -> &RunArgs {
        match self {
            Self::Reconcile(run) | Self::Facilities(run) => run,
            Self::Invoice { run, .. } => run,
        }
    }
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn to_app_config(&self) -> Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => AppConfig::from_json_file(&path.to_string_lossy())?,
            None => AppConfig::default(),
        };
        if let Some(dir) = &self.command.run_args().out_dir {
            cfg.export.out_dir = Some(dir.to_string_lossy().into_owned());
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn out_dir(cfg: &AppConfig) -> PathBuf {
        cfg.export
            .out_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_invoice_with_view() {
        let cli = Cli::try_parse_from([
            "carehome_billing",
            "invoice",
            "--records",
            "r.xlsx",
            "--reference",
            "ref.xlsx",
            "--facility",
            "행복요양원",
            "--view",
            "pivot",
            "--manual",
        ])
        .unwrap();
        match &cli.command {
            Command::Invoice { run, facility, view } => {
                assert_eq!(facility, "행복요양원");
                assert_eq!(*view, ViewOpt::Pivot);
                assert!(run.manual);
                assert!(!run.exclude_unresolved);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn out_dir_flag_overrides_config() {
        let cli = Cli::try_parse_from([
            "carehome_billing",
            "facilities",
            "--records",
            "r.xlsx",
            "--reference",
            "ref.xlsx",
            "--out-dir",
            "out",
        ])
        .unwrap();
        let cfg = cli.to_app_config().unwrap();
        assert_eq!(Cli::out_dir(&cfg), PathBuf::from("out"));
    }

    #[test]
    fn reference_is_required() {
        assert!(Cli::try_parse_from(["carehome_billing", "reconcile", "--records", "r.xlsx"]).is_err());
    }
}
