use std::io;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};

use carehome_billing::config::AppConfig;
use carehome_billing::display;
use carehome_billing::logging::init_logging;
use carehome_billing::matching::PromptCollector;
use carehome_billing::orchestrator::summary::RunSummary;
use carehome_billing::orchestrator::{
    associations_workbook, facilities_workbook, invoice_workbook, load_inputs,
    reconciled_or_save_associations, reconciled_workbook, write_outputs, OutputFile,
};

mod cli;

use cli::{Cli, Command};

fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg: AppConfig = cli.to_app_config()?;
    let args = cli.command.run_args();

    let inputs = load_inputs(&args.records, &args.reference, &cfg)?;
    let summary = RunSummary::new(inputs.records.len(), inputs.references.len());
    let mut session = inputs.into_session(&cfg);
    let summary = summary.with_auto_matched(&session);

    if args.manual && !session.is_fully_resolved() {
        let stdin = io::stdin();
        let mut collector = PromptCollector::new(stdin.lock(), io::stdout());
        session.resolve_with(&mut collector)?;
    }
    if args.exclude_unresolved {
        session.exclude_unresolved();
    } else if !session.is_fully_resolved() {
        for entry in session.unmatched() {
            warn!("unmatched: row {} {}", entry.row, entry.label());
        }
    }

    let out_dir = Cli::out_dir(&cfg);
    let today = chrono::Local::now().date_naive();
    let associations = associations_workbook(&session, today, &cfg)?;
    let table = reconciled_or_save_associations(&session, associations.as_ref(), &out_dir)?;
    let mut files: Vec<OutputFile> = Vec::new();
    match &cli.command {
        Command::Reconcile(_) => files.push(reconciled_workbook(&table, &cfg)?),
        Command::Invoice { facility, view, .. } => {
            info!("building {} invoice for {}", view, facility);
            files.push(invoice_workbook(&table, facility, (*view).into(), &cfg)?);
        }
        Command::Facilities(_) => files.push(facilities_workbook(&table, &cfg)?),
    }
    files.extend(associations);

    let written = write_outputs(&out_dir, &files)?;
    let summary = files
        .iter()
        .fold(
            summary
                .with_session(&session)
                .with_facilities(display::facilities(&table).len()),
            |s, f| s.with_output(&f.file_name),
        )
        .finish();
    summary.log();
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
