//! Command-line surface of the `carehome_billing` binary.

mod clap_parser;

pub use clap_parser::{Cli, Command};
