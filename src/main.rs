//! ctree - catalog hierarchy keeper

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = catalog_tree::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
