//! Verify command implementation.

use super::{CliError, Target};
use docshelf_core::VerifyReport;

/// Runs the verify command.
pub fn run(target: &Target) -> Result<(), CliError> {
    let engine = target.open()?;
    if let Some(path) = engine.path() {
        println!("Verifying database at {}", path.display());
        println!();
    }
    let report = engine.verify()?;
    print_report(&report);

    println!();
    if report.is_ok() {
        println!("✓ Database verification passed");
        Ok(())
    } else {
        println!("✗ Database verification failed");
        Err(CliError::Usage(format!(
            "{} problems found",
            report.problems.len()
        )))
    }
}

fn print_report(report: &VerifyReport) {
    println!(
        "  stores: {}, records: {}, index entries: {}",
        report.stores, report.records, report.index_entries
    );
    println!(
        "  live keys: {}, log bytes: {}",
        report.live_keys, report.log_bytes
    );
    for problem in &report.problems {
        println!("    ERROR: {problem}");
    }
}
