//! Compact command implementation.

use super::{CliError, Target};
use docshelf_core::{CompactionReport, Engine, SchemaBuilder};
use tracing::info;

/// Rewrites the commit log to hold only live data and prints the savings.
pub fn run(target: &Target) -> Result<(), CliError> {
    // Open without automatic compaction so the report covers the whole log.
    let config = target.config()?.auto_compact(None);
    let engine = Engine::open(config, SchemaBuilder::new())?;
    if let Some(path) = engine.path() {
        println!("Compacting database at {}", path.display());
        println!();
    }

    let report = engine.compact()?;
    info!(reclaimed = report.reclaimed(), "compaction finished");
    print_report(&report);
    engine.close()?;
    Ok(())
}

fn print_report(report: &CompactionReport) {
    println!("  Size before: {} bytes", report.bytes_before);
    println!("  Size after:  {} bytes", report.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        report.reclaimed(),
        percent(report.reclaimed(), report.bytes_before)
    );
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
