//! Record commands: put, get, delete and clear.

use super::{parse_key, parse_value, print_record, CliError, Target};
use tracing::info;

/// Inserts or replaces a record and prints its key.
pub fn put(target: &Target, store: &str, record: &str) -> Result<(), CliError> {
    let record = parse_value(record)?;
    let engine = target.open()?;
    let key = engine.put(store, record)?;
    println!("{key}");
    engine.close()?;
    Ok(())
}

/// Prints one record, or reports that it does not exist.
pub fn get(target: &Target, store: &str, key: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let engine = target.open()?;
    match engine.get(store, &key)? {
        Some(record) => print_record(&record),
        None => Err(CliError::Usage(format!("no record with key {key} in {store}"))),
    }
}

/// Deletes one record. Deleting a missing record is not an error.
pub fn delete(target: &Target, store: &str, key: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let engine = target.open()?;
    engine.delete(store, &key)?;
    info!(store, key = %key, "deleted record");
    engine.close()?;
    Ok(())
}

/// Deletes every record of a store.
pub fn clear(target: &Target, store: &str) -> Result<(), CliError> {
    let engine = target.open()?;
    let before = engine.count(store)?;
    engine.clear(store)?;
    info!(store, records = before, "cleared store");
    println!("removed {before} records from {store}");
    engine.close()?;
    Ok(())
}
