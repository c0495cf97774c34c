//! Inspect command implementation.

use super::{CliError, Target};
use docshelf_core::{Engine, StoreSummary};
use serde::Serialize;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database directory.
    pub path: String,
    /// Database name.
    pub name: String,
    /// Stored schema version.
    pub version: u32,
    /// Commit log size in bytes.
    pub log_size: u64,
    /// Live keys in the ordered keyspace.
    pub live_keys: usize,
    /// Per-store details.
    pub stores: Vec<StoreInfo>,
}

/// One store of the catalog.
#[derive(Debug, Serialize)]
pub struct StoreInfo {
    /// Store name.
    pub name: String,
    /// Primary key path.
    pub key_path: String,
    /// Whether keys are generated.
    pub auto_increment: bool,
    /// Number of records.
    pub records: usize,
    /// Secondary indexes.
    pub indexes: Vec<IndexInfo>,
}

/// One index of a store.
#[derive(Debug, Serialize)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Indexed key path.
    pub key_path: String,
    /// Whether the index is unique.
    pub unique: bool,
    /// Number of index entries.
    pub entries: usize,
}

impl From<StoreSummary> for StoreInfo {
    fn from(summary: StoreSummary) -> Self {
        Self {
            name: summary.name,
            key_path: summary.key_path,
            auto_increment: summary.auto_increment,
            records: summary.records,
            indexes: summary
                .indexes
                .into_iter()
                .map(|i| IndexInfo {
                    name: i.name,
                    key_path: i.key_path,
                    unique: i.unique,
                    entries: i.entries,
                })
                .collect(),
        }
    }
}

/// Runs the inspect command.
pub fn run(target: &Target, format: &str) -> Result<(), CliError> {
    let engine = target.open()?;
    let result = collect(&engine)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text_output(&result),
        other => return Err(CliError::Usage(format!("unknown format {other:?}"))),
    }
    Ok(())
}

/// Gathers the inspection result from an open engine.
pub fn collect(engine: &Engine) -> Result<InspectResult, CliError> {
    let report = engine.verify()?;
    Ok(InspectResult {
        path: engine
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(in memory)".to_string()),
        name: engine.config().name.clone(),
        version: engine.version(),
        log_size: report.log_bytes,
        live_keys: report.live_keys,
        stores: engine.summary()?.into_iter().map(StoreInfo::from).collect(),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("docshelf Database Inspection");
    println!("============================");
    println!();
    println!("Path:    {}", result.path);
    println!("Name:    {}", result.name);
    println!("Version: {}", result.version);
    println!();
    println!("Storage:");
    println!("  Log size:  {}", format_size(result.log_size));
    println!("  Live keys: {}", result.live_keys);

    println!();
    if result.stores.is_empty() {
        println!("No stores.");
        return;
    }
    println!("Stores:");
    for store in &result.stores {
        let generated = if store.auto_increment {
            ", auto-increment"
        } else {
            ""
        };
        println!(
            "  {} (key {}{}): {} records",
            store.name, store.key_path, generated, store.records
        );
        for index in &store.indexes {
            let unique = if index.unique { " unique" } else { "" };
            println!(
                "    index {} on {}{}: {} entries",
                index.name, index.key_path, unique, index.entries
            );
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_codec::Value;
    use docshelf_core::{SchemaBuilder, StoreDefinition};

    #[test]
    fn collects_store_details() {
        let schema = SchemaBuilder::new().with_store(
            "users",
            StoreDefinition::new("id")
                .unwrap()
                .unique_index("email", "email")
                .unwrap(),
        );
        let engine = Engine::open_in_memory(schema).unwrap();
        engine
            .put(
                "users",
                Value::map([("id", Value::from("1")), ("email", Value::from("a@x"))]),
            )
            .unwrap();

        let result = collect(&engine).unwrap();
        assert_eq!(result.path, "(in memory)");
        assert_eq!(result.stores.len(), 1);
        let users = &result.stores[0];
        assert_eq!(users.records, 1);
        let email = users.indexes.iter().find(|i| i.name == "email").unwrap();
        assert!(email.unique);
        assert_eq!(email.entries, 1);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stores"][0]["name"], "users");
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(10), "10 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
