//! Store registration.

use super::{CliError, Target};
use docshelf_core::{IndexDefinition, SchemaBuilder, StoreDefinition};
use tracing::info;

/// Parses an index argument of the form `NAME:PATH` or `NAME:PATH:unique`.
pub fn parse_index(arg: &str) -> Result<IndexDefinition, CliError> {
    let mut parts = arg.split(':');
    let (Some(name), Some(path)) = (parts.next(), parts.next()) else {
        return Err(CliError::Usage(format!(
            "index {arg:?} must look like NAME:PATH[:unique]"
        )));
    };
    let unique = match parts.next() {
        None => false,
        Some("unique") => true,
        Some(flag) => {
            return Err(CliError::Usage(format!("unknown index flag {flag:?}")));
        }
    };
    if parts.next().is_some() || name.is_empty() {
        return Err(CliError::Usage(format!(
            "index {arg:?} must look like NAME:PATH[:unique]"
        )));
    }
    let mut index = IndexDefinition::new(name, path)?;
    index.unique = unique;
    Ok(index)
}

/// Builds the store definition described by the command line.
pub fn definition(
    key: &str,
    auto_increment: bool,
    indexes: &[String],
) -> Result<StoreDefinition, CliError> {
    let mut def = StoreDefinition::new(key)?.auto_increment(auto_increment);
    for arg in indexes {
        def = def.with_index(parse_index(arg)?)?;
    }
    Ok(def)
}

/// Opens the database with `store` registered, creating what is missing.
pub fn ensure(
    target: &Target,
    store: &str,
    key: &str,
    auto_increment: bool,
    indexes: &[String],
) -> Result<(), CliError> {
    let schema = SchemaBuilder::new().with_store(store, definition(key, auto_increment, indexes)?);
    let engine = target.open_with(schema)?;
    for op in engine.applied_migrations() {
        info!(?op, "applied migration");
    }
    let names = engine.index_names(store)?;
    println!(
        "store {store} ready at version {} with indexes: {}",
        engine.version(),
        names.join(", ")
    );
    engine.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_index_arguments() {
        let plain = parse_index("email:contact.email").unwrap();
        assert_eq!(plain.name, "email");
        assert_eq!(plain.key_path.as_str(), "contact.email");
        assert!(!plain.unique);

        assert!(parse_index("email:email:unique").unwrap().unique);
    }

    #[test]
    fn rejects_malformed_index_arguments() {
        for arg in ["email", ":email", "email:email:sorted", "a:b:unique:x"] {
            assert!(parse_index(arg).is_err(), "{arg} should be rejected");
        }
        assert!(matches!(parse_index("email:"), Err(CliError::Core(_))));
    }

    #[test]
    fn builds_definitions() {
        let def = definition("id", true, &["email:email:unique".to_string()]).unwrap();
        assert!(def.auto_increment);
        assert!(def.find_index("email").unwrap().unique);

        let duplicate = ["a:x".to_string(), "a:y".to_string()];
        assert!(definition("id", false, &duplicate).is_err());
    }
}
