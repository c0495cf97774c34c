//! Query and search commands.

use super::{parse_value, print_record, CliError, Target};
use docshelf_codec::Value;
use docshelf_core::{FilterKind, PageOptions, QueryFilter};

/// Arguments of the query command.
#[derive(Debug)]
pub struct QueryRequest<'a> {
    /// Filter kind name.
    pub filter: &'a str,
    /// Filter value as JSON.
    pub value: &'a str,
    /// Field for substring filters.
    pub field: Option<String>,
    /// Index to query.
    pub index: Option<&'a str>,
    /// Page number.
    pub page: Option<u32>,
    /// Rows per page.
    pub rows: Option<u32>,
}

impl QueryRequest<'_> {
    /// Builds the engine filter.
    ///
    /// Substring values that are not JSON are taken as bare text.
    pub fn to_filter(&self) -> Result<QueryFilter, CliError> {
        let kind = FilterKind::parse(self.filter)
            .ok_or_else(|| CliError::Usage(format!("unknown filter {:?}", self.filter)))?;
        let value = match (kind, parse_value(self.value)) {
            (_, Ok(value)) => value,
            (FilterKind::Substring, Err(_)) => Value::from(self.value),
            (_, Err(err)) => return Err(err),
        };
        if self.field.is_some() && kind != FilterKind::Substring {
            return Err(CliError::Usage(
                "--field only applies to substring filters".into(),
            ));
        }
        Ok(QueryFilter::from_kind(kind, value, self.field.clone()))
    }

    fn page(&self, default_rows: u32) -> Option<PageOptions> {
        match (self.page, self.rows) {
            (None, None) => None,
            (page, rows) => Some(PageOptions::new(
                page.unwrap_or(1),
                rows.unwrap_or(default_rows),
            )),
        }
    }
}

/// Runs a filter and prints the matching page as a JSON array.
pub fn query(target: &Target, store: &str, request: QueryRequest<'_>) -> Result<(), CliError> {
    let filter = request.to_filter()?;
    let engine = target.open()?;
    let page = request.page(engine.config().default_rows);
    let rows = engine.query(store, filter, request.index, page)?;
    print_record(&Value::Array(rows))
}

/// Runs a full-text search and prints the matching page as a JSON array.
pub fn search(
    target: &Target,
    store: &str,
    text: &str,
    page: Option<u32>,
    rows: Option<u32>,
) -> Result<(), CliError> {
    let engine = target.open()?;
    let hits = engine.search(store, text, page, rows)?;
    print_record(&Value::Array(hits))
}
