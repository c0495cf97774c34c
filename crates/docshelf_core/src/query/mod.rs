//! Query engine: range scans with offset paging, and substring scans.
//!
//! Range filters walk a native ordered range, skip `offset` entries and
//! take `rows`. Substring filters walk the whole source and page over the
//! matches rather than over the entries.

mod filter;
mod range;

pub use filter::{FilterKind, PageOptions, QueryFilter};
pub use range::KeyRange;

use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;
use crate::transaction::{CursorEntry, ReadTransaction};
use docshelf_codec::Value;

pub(crate) fn execute(
    txn: &ReadTransaction<'_>,
    store: &str,
    filter: &QueryFilter,
    index: Option<&str>,
    page: PageOptions,
) -> CoreResult<Vec<Value>> {
    page.validate()?;
    let results = match filter.to_range()? {
        Some(range) => {
            let mut cursor = txn.cursor(store, index, &range)?;
            cursor.advance(page.offset());
            cursor
                .take(page.limit())
                .map(|entry| entry.map(|e| e.value))
                .collect::<CoreResult<Vec<_>>>()?
        }
        None => {
            let QueryFilter::Substring { value, field } = filter else {
                return Err(CoreError::invalid_filter("filter has no key range"));
            };
            let field = field.as_deref().map(KeyPath::parse).transpose().map_err(|_| {
                CoreError::invalid_filter(format!("bad substring field {field:?}"))
            })?;
            let needle = value.to_lowercase();
            let cursor = txn.cursor(store, index, &KeyRange::all())?;
            let mut skipped = 0;
            let mut page_rows = Vec::new();
            for entry in cursor {
                let entry = entry?;
                if !matches_substring(&entry, field.as_ref(), &needle) {
                    continue;
                }
                if skipped < page.offset() {
                    skipped += 1;
                    continue;
                }
                page_rows.push(entry.value);
                if page_rows.len() >= page.limit() {
                    break;
                }
            }
            page_rows
        }
    };
    tracing::debug!(
        store,
        index = index.unwrap_or("<primary>"),
        filter = %filter.kind(),
        page = page.page,
        rows = results.len(),
        "query"
    );
    Ok(results)
}

/// Tests the record field when one is named, else the source key (the
/// index key on index cursors, the primary key otherwise). A missing
/// field reads as empty text.
fn matches_substring(entry: &CursorEntry, field: Option<&KeyPath>, needle: &str) -> bool {
    let haystack = match field {
        Some(path) => path
            .extract(&entry.value)
            .map(ToString::to_string)
            .unwrap_or_default(),
        None => entry.key.to_string(),
    };
    haystack.to_lowercase().contains(needle)
}
