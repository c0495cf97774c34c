//! Physical keyspace layout.
//!
//! ```text
//! 0x00 "catalog"                                         -> catalog (CBOR)
//! 0x01 | store u32be | enc(pk)                           -> record (CBOR)
//! 0x02 | store u32be | index u32be | enc(ikey) | enc(pk) -> enc(pk)
//! 0x03 | store u32be                                     -> generator u64be
//! ```
//!
//! Encoded keys never start with `0xFF`, so `prefix ++ [0xFF]` bounds
//! everything stored under a prefix.

use crate::error::{CoreError, CoreResult};
use crate::key::{decode_key, encode_key_into, Key};
use crate::kv::ByteRange;
use crate::types::{IndexId, StoreId};
use std::ops::Bound;

/// Key of the catalog.
pub const CATALOG_KEY: &[u8] = b"\x00catalog";

const TAG_RECORD: u8 = 0x01;
const TAG_INDEX: u8 = 0x02;
const TAG_GENERATOR: u8 = 0x03;
const PAST_END: u8 = 0xFF;

/// Prefix of every record of `store`.
#[must_use]
pub fn record_prefix(store: StoreId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.push(TAG_RECORD);
    key.extend_from_slice(&store.as_u32().to_be_bytes());
    key
}

/// Physical key of one record.
#[must_use]
pub fn record_key(store: StoreId, pk: &Key) -> Vec<u8> {
    let mut key = record_prefix(store);
    encode_key_into(pk, &mut key);
    key
}

/// Prefix of every entry of one index.
#[must_use]
pub fn index_prefix(store: StoreId, index: IndexId) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.push(TAG_INDEX);
    key.extend_from_slice(&store.as_u32().to_be_bytes());
    key.extend_from_slice(&index.as_u32().to_be_bytes());
    key
}

/// Prefix of the entries of one index that share `index_key`.
#[must_use]
pub fn index_key_prefix(store: StoreId, index: IndexId, index_key: &Key) -> Vec<u8> {
    let mut key = index_prefix(store, index);
    encode_key_into(index_key, &mut key);
    key
}

/// Physical key of one index entry.
#[must_use]
pub fn index_entry_key(store: StoreId, index: IndexId, index_key: &Key, pk: &Key) -> Vec<u8> {
    let mut key = index_key_prefix(store, index, index_key);
    encode_key_into(pk, &mut key);
    key
}

/// Physical key of the auto-increment generator of `store`.
#[must_use]
pub fn generator_key(store: StoreId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(TAG_GENERATOR);
    key.extend_from_slice(&store.as_u32().to_be_bytes());
    key
}

/// Exclusive upper bound of everything under `prefix`.
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    end.push(PAST_END);
    end
}

/// Byte range covering every key under `prefix`.
#[must_use]
pub fn prefix_range(prefix: &[u8]) -> ByteRange {
    (Bound::Included(prefix.to_vec()), Bound::Excluded(prefix_end(prefix)))
}

/// Translates key bounds into a byte range under `prefix`.
///
/// Entries under `prefix` are `enc(k)` optionally followed by more encoded
/// keys, so inclusive bounds must reach past the whole group sharing `k`.
#[must_use]
pub fn key_range(prefix: &[u8], lower: Bound<&Key>, upper: Bound<&Key>) -> ByteRange {
    let at = |key: &Key| {
        let mut bytes = prefix.to_vec();
        encode_key_into(key, &mut bytes);
        bytes
    };
    let lower = match lower {
        Bound::Included(k) => Bound::Included(at(k)),
        Bound::Excluded(k) => Bound::Included(prefix_end(&at(k))),
        Bound::Unbounded => Bound::Included(prefix.to_vec()),
    };
    let upper = match upper {
        Bound::Included(k) => Bound::Excluded(prefix_end(&at(k))),
        Bound::Excluded(k) => Bound::Excluded(at(k)),
        Bound::Unbounded => Bound::Excluded(prefix_end(prefix)),
    };
    (lower, upper)
}

/// Decodes the primary key from a record key.
pub fn decode_record_key(physical: &[u8]) -> CoreResult<Key> {
    let body = physical
        .get(5..)
        .filter(|_| physical.first() == Some(&TAG_RECORD))
        .ok_or_else(|| CoreError::invalid_record("not a record key"))?;
    Ok(decode_key(body)?.0)
}

/// Decodes `(index key, primary key)` from an index entry key.
pub fn decode_index_entry(physical: &[u8]) -> CoreResult<(Key, Key)> {
    let body = physical
        .get(9..)
        .filter(|_| physical.first() == Some(&TAG_INDEX))
        .ok_or_else(|| CoreError::invalid_record("not an index entry key"))?;
    let (index_key, used) = decode_key(body)?;
    let (pk, _) = decode_key(&body[used..])?;
    Ok((index_key, pk))
}

/// Decodes a stored generator value.
pub fn decode_generator(bytes: &[u8]) -> CoreResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| CoreError::invalid_record("generator value is not 8 bytes"))?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::OrderedKv;
    use crate::log::LogBatch;
    use docshelf_storage::InMemoryBackend;

    const STORE: StoreId = StoreId(1);
    const INDEX: IndexId = IndexId(4);

    fn indexed(entries: &[(i64, &str)]) -> OrderedKv {
        let mut kv = OrderedKv::open(Box::new(InMemoryBackend::new()), false).unwrap();
        let mut batch = LogBatch::new();
        for (ikey, pk) in entries {
            let pk = Key::from(*pk);
            batch.put(
                index_entry_key(STORE, INDEX, &Key::from(*ikey), &pk),
                crate::key::encode_key(&pk),
            );
        }
        // Neighbours that must never leak into a scan.
        batch.put(index_prefix(STORE, IndexId(3)), vec![]);
        batch.put(prefix_end(&index_prefix(STORE, INDEX)), vec![]);
        kv.commit(&batch).unwrap();
        kv
    }

    fn scan(kv: &OrderedKv, lower: Bound<&Key>, upper: Bound<&Key>) -> Vec<String> {
        kv.range(key_range(&index_prefix(STORE, INDEX), lower, upper))
            .map(|(k, _)| decode_index_entry(k).unwrap().1.to_string())
            .collect()
    }

    #[test]
    fn inclusive_bounds_cover_duplicates() {
        let kv = indexed(&[(1, "a"), (2, "b"), (2, "c"), (3, "d")]);
        let two = Key::from(2);
        assert_eq!(
            scan(&kv, Bound::Included(&two), Bound::Included(&two)),
            vec!["b", "c"]
        );
    }

    #[test]
    fn exclusive_bounds_skip_duplicates() {
        let kv = indexed(&[(1, "a"), (2, "b"), (2, "c"), (3, "d")]);
        let two = Key::from(2);
        assert_eq!(scan(&kv, Bound::Excluded(&two), Bound::Unbounded), vec!["d"]);
        assert_eq!(scan(&kv, Bound::Unbounded, Bound::Excluded(&two)), vec!["a"]);
    }

    #[test]
    fn unbounded_stays_inside_prefix() {
        let kv = indexed(&[(1, "a"), (3, "d")]);
        assert_eq!(scan(&kv, Bound::Unbounded, Bound::Unbounded), vec!["a", "d"]);
    }

    #[test]
    fn record_key_decodes() {
        let pk = Key::from("user-7");
        let physical = record_key(STORE, &pk);
        assert!(physical.starts_with(&record_prefix(STORE)));
        assert_eq!(decode_record_key(&physical).unwrap(), pk);
    }

    #[test]
    fn index_entry_decodes() {
        let physical = index_entry_key(STORE, INDEX, &Key::from("ana@x.com"), &Key::from(9));
        let (ikey, pk) = decode_index_entry(&physical).unwrap();
        assert_eq!(ikey, Key::from("ana@x.com"));
        assert_eq!(pk, Key::from(9));
        assert!(decode_index_entry(&record_key(STORE, &pk)).is_err());
    }

    #[test]
    fn generator_bytes() {
        assert_eq!(decode_generator(&42u64.to_be_bytes()).unwrap(), 42);
        assert!(decode_generator(&[1, 2]).is_err());
        assert_eq!(generator_key(STORE), vec![0x03, 0, 0, 0, 1]);
    }
}
