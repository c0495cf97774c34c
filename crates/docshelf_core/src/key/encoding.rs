//! Order-preserving binary encoding of keys.
//!
//! Encoded keys compare bytewise in the same order as [`Key`] values, and
//! every encoding is self-delimiting: it can be decoded from the front of a
//! longer buffer, and appending more encoded keys never changes how two
//! buffers compare. Composite physical keys (`index key ++ primary key`)
//! rely on both.
//!
//! A string encoding can be a prefix of a longer string's encoding only when
//! the longer one continues with `0xFF`. Since no tag is `0xFF`, a bound of
//! `enc(k) ++ [0xFF]` sits after every composite key starting with `k` and
//! before every key greater than `k`.
//!
//! Layout:
//!
//! | Kind   | Tag    | Body                                                |
//! |--------|--------|-----------------------------------------------------|
//! | Number | `0x10` | 8 bytes, IEEE-754 bits flipped to sort as unsigned   |
//! | Text   | `0x20` | UTF-8, `0x00` escaped as `0x00 0xFF`, then `0x00`    |
//! | Bytes  | `0x30` | raw, `0x00` escaped as `0x00 0xFF`, then `0x00`      |
//! | Array  | `0x40` | encoded elements, then `0x00`                        |

use super::Key;
use crate::error::{CoreError, CoreResult};

const TAG_END: u8 = 0x00;
const TAG_NUMBER: u8 = 0x10;
const TAG_TEXT: u8 = 0x20;
const TAG_BYTES: u8 = 0x30;
const TAG_ARRAY: u8 = 0x40;
const ESCAPE: u8 = 0xFF;

/// Encodes a key into a fresh buffer.
#[must_use]
pub fn encode_key(key: &Key) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    encode_key_into(key, &mut out);
    out
}

/// Appends the encoding of `key` to `out`.
pub fn encode_key_into(key: &Key, out: &mut Vec<u8>) {
    match key {
        Key::Number(n) => {
            out.push(TAG_NUMBER);
            out.extend_from_slice(&number_bits(*n).to_be_bytes());
        }
        Key::Text(s) => {
            out.push(TAG_TEXT);
            escape_into(s.as_bytes(), out);
        }
        Key::Bytes(b) => {
            out.push(TAG_BYTES);
            escape_into(b, out);
        }
        Key::Array(items) => {
            out.push(TAG_ARRAY);
            for item in items {
                encode_key_into(item, out);
            }
            out.push(TAG_END);
        }
    }
}

/// Decodes one key from the front of `bytes`.
///
/// Returns the key and the number of bytes it occupied.
pub fn decode_key(bytes: &[u8]) -> CoreResult<(Key, usize)> {
    let tag = *bytes
        .first()
        .ok_or_else(|| corrupt("empty key encoding"))?;
    match tag {
        TAG_NUMBER => {
            let body: [u8; 8] = bytes
                .get(1..9)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| corrupt("truncated number key"))?;
            Ok((Key::Number(number_from_bits(u64::from_be_bytes(body))), 9))
        }
        TAG_TEXT => {
            let (raw, used) = unescape(&bytes[1..])?;
            let text = String::from_utf8(raw).map_err(|_| corrupt("text key is not UTF-8"))?;
            Ok((Key::Text(text), used + 1))
        }
        TAG_BYTES => {
            let (raw, used) = unescape(&bytes[1..])?;
            Ok((Key::Bytes(raw), used + 1))
        }
        TAG_ARRAY => {
            let mut pos = 1;
            let mut items = Vec::new();
            loop {
                match bytes.get(pos) {
                    None => return Err(corrupt("unterminated array key")),
                    Some(&TAG_END) => return Ok((Key::Array(items), pos + 1)),
                    Some(_) => {
                        let (item, used) = decode_key(&bytes[pos..])?;
                        items.push(item);
                        pos += used;
                    }
                }
            }
        }
        other => Err(corrupt(&format!("unknown key tag 0x{other:02x}"))),
    }
}

fn number_bits(n: f64) -> u64 {
    let n = if n == 0.0 { 0.0 } else { n };
    let bits = n.to_bits();
    if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

fn number_from_bits(bits: u64) -> f64 {
    if bits & (1 << 63) != 0 {
        f64::from_bits(bits ^ (1 << 63))
    } else {
        f64::from_bits(!bits)
    }
}

fn escape_into(raw: &[u8], out: &mut Vec<u8>) {
    for &b in raw {
        out.push(b);
        if b == TAG_END {
            out.push(ESCAPE);
        }
    }
    out.push(TAG_END);
}

fn unescape(bytes: &[u8]) -> CoreResult<(Vec<u8>, usize)> {
    let mut raw = Vec::new();
    let mut pos = 0;
    while let Some(&b) = bytes.get(pos) {
        if b == TAG_END {
            if bytes.get(pos + 1) == Some(&ESCAPE) {
                raw.push(TAG_END);
                pos += 2;
                continue;
            }
            return Ok((raw, pos + 1));
        }
        raw.push(b);
        pos += 1;
    }
    Err(corrupt("unterminated string key"))
}

fn corrupt(message: &str) -> CoreError {
    CoreError::invalid_record(format!("malformed key encoding: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_key() -> impl Strategy<Value = Key> {
        let leaf = prop_oneof![
            any::<f64>()
                .prop_filter("finite", |f| !f.is_nan())
                .prop_map(Key::Number),
            (-1000i64..1000).prop_map(Key::from),
            ".{0,8}".prop_map(Key::Text),
            "[a\u{0}b]{0,4}".prop_map(Key::Text),
            prop::collection::vec(any::<u8>(), 0..6).prop_map(Key::Bytes),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Key::Array)
        })
    }

    #[test]
    fn text_layout() {
        assert_eq!(encode_key(&Key::from("ab")), vec![0x20, b'a', b'b', 0x00]);
        assert_eq!(
            encode_key(&Key::from("a\0")),
            vec![0x20, b'a', 0x00, 0xFF, 0x00]
        );
    }

    #[test]
    fn decode_reports_length() {
        let mut buf = encode_key(&Key::from("users"));
        let tail = encode_key(&Key::from(5));
        buf.extend_from_slice(&tail);

        let (first, used) = decode_key(&buf).unwrap();
        assert_eq!(first, Key::from("users"));
        let (second, rest) = decode_key(&buf[used..]).unwrap();
        assert_eq!(second, Key::from(5));
        assert_eq!(used + rest, buf.len());
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(decode_key(&[]).is_err());
        assert!(decode_key(&[0x10, 1, 2]).is_err());
        assert!(decode_key(&[0x20, b'a']).is_err());
        assert!(decode_key(&[0x40, 0x10]).is_err());
        assert!(decode_key(&[0x99]).is_err());
    }

    #[test]
    fn negative_numbers_sort_first() {
        assert!(encode_key(&Key::from(-1)) < encode_key(&Key::from(0)));
        assert!(encode_key(&Key::from(-2)) < encode_key(&Key::from(-1)));
        assert!(encode_key(&Key::from(f64::NEG_INFINITY)) < encode_key(&Key::from(-1e300)));
    }

    proptest! {
        #[test]
        fn bytes_order_matches_key_order(a in arb_key(), b in arb_key()) {
            let ea = encode_key(&a);
            let eb = encode_key(&b);
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }

        #[test]
        fn suffixes_keep_order(
            a in arb_key(),
            b in arb_key(),
            x in arb_key(),
            y in arb_key(),
        ) {
            prop_assume!(a != b);
            let mut ea = encode_key(&a);
            encode_key_into(&x, &mut ea);
            let mut eb = encode_key(&b);
            encode_key_into(&y, &mut eb);
            prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
        }

        #[test]
        fn successor_bound_separates_keys(a in arb_key(), b in arb_key(), x in arb_key()) {
            let mut bound = encode_key(&a);
            bound.push(0xFF);
            let mut composite = encode_key(&b);
            encode_key_into(&x, &mut composite);
            if b <= a {
                prop_assert!(composite < bound);
            } else {
                prop_assert!(composite > bound);
            }
        }

        #[test]
        fn decode_inverts_encode(key in arb_key()) {
            let encoded = encode_key(&key);
            let (decoded, used) = decode_key(&encoded).unwrap();
            prop_assert_eq!(used, encoded.len());
            prop_assert_eq!(decoded, key);
        }
    }
}
