//! CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Decode exactly one value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, contain constructs
/// without a [`Value`] counterpart, or continue after the value.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// Maximum element count for arrays and maps, guarding allocations
/// driven by a corrupted length prefix.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum byte/text string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// Maximum nesting depth.
const MAX_DEPTH: usize = 256;

/// A CBOR decoder over a borrowed buffer.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::invalid_structure("nesting too deep"));
        }
        self.depth += 1;
        let value = self.decode_item();
        self.depth -= 1;
        value
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    #[allow(clippy::cast_possible_wrap)]
    fn decode_item(&mut self) -> CodecResult<Value> {
        let initial = self.read_byte()?;
        let major_type = initial >> 5;
        let info = initial & 0x1f;

        match major_type {
            0 => {
                let n = self.read_argument(info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            1 => {
                let n = self.read_argument(info)?;
                // value is -1 - n, representable only while n <= i64::MAX
                if n > i64::MAX as u64 {
                    return Err(CodecError::IntegerOverflow);
                }
                Ok(Value::Integer(-1 - n as i64))
            }
            2 => Ok(Value::Bytes(self.read_string(info)?.to_vec())),
            3 => Ok(Value::Text(self.read_text(info)?)),
            4 => {
                let len = self.read_length(info, MAX_CONTAINER_ELEMENTS)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode()?);
                }
                Ok(Value::Array(items))
            }
            5 => {
                let len = self.read_length(info, MAX_CONTAINER_ELEMENTS)?;
                let mut pairs = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let key_head = self.read_byte()?;
                    if key_head >> 5 != 3 {
                        return Err(CodecError::invalid_structure("map keys must be text"));
                    }
                    let key = self.read_text(key_head & 0x1f)?;
                    let value = self.decode()?;
                    pairs.push((key, value));
                }
                Ok(Value::Map(pairs))
            }
            6 => {
                // Tags carry no meaning for docshelf values
                let _tag = self.read_argument(info)?;
                self.decode_item()
            }
            7 => self.decode_simple(info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    fn decode_simple(&mut self, info: u8) -> CodecResult<Value> {
        let float = match info {
            20 => return Ok(Value::Bool(false)),
            21 => return Ok(Value::Bool(true)),
            22 | 23 => return Ok(Value::Null),
            25 => {
                let b = self.read_bytes(2)?;
                half_to_f64(u16::from_be_bytes([b[0], b[1]]))
            }
            26 => {
                let b = self.read_bytes(4)?;
                f64::from(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            27 => {
                let b = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                f64::from_be_bytes(raw)
            }
            31 => return Err(CodecError::IndefiniteLength),
            other => return Err(CodecError::unsupported_type(format!("simple value {other}"))),
        };
        if float.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        Ok(Value::Float(float))
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_argument(&mut self, info: u8) -> CodecResult<u64> {
        match info {
            0..=23 => Ok(u64::from(info)),
            24 => Ok(u64::from(self.read_byte()?)),
            25 => {
                let b = self.read_bytes(2)?;
                Ok(u64::from(u16::from_be_bytes([b[0], b[1]])))
            }
            26 => {
                let b = self.read_bytes(4)?;
                Ok(u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
            }
            27 => {
                let b = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                Ok(u64::from_be_bytes(raw))
            }
            31 => Err(CodecError::IndefiniteLength),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn read_length(&mut self, info: u8, max_allowed: u64) -> CodecResult<usize> {
        let claimed = self.read_argument(info)?;
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
            claimed,
            max_allowed,
        })
    }

    fn read_string(&mut self, info: u8) -> CodecResult<&'a [u8]> {
        let len = self.read_length(info, MAX_BYTES_LENGTH)?;
        self.read_bytes(len)
    }

    fn read_text(&mut self, info: u8) -> CodecResult<String> {
        let bytes = self.read_string(info)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }
}

/// Widens an IEEE 754 half-precision float.
fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 == 0 { 1.0 } else { -1.0 };
    let exponent = i32::from((bits >> 10) & 0x1f);
    let mantissa = f64::from(bits & 0x03ff);
    match exponent {
        0 => sign * mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => sign * f64::INFINITY,
        31 => f64::NAN,
        _ => sign * (1.0 + mantissa / 1024.0) * 2f64.powi(exponent - 15),
    }
}
