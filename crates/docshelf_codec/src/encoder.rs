//! CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to CBOR bytes.
///
/// Integers use their shortest form, floats are always written as
/// 64-bit, lengths are definite and map entries keep insertion order.
///
/// # Errors
///
/// Returns [`CodecError::NaNForbidden`] if the value contains a NaN.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A CBOR encoder writing into an owned buffer.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value, appending to the buffer.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(x) => self.encode_float(*x)?,
            Value::Bytes(b) => {
                self.encode_head(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => self.encode_text(s),
            Value::Array(items) => {
                self.encode_head(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Map(pairs) => {
                self.encode_head(5, pairs.len() as u64);
                for (key, item) in pairs {
                    self.encode_text(key);
                    self.encode(item)?;
                }
            }
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_head(0, n as u64);
        } else {
            // -1 - n is in [0, i64::MAX] for every negative n
            self.encode_head(1, (-1 - n) as u64);
        }
    }

    fn encode_float(&mut self, x: f64) -> CodecResult<()> {
        if x.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&x.to_bits().to_be_bytes());
        Ok(())
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_head(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_head(&mut self, major_type: u8, argument: u64) {
        let mt = major_type << 5;
        if argument < 24 {
            self.buffer.push(mt | argument as u8);
        } else if let Ok(a) = u8::try_from(argument) {
            self.buffer.push(mt | 24);
            self.buffer.push(a);
        } else if let Ok(a) = u16::try_from(argument) {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&a.to_be_bytes());
        } else if let Ok(a) = u32::try_from(argument) {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&a.to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&argument.to_be_bytes());
        }
    }
}
