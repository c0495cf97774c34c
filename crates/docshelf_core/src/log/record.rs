//! Log batch types and frame serialization.

use crate::error::{CoreError, CoreResult};
use docshelf_codec::{from_cbor, to_cbor, Value};

/// Magic bytes opening every frame.
pub const LOG_MAGIC: [u8; 4] = *b"DSHL";

/// Current frame format.
pub const LOG_FORMAT: u16 = 1;

/// magic (4) + format (2) + kind (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// Kind of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// An atomic batch of keyspace operations.
    Batch = 1,
}

impl FrameKind {
    /// Converts a byte to a frame kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            _ => None,
        }
    }

    /// Converts the frame kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

const OP_PUT: i64 = 1;
const OP_DELETE: i64 = 2;
const OP_DELETE_RANGE: i64 = 3;

/// One keyspace mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    /// Insert or replace a key.
    Put {
        /// Physical key.
        key: Vec<u8>,
        /// Stored bytes.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Physical key.
        key: Vec<u8>,
    },
    /// Remove every key in `start..end`.
    DeleteRange {
        /// Inclusive lower bound.
        start: Vec<u8>,
        /// Exclusive upper bound.
        end: Vec<u8>,
    },
}

impl LogOp {
    fn to_value(&self) -> Value {
        match self {
            Self::Put { key, value } => Value::Array(vec![
                Value::Integer(OP_PUT),
                Value::Bytes(key.clone()),
                Value::Bytes(value.clone()),
            ]),
            Self::Delete { key } => {
                Value::Array(vec![Value::Integer(OP_DELETE), Value::Bytes(key.clone())])
            }
            Self::DeleteRange { start, end } => Value::Array(vec![
                Value::Integer(OP_DELETE_RANGE),
                Value::Bytes(start.clone()),
                Value::Bytes(end.clone()),
            ]),
        }
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        let parts = value
            .as_array()
            .ok_or_else(|| bad_payload("operation is not an array"))?;
        let bytes = |i: usize| -> CoreResult<Vec<u8>> {
            parts
                .get(i)
                .and_then(Value::as_bytes)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| bad_payload("operation operand is not bytes"))
        };
        let tag = parts.first().and_then(Value::as_integer);
        match (tag, parts.len()) {
            (Some(OP_PUT), 3) => Ok(Self::Put {
                key: bytes(1)?,
                value: bytes(2)?,
            }),
            (Some(OP_DELETE), 2) => Ok(Self::Delete { key: bytes(1)? }),
            (Some(OP_DELETE_RANGE), 3) => Ok(Self::DeleteRange {
                start: bytes(1)?,
                end: bytes(2)?,
            }),
            _ => Err(bad_payload("unknown operation")),
        }
    }
}

/// Operations committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    ops: Vec<LogOp>,
}

impl LogBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(LogOp::Put { key, value });
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(LogOp::Delete { key });
    }

    /// Queues a range delete.
    pub fn delete_range(&mut self, start: Vec<u8>, end: Vec<u8>) {
        self.ops.push(LogOp::DeleteRange { start, end });
    }

    /// Queued operations.
    #[must_use]
    pub fn ops(&self) -> &[LogOp] {
        &self.ops
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Serializes the batch payload.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let ops = self.ops.iter().map(LogOp::to_value).collect();
        Ok(to_cbor(&Value::Array(ops))?)
    }

    /// Deserializes a batch payload.
    pub fn decode_payload(payload: &[u8]) -> CoreResult<Self> {
        let value = from_cbor(payload).map_err(|e| bad_payload(&e.to_string()))?;
        let ops = value
            .as_array()
            .ok_or_else(|| bad_payload("batch is not an array"))?
            .iter()
            .map(LogOp::from_value)
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self { ops })
    }

    /// Builds the complete frame for this batch.
    pub fn encode_frame(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_record("write batch too large for one frame"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_FORMAT.to_le_bytes());
        data.push(FrameKind::Batch.as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

fn bad_payload(message: &str) -> CoreError {
    CoreError::log_corruption(0, format!("invalid batch payload: {message}"))
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}
