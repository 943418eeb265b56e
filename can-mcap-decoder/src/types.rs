//! Core types for the CAN → MCAP decoder library
//!
//! This module defines the frames the decoder consumes, the decoded signals it
//! produces and the error type shared by every stage of the pipeline.

use crate::signals::database::SignalDefinition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Largest payload of a classic CAN frame
pub const MAX_CLASSIC_PAYLOAD: usize = 8;

const STANDARD_ID_MASK: u32 = 0x7FF;
const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// One captured CAN frame, as produced by a frame source.
#[derive(Debug, Clone, PartialEq)]
pub struct CanFrame {
    /// Capture timestamp in nanoseconds since epoch
    pub timestamp_ns: u64,
    /// CAN message ID (11-bit or 29-bit, already masked)
    pub can_id: u32,
    /// Frame data bytes (0-8 bytes)
    pub data: Vec<u8>,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// True if this is a remote frame
    pub is_remote: bool,
}

impl CanFrame {
    /// Build a frame, masking the identifier to 11 or 29 bits and truncating
    /// the payload to the classic CAN maximum.
    pub fn new(can_id: u32, data: &[u8], is_extended: bool, timestamp_ns: u64) -> Self {
        let mask = if is_extended { EXTENDED_ID_MASK } else { STANDARD_ID_MASK };
        let len = data.len().min(MAX_CLASSIC_PAYLOAD);
        Self {
            timestamp_ns,
            can_id: can_id & mask,
            data: data[..len].to_vec(),
            is_extended,
            is_remote: false,
        }
    }

    /// Builder method: mark the frame as a remote frame
    pub fn with_remote(mut self, is_remote: bool) -> Self {
        self.is_remote = is_remote;
        self
    }

    /// Convert timestamp from nanoseconds to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.timestamp_ns)
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

pub(crate) fn timestamp_from_ns(timestamp_ns: u64) -> Timestamp {
    let secs = (timestamp_ns / 1_000_000_000) as i64;
    let nsecs = (timestamp_ns % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nsecs).unwrap_or_default()
}

/// Errors that can occur while loading, decoding or writing
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Unknown message: CAN ID 0x{0:X}")]
    UnknownMessage(u32),

    #[error("Frame shape mismatch for CAN ID 0x{can_id:X}: {reason}")]
    ShapeMismatch { can_id: u32, reason: String },

    #[error("Invalid signal descriptor: {0}")]
    DescriptorInvalid(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Failed to parse capture file: {0}")]
    CaptureParseError(String),

    #[error("Channel write failed: {0}")]
    ChannelWriteFailure(String),

    #[error("Container writer is closed")]
    WriterClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DecoderError {
    /// True for errors that concern a single frame and must not abort a
    /// conversion (unknown identifier, shape mismatch).
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            DecoderError::UnknownMessage(_) | DecoderError::ShapeMismatch { .. }
        )
    }
}

impl From<mcap::McapError> for DecoderError {
    fn from(err: mcap::McapError) -> Self {
        DecoderError::ChannelWriteFailure(err.to_string())
    }
}

impl From<serde_json::Error> for DecoderError {
    fn from(err: serde_json::Error) -> Self {
        DecoderError::ChannelWriteFailure(format!("record encoding: {}", err))
    }
}

/// Raw value of a signal as extracted from the payload.
///
/// Exactly one variant is active. The serialized form is externally tagged,
/// so a record naming two variants fails to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    #[serde(rename = "bool")]
    Bool(bool),
    #[serde(rename = "int")]
    Signed(i64),
    #[serde(rename = "uint")]
    Unsigned(u64),
    #[serde(rename = "float")]
    Float(f64),
    #[serde(rename = "bytes")]
    Bytes(Vec<u8>),
}

impl RawValue {
    /// Integer view used for physical conversion and value-table lookup.
    ///
    /// Booleans map to 0/1; floats and byte sequences have no integer view.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Bool(v) => Some(i64::from(*v)),
            RawValue::Signed(v) => Some(*v),
            RawValue::Unsigned(v) => Some(*v as i64),
            RawValue::Float(_) | RawValue::Bytes(_) => None,
        }
    }

    /// Convert to f64 where the value is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            RawValue::Signed(v) => Some(*v as f64),
            RawValue::Unsigned(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::Bytes(_) => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(v) => write!(f, "{}", v),
            RawValue::Signed(v) => write!(f, "{}", v),
            RawValue::Unsigned(v) => write!(f, "{}", v),
            RawValue::Float(v) => write!(f, "{:.3}", v),
            RawValue::Bytes(v) => {
                for byte in v {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A decoded signal occurrence, created fresh for each (frame, signal) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the dictionary
    pub name: String,
    /// Raw value before unit conversion
    pub raw: RawValue,
    /// Physical value (absent for floats and signals without a mapping)
    pub physical: Option<f64>,
    /// Matched value-table description
    pub description: Option<String>,
    /// Descriptor this value was decoded with
    pub signal: Arc<SignalDefinition>,
    /// CAN ID of the owning message
    pub can_id: u32,
    /// Name of the owning message
    pub message_name: String,
    /// True if the owning message uses an extended ID
    pub is_extended: bool,
    /// Capture timestamp in nanoseconds since epoch
    pub timestamp_ns: u64,
}

impl DecodedSignal {
    /// Capture timestamp as DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.timestamp_ns)
    }

    /// Engineering unit, if the descriptor declares one
    pub fn unit(&self) -> Option<&str> {
        if self.signal.unit.is_empty() {
            None
        } else {
            Some(&self.signal.unit)
        }
    }
}

/// Format a physical value with magnitude-dependent precision and its unit.
pub fn format_physical(value: f64, unit: &str) -> String {
    let abs = value.abs();
    let formatted = if abs == 0.0 {
        "0".to_string()
    } else if abs >= 1000.0 || abs < 0.01 {
        scientific(value)
    } else if abs >= 100.0 {
        format!("{:.1}", value)
    } else if abs >= 10.0 {
        format!("{:.2}", value)
    } else {
        format!("{:.3}", value)
    };

    if unit.is_empty() {
        formatted
    } else {
        format!("{} {}", formatted, unit)
    }
}

/// Three-decimal scientific notation with a signed exponent of at least two
/// digits (`1.200e+04`, `5.000e-03`)
fn scientific(value: f64) -> String {
    let formatted = format!("{:.3e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}
