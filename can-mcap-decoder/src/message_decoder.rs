//! Message Decoding Engine
//!
//! Validates a frame against its message definition and extracts every active
//! signal. Handles sign extension, float reinterpretation, physical value
//! conversion, value tables and multiplexing.

use crate::bits;
use crate::signals::database::{MessageDefinition, MultiplexerRole, SignalDefinition, ValueType};
use crate::types::{CanFrame, DecodedSignal, DecoderError, RawValue, Result};
use std::sync::Arc;

/// Message decoder - extracts signals from CAN frames
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode a CAN frame against its message definition
    ///
    /// # Returns
    /// * `Ok(signals)` with one entry per active signal, plain signals and the
    ///   multiplexer switch first, then the multiplexed signals selected by the
    ///   switch value
    /// * `Err(DecoderError::ShapeMismatch)` if the frame's length, ID format or
    ///   remote flag disagree with the definition; no signals are decoded
    pub fn decode_frame(frame: &CanFrame, message_def: &MessageDefinition) -> Result<Vec<DecodedSignal>> {
        Self::check_shape(frame, message_def)?;

        let mut decoded_signals = Vec::with_capacity(message_def.signals.len());
        let mut multiplexer_value: Option<u64> = None;

        for signal in &message_def.signals {
            match signal.multiplexer {
                MultiplexerRole::Multiplexed(_) => continue,
                MultiplexerRole::Switch => {
                    multiplexer_value = Some(Self::extract_raw(&frame.data, signal));
                }
                MultiplexerRole::None => {}
            }
            decoded_signals.push(Self::decode_signal(frame, message_def, signal));
        }

        if let Some(mux_value) = multiplexer_value {
            for signal in &message_def.signals {
                if signal.multiplexer == MultiplexerRole::Multiplexed(mux_value) {
                    decoded_signals.push(Self::decode_signal(frame, message_def, signal));
                }
            }
        }

        Ok(decoded_signals)
    }

    /// Reject frames whose shape disagrees with the message definition
    fn check_shape(frame: &CanFrame, message_def: &MessageDefinition) -> Result<()> {
        let reason = if frame.data.len() != message_def.size {
            format!(
                "payload length {} but '{}' declares {}",
                frame.data.len(),
                message_def.name,
                message_def.size
            )
        } else if frame.is_extended != message_def.is_extended {
            format!(
                "frame uses {} ID but '{}' is {}",
                id_kind(frame.is_extended),
                message_def.name,
                id_kind(message_def.is_extended)
            )
        } else if frame.is_remote {
            "remote frame carries no signal data".to_string()
        } else {
            return Ok(());
        };

        Err(DecoderError::ShapeMismatch {
            can_id: frame.can_id,
            reason,
        })
    }

    /// Decode a single signal from CAN frame data
    pub fn decode_signal(
        frame: &CanFrame,
        message_def: &MessageDefinition,
        signal: &Arc<SignalDefinition>,
    ) -> DecodedSignal {
        let raw = Self::interpret(Self::extract_raw(&frame.data, signal), signal);

        let physical = match raw {
            RawValue::Signed(v) if signal.has_physical_mapping() => Some(signal.to_physical(v as f64)),
            RawValue::Unsigned(v) if signal.has_physical_mapping() => Some(signal.to_physical(v as f64)),
            _ => None,
        };

        let description = if signal.is_float {
            None
        } else {
            raw.as_i64()
                .and_then(|value| signal.describe(value))
                .map(str::to_string)
        };

        DecodedSignal {
            name: signal.name.clone(),
            raw,
            physical,
            description,
            signal: Arc::clone(signal),
            can_id: message_def.id,
            message_name: message_def.name.clone(),
            is_extended: message_def.is_extended,
            timestamp_ns: frame.timestamp_ns,
        }
    }

    /// Extract the unsigned bit field described by `signal`
    fn extract_raw(data: &[u8], signal: &SignalDefinition) -> u64 {
        bits::extract(data, signal.start_bit, signal.length, signal.byte_order)
    }

    /// Turn the extracted bits into a typed raw value
    ///
    /// Priority: single bit → boolean, float flag → IEEE-754, signed → sign
    /// extended integer, otherwise unsigned.
    fn interpret(bits_value: u64, signal: &SignalDefinition) -> RawValue {
        if signal.length == 1 {
            RawValue::Bool(bits_value != 0)
        } else if signal.is_float {
            if signal.length == 32 {
                RawValue::Float(f32::from_bits(bits_value as u32) as f64)
            } else {
                RawValue::Float(f64::from_bits(bits_value))
            }
        } else {
            match signal.value_type {
                ValueType::Signed => RawValue::Signed(bits::sign_extend(bits_value, signal.length)),
                ValueType::Unsigned => RawValue::Unsigned(bits_value),
            }
        }
    }
}

fn id_kind(is_extended: bool) -> &'static str {
    if is_extended {
        "an extended"
    } else {
        "a standard"
    }
}
