//! DBC file loader
//!
//! Parses Vector DBC files with the `can-dbc` crate and converts them into
//! our message and signal definitions.

use crate::signals::database::{
    ByteOrder, MessageDefinition, MultiplexerRole, SignalDefinition, ValueDescription, ValueType,
};
use crate::types::{DecoderError, Result};
use std::path::Path;
use std::sync::Arc;

/// Bit 31 of a DBC message ID flags an extended (29-bit) identifier
const DBC_EXTENDED_FLAG: u32 = 0x8000_0000;
const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Parse a DBC file and return message definitions, sorted by CAN ID
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    let messages = parse_dbc_bytes(&bytes, &source_filename)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse DBC content already held in memory
pub fn parse_dbc_bytes(bytes: &[u8], source: &str) -> Result<Vec<MessageDefinition>> {
    // Try UTF-8 first, then fall back to Latin-1 (compatible with Windows-1252)
    let dbc_content = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::warn!("DBC file {} is not UTF-8, trying Latin-1 encoding", source);
            bytes.iter().map(|&b| b as char).collect()
        }
    };

    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to parse DBC file {}: {:?}", source, e))
    })?;

    let mut messages = Vec::new();
    for dbc_msg in dbc.messages() {
        messages.push(convert_message(&dbc, dbc_msg, source)?);
    }
    messages.sort_by_key(|m| m.id);

    Ok(messages)
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    source: &str,
) -> Result<MessageDefinition> {
    let raw_id = dbc_msg.message_id().0;
    let is_extended = raw_id & DBC_EXTENDED_FLAG != 0;
    let id = if is_extended { raw_id & EXTENDED_ID_MASK } else { raw_id };

    let mut signals = Vec::new();
    for dbc_sig in dbc_msg.signals() {
        let signal = convert_signal(dbc, dbc_msg, dbc_sig)?;
        signals.push(Arc::new(signal));
    }

    Ok(MessageDefinition {
        id,
        is_extended,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    dbc_sig: &can_dbc::Signal,
) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let multiplexer = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::Multiplexor => MultiplexerRole::Switch,
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value) => {
            MultiplexerRole::Multiplexed(switch_value)
        }
        can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(switch_value) => {
            // Extended multiplexing is flattened to its own switch value
            log::debug!(
                "Signal '{}' is both switch and multiplexed; treating it as multiplexed (m{})",
                dbc_sig.name(),
                switch_value
            );
            MultiplexerRole::Multiplexed(switch_value)
        }
        can_dbc::MultiplexIndicator::Plain => MultiplexerRole::None,
    };

    let start_bit = u16::try_from(*dbc_sig.start_bit()).map_err(|_| {
        DecoderError::DescriptorInvalid(format!(
            "signal '{}': start bit {} out of range",
            dbc_sig.name(),
            dbc_sig.start_bit()
        ))
    })?;
    let length = u16::try_from(*dbc_sig.signal_size()).map_err(|_| {
        DecoderError::DescriptorInvalid(format!(
            "signal '{}': size {} out of range",
            dbc_sig.name(),
            dbc_sig.signal_size()
        ))
    })?;

    let is_float = float_flag(dbc, dbc_msg, dbc_sig.name(), length)?;

    let mut value_descriptions: Vec<ValueDescription> = dbc
        .value_descriptions_for_signal(dbc_msg.message_id().clone(), dbc_sig.name())
        .map(|descriptions| {
            descriptions
                .iter()
                .map(|vd| ValueDescription {
                    value: *vd.a() as i64,
                    description: vd.b().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    value_descriptions.sort_by_key(|vd| vd.value);

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit,
        length,
        byte_order,
        value_type,
        is_float,
        multiplexer,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: dbc_sig.unit().to_string(),
        value_descriptions,
        receivers: dbc_sig.receivers().iter().map(|r| r.to_string()).collect(),
    })
}

/// Resolve the float flag from SIG_VALTYPE_ entries
fn float_flag(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    signal_name: &str,
    length: u16,
) -> Result<bool> {
    let value_type = dbc
        .signal_extended_value_type_list()
        .iter()
        .find(|entry| {
            entry.message_id() == dbc_msg.message_id() && entry.signal_name() == signal_name
        })
        .map(|entry| entry.signal_extended_value_type().clone());

    let (is_float, required) = match value_type {
        Some(can_dbc::SignalExtendedValueType::IEEEfloat32Bit) => (true, 32),
        Some(can_dbc::SignalExtendedValueType::IEEEdouble64bit) => (true, 64),
        Some(can_dbc::SignalExtendedValueType::SignedOrUnsignedInteger) | None => (false, length),
    };

    if length != required {
        return Err(DecoderError::DescriptorInvalid(format!(
            "signal '{}': float value type requires {} bits, found {}",
            signal_name, required, length
        )));
    }

    Ok(is_float)
}
