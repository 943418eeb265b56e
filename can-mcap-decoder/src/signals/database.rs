//! Signal database
//!
//! Immutable message and signal descriptors plus the read-only lookup
//! structure the decoder consumes. Descriptors are validated once, when they
//! enter the database, so that decoding never has to.

use crate::types::{DecoderError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID (masked to 11 or 29 bits)
    pub id: u32,
    /// True if the message uses an extended (29-bit) ID
    pub is_extended: bool,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<Arc<SignalDefinition>>,
    /// Source file (DBC filename)
    pub source: String,
}

impl MessageDefinition {
    /// The multiplexer switch signal, if the message declares one
    pub fn multiplexer(&self) -> Option<&Arc<SignalDefinition>> {
        self.signals
            .iter()
            .find(|s| s.multiplexer == MultiplexerRole::Switch)
    }

    /// True if this message has a multiplexer switch
    pub fn is_multiplexed(&self) -> bool {
        self.multiplexer().is_some()
    }

    /// Find a signal by name
    pub fn signal(&self, name: &str) -> Option<&Arc<SignalDefinition>> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Check every signal against this message's layout
    pub fn validate(&self) -> Result<()> {
        let mut switches = 0;
        for signal in &self.signals {
            signal.validate(self.size).map_err(|e| match e {
                DecoderError::DescriptorInvalid(reason) => DecoderError::DescriptorInvalid(
                    format!("message '{}' (0x{:X}): {}", self.name, self.id, reason),
                ),
                other => other,
            })?;
            if signal.multiplexer == MultiplexerRole::Switch {
                switches += 1;
            }
        }

        if switches > 1 {
            return Err(DecoderError::DescriptorInvalid(format!(
                "message '{}' (0x{:X}) declares {} multiplexer switches",
                self.name, self.id, switches
            )));
        }

        if switches == 0 {
            if let Some(orphan) = self
                .signals
                .iter()
                .find(|s| matches!(s.multiplexer, MultiplexerRole::Multiplexed(_)))
            {
                return Err(DecoderError::DescriptorInvalid(format!(
                    "message '{}' (0x{:X}): signal '{}' is multiplexed but no switch exists",
                    self.name, self.id, orphan.name
                )));
            }
        }

        Ok(())
    }
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame (LSB for Intel, MSB for Motorola)
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Bit order of the field
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// IEEE-754 float (32 or 64 bits)
    pub is_float: bool,
    /// Multiplexer role
    pub multiplexer: MultiplexerRole,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: f64,
    /// Maximum physical value
    pub max: f64,
    /// Engineering unit (empty when not declared)
    pub unit: String,
    /// Value table, sorted by value
    pub value_descriptions: Vec<ValueDescription>,
    /// Receiving nodes
    pub receivers: Vec<String>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Role of a signal in multiplexing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplexerRole {
    /// Always present
    None,
    /// Selects the active multiplexed signal set
    Switch,
    /// Present only when the switch carries this value
    Multiplexed(u64),
}

/// One entry of a signal's value table
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDescription {
    pub value: i64,
    pub description: String,
}

impl SignalDefinition {
    /// Create an unsigned little-endian signal with identity conversion.
    ///
    /// Intended as a starting point for builders and tests; the remaining
    /// fields are public.
    pub fn new(name: impl Into<String>, start_bit: u16, length: u16) -> Self {
        Self {
            name: name.into(),
            start_bit,
            length,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            is_float: false,
            multiplexer: MultiplexerRole::None,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: String::new(),
            value_descriptions: Vec::new(),
            receivers: Vec::new(),
        }
    }

    /// True when factor, offset, min or max is non-zero.
    ///
    /// All four being zero means the dictionary defines no physical mapping.
    pub fn has_physical_mapping(&self) -> bool {
        self.factor != 0.0 || self.offset != 0.0 || self.min != 0.0 || self.max != 0.0
    }

    /// Apply factor and offset
    pub fn to_physical(&self, raw: f64) -> f64 {
        raw * self.factor + self.offset
    }

    /// Check a physical value against [min, max]; unconstrained when both are zero
    pub fn in_range(&self, value: f64) -> bool {
        if self.min == 0.0 && self.max == 0.0 {
            return true;
        }
        const EPSILON: f64 = 1e-9;
        value >= self.min - EPSILON && value <= self.max + EPSILON
    }

    /// Look up the value-table description for a raw integer
    pub fn describe(&self, raw: i64) -> Option<&str> {
        self.value_descriptions
            .binary_search_by_key(&raw, |vd| vd.value)
            .ok()
            .map(|idx| self.value_descriptions[idx].description.as_str())
    }

    /// Check the descriptor against the owning message's byte length
    pub fn validate(&self, message_size: usize) -> Result<()> {
        let invalid = |reason: String| {
            Err(DecoderError::DescriptorInvalid(format!(
                "signal '{}': {}",
                self.name, reason
            )))
        };

        if self.length == 0 || self.length > 64 {
            return invalid(format!("bit length {} outside 1..=64", self.length));
        }
        if self.is_float && self.length != 32 && self.length != 64 {
            return invalid(format!("float signal with bit length {}", self.length));
        }
        if self.is_float && self.multiplexer == MultiplexerRole::Switch {
            return invalid("multiplexer switch cannot be a float".to_string());
        }

        let total_bits = message_size * 8;
        let start = self.start_bit as usize;
        let length = self.length as usize;
        let fits = match self.byte_order {
            ByteOrder::LittleEndian => start + length <= total_bits,
            ByteOrder::BigEndian => {
                start < total_bits && crate::bits::msb_linear_position(self.start_bit) + length <= total_bits
            }
        };
        if !fits {
            return invalid(format!(
                "bits start={} length={} exceed {} byte message",
                self.start_bit, self.length, message_size
            ));
        }

        Ok(())
    }
}

/// The signal database: all message definitions keyed by CAN ID
pub struct SignalDatabase {
    /// Message definitions by CAN ID
    messages: HashMap<u32, MessageDefinition>,

    /// Message name lookup: name -> CAN ID
    message_lookup: HashMap<String, u32>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            message_lookup: HashMap::new(),
        }
    }

    /// Validate a message definition and add it to the database.
    ///
    /// An ID that is already present keeps its first definition.
    pub fn add_message(&mut self, mut message: MessageDefinition) -> Result<()> {
        message.validate()?;

        if let Some(existing) = self.messages.get(&message.id) {
            log::warn!(
                "Duplicate definition for CAN ID 0x{:X}: keeping '{}' from {}, ignoring '{}' from {}",
                message.id,
                existing.name,
                existing.source,
                message.name,
                message.source
            );
            return Ok(());
        }

        for signal in message.signals.iter_mut() {
            Arc::make_mut(signal)
                .value_descriptions
                .sort_by_key(|vd| vd.value);
        }

        self.message_lookup.insert(message.name.clone(), message.id);
        self.messages.insert(message.id, message);
        Ok(())
    }

    /// Get the message definition for a CAN ID
    pub fn get_message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// Get message definition by name
    pub fn get_message_by_name(&self, message_name: &str) -> Option<&MessageDefinition> {
        self.message_lookup
            .get(message_name)
            .and_then(|can_id| self.messages.get(can_id))
    }

    /// Get a signal by (CAN ID, signal name)
    pub fn get_signal(&self, can_id: u32, signal_name: &str) -> Option<&Arc<SignalDefinition>> {
        self.get_message(can_id).and_then(|msg| msg.signal(signal_name))
    }

    /// All messages, ordered by CAN ID
    pub fn messages(&self) -> Vec<&MessageDefinition> {
        let mut messages: Vec<&MessageDefinition> = self.messages.values().collect();
        messages.sort_unstable_by_key(|m| m.id);
        messages
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        let num_messages = self.messages.len();
        let num_signals = self.messages.values().map(|m| m.signals.len()).sum();
        let num_multiplexed = self.messages.values().filter(|m| m.is_multiplexed()).count();

        DatabaseStats {
            num_messages,
            num_signals,
            num_multiplexed,
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
    /// Messages with a multiplexer switch
    pub num_multiplexed: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: u32, signals: Vec<SignalDefinition>) -> MessageDefinition {
        MessageDefinition {
            id,
            is_extended: false,
            name: format!("Msg_{:X}", id),
            size: 8,
            sender: Some("ECU1".to_string()),
            signals: signals.into_iter().map(Arc::new).collect(),
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_empty_database() {
        let db = SignalDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
        assert_eq!(stats.num_multiplexed, 0);
    }

    #[test]
    fn test_add_message() {
        let mut db = SignalDatabase::new();

        let mut signal = SignalDefinition::new("EngineSpeed", 0, 16);
        signal.max = 8000.0;
        signal.unit = "rpm".to_string();

        db.add_message(message(0x123, vec![signal])).unwrap();

        let stats = db.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 1);

        let msg = db.get_message(0x123).unwrap();
        assert_eq!(msg.name, "Msg_123");
        assert_eq!(db.get_message_by_name("Msg_123").unwrap().id, 0x123);
        assert_eq!(db.get_signal(0x123, "EngineSpeed").unwrap().unit, "rpm");
        assert!(db.get_signal(0x123, "Missing").is_none());
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let mut db = SignalDatabase::new();
        db.add_message(message(0x10, vec![SignalDefinition::new("A", 0, 8)]))
            .unwrap();
        let mut second = message(0x10, vec![SignalDefinition::new("B", 0, 8)]);
        second.name = "Other".to_string();
        db.add_message(second).unwrap();

        assert_eq!(db.stats().num_messages, 1);
        assert!(db.get_signal(0x10, "A").is_some());
        assert!(db.get_message_by_name("Other").is_none());
    }

    #[test]
    fn test_messages_sorted_by_id() {
        let mut db = SignalDatabase::new();
        for id in [0x300, 0x100, 0x200] {
            db.add_message(message(id, vec![])).unwrap();
        }
        let ids: Vec<u32> = db.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0x100, 0x200, 0x300]);
    }

    #[test]
    fn test_value_descriptions_sorted_and_described() {
        let mut signal = SignalDefinition::new("Gear", 0, 4);
        signal.value_descriptions = vec![
            ValueDescription { value: 2, description: "Drive".to_string() },
            ValueDescription { value: 0, description: "Park".to_string() },
            ValueDescription { value: 1, description: "Reverse".to_string() },
        ];
        let mut db = SignalDatabase::new();
        db.add_message(message(0x50, vec![signal])).unwrap();

        let gear = db.get_signal(0x50, "Gear").unwrap();
        assert_eq!(gear.describe(1), Some("Reverse"));
        assert_eq!(gear.describe(2), Some("Drive"));
        assert_eq!(gear.describe(7), None);
    }

    #[test]
    fn test_rejects_zero_and_oversized_length() {
        let zero = SignalDefinition::new("Zero", 0, 0);
        assert!(matches!(zero.validate(8), Err(DecoderError::DescriptorInvalid(_))));

        let wide = SignalDefinition::new("Wide", 0, 65);
        assert!(wide.validate(16).is_err());
    }

    #[test]
    fn test_rejects_bad_float_width() {
        let mut float = SignalDefinition::new("F", 0, 16);
        float.is_float = true;
        assert!(float.validate(8).is_err());

        float.length = 32;
        assert!(float.validate(8).is_ok());
        float.length = 64;
        assert!(float.validate(8).is_ok());
    }

    #[test]
    fn test_rejects_span_outside_message() {
        let intel = SignalDefinition::new("Late", 60, 8);
        assert!(intel.validate(8).is_err());
        assert!(SignalDefinition::new("Fits", 56, 8).validate(8).is_ok());

        // Motorola start=7 length=16 covers bytes 0-1
        let mut motorola = SignalDefinition::new("BE", 7, 16);
        motorola.byte_order = ByteOrder::BigEndian;
        assert!(motorola.validate(2).is_ok());
        assert!(motorola.validate(1).is_err());

        // Motorola start=0 is the LSB of byte 0: only one bit fits before byte 1
        motorola.start_bit = 0;
        motorola.length = 9;
        assert!(motorola.validate(2).is_ok());
        assert!(motorola.validate(1).is_err());
    }

    #[test]
    fn test_multiplexer_rules() {
        let mut switch_a = SignalDefinition::new("ModeA", 0, 4);
        switch_a.multiplexer = MultiplexerRole::Switch;
        let mut switch_b = SignalDefinition::new("ModeB", 4, 4);
        switch_b.multiplexer = MultiplexerRole::Switch;
        let two_switches = message(0x60, vec![switch_a.clone(), switch_b]);
        assert!(two_switches.validate().is_err());

        let mut orphan = SignalDefinition::new("Orphan", 8, 8);
        orphan.multiplexer = MultiplexerRole::Multiplexed(1);
        assert!(message(0x61, vec![orphan.clone()]).validate().is_err());

        let ok = message(0x62, vec![switch_a, orphan]);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.multiplexer().unwrap().name, "ModeA");
    }

    #[test]
    fn test_physical_mapping_and_range() {
        let mut signal = SignalDefinition::new("S", 0, 8);
        signal.factor = 0.0;
        assert!(!signal.has_physical_mapping());

        signal.factor = 0.1;
        signal.offset = 40.0;
        assert!(signal.has_physical_mapping());
        assert!((signal.to_physical(100.0) - 50.0).abs() < 1e-9);

        assert!(signal.in_range(1e6));
        signal.min = -40.0;
        signal.max = 215.0;
        assert!(signal.in_range(215.0));
        assert!(!signal.in_range(216.0));
    }
}
