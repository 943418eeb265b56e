//! Signal database and DBC loader
//!
//! This module contains the descriptor model, the database the decoder reads
//! from, and the DBC adapter that fills it.

pub mod dbc;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, MultiplexerRole, SignalDatabase,
    SignalDefinition, ValueDescription, ValueType,
};
