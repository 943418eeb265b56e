//! CAN MCAP Decoder Library
//!
//! Decodes CAN signals from captured frames using DBC message definitions and
//! writes them to an MCAP container, one lazily created channel per signal.
//!
//! # Architecture
//!
//! - `signals`: descriptor model, signal database and the DBC loader
//! - `bits` / `message_decoder`: bit extraction, shape validation, raw and
//!   physical values, multiplexing
//! - `output`: channel registry, record encoding and the container writer
//! - `formats`: pcapng capture reader
//! - `decoder`: the [`Decoder`] entry point tying them together
//!
//! The library does NOT:
//! - Parse command lines or configuration files
//! - Install logger backends or signal handlers
//! - Print reports
//!
//! All higher-level functionality is in the application layer (can-mcap-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use can_mcap_decoder::{ContainerWriter, Decoder, McapSink, WriterConfig};
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//!
//! let mut decoder = Decoder::new();
//! decoder.add_dbc(Path::new("powertrain.dbc")).unwrap();
//!
//! let config = WriterConfig::new().with_topic_prefix("vehicle");
//! let sink = McapSink::create(Path::new("mcap/trace.mcap"), &config).unwrap();
//! let writer = ContainerWriter::new(sink, &config).unwrap();
//!
//! let cancel = AtomicBool::new(false);
//! let stats = decoder
//!     .convert_file(Path::new("trace.pcapng"), &writer, &cancel)
//!     .unwrap();
//! writer.close().unwrap();
//!
//! println!("{} signals on {} channels", stats.signals_written, stats.channels_created);
//! ```

// Public modules
pub mod bits;
pub mod config;
pub mod decoder;
pub mod formats;
pub mod message_decoder;
pub mod output;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use config::{Compression, WriterConfig};
pub use decoder::{ConversionStats, DatabaseStats, Decoder};
pub use formats::{open_capture, FrameSource, PcapngReader};
pub use message_decoder::MessageDecoder;
pub use output::{
    ChannelHandle, ChannelInfo, ChannelRegistry, ContainerSink, ContainerWriter, McapSink,
    SignalRecord,
};
pub use signals::{
    ByteOrder, MessageDefinition, MultiplexerRole, SignalDatabase, SignalDefinition,
    ValueDescription, ValueType,
};
pub use types::{
    format_physical, CanFrame, DecodedSignal, DecoderError, RawValue, Result, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        let decoder = Decoder::new();
        let stats = decoder.database_stats();
        assert_eq!(stats.num_messages, 0);
        assert!(!VERSION.is_empty());
    }
}
