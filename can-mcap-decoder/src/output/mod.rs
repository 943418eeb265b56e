//! Output side of the pipeline: channel registry, record encoding and the
//! container writer.

pub mod record;
pub mod registry;
pub mod sink;
pub mod writer;

pub use sink::McapSink;
pub use record::SignalRecord;
pub use registry::{format_can_id, ChannelHandle, ChannelInfo, ChannelKey, ChannelRegistry};
pub use writer::ContainerWriter;

use crate::types::Result;

/// Destination for schema, channel and message records.
///
/// The writer serializes all calls, so implementations need no locking of
/// their own. Channel IDs passed in are the registry's IDs; an implementation
/// maps them to whatever its container assigns.
pub trait ContainerSink {
    /// Write the schema record and return its container ID
    fn write_schema(&mut self, name: &str, encoding: &str, data: &[u8]) -> Result<u16>;

    /// Write the channel record for a newly registered channel
    fn write_channel(
        &mut self,
        channel_id: u16,
        schema_id: u16,
        message_encoding: &str,
        info: &ChannelInfo,
    ) -> Result<()>;

    /// Write one message on a previously written channel
    fn write_message(
        &mut self,
        channel_id: u16,
        sequence: u32,
        log_time: u64,
        data: &[u8],
    ) -> Result<()>;

    /// Flush buffered data and write the container footer
    fn finish(&mut self) -> Result<()>;
}
