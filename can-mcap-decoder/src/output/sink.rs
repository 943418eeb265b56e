//! MCAP container sink

use super::{ContainerSink, ChannelInfo};
use crate::config::{Compression, WriterConfig};
use crate::types::{DecoderError, Result};
use mcap::records::MessageHeader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// [`ContainerSink`] writing a chunked MCAP file.
///
/// The first failed write abandons the underlying writer: every later call
/// returns [`DecoderError::ChannelWriteFailure`] and nothing more reaches the
/// output.
pub struct McapSink<W: Write + Seek> {
    /// `None` once finished or abandoned
    writer: Option<mcap::Writer<W>>,
    failed: bool,
    /// Registry channel ID -> MCAP channel ID
    channels: HashMap<u16, u16>,
}

impl McapSink<BufWriter<File>> {
    /// Create (or truncate) `path` and start an MCAP file in it
    pub fn create(path: &Path, config: &WriterConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        log::info!("Writing MCAP output to {}", path.display());
        Self::new(BufWriter::new(file), config)
    }
}

impl<W: Write + Seek> McapSink<W> {
    /// Start an MCAP file on an arbitrary seekable writer
    pub fn new(inner: W, config: &WriterConfig) -> Result<Self> {
        let compression = match config.compression {
            Compression::Zstd => Some(mcap::Compression::Zstd),
            Compression::Lz4 => Some(mcap::Compression::Lz4),
            Compression::None => None,
        };

        let writer = mcap::WriteOptions::new()
            .profile("")
            .compression(compression)
            .chunk_size(Some(config.chunk_size))
            .create(inner)?;

        Ok(Self {
            writer: Some(writer),
            failed: false,
            channels: HashMap::new(),
        })
    }

    fn writer(&mut self) -> Result<&mut mcap::Writer<W>> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None if self.failed => Err(DecoderError::ChannelWriteFailure(
                "MCAP output failed on an earlier write".to_string(),
            )),
            None => Err(DecoderError::WriterClosed),
        }
    }

    /// Abandon the writer on error
    fn check<T>(&mut self, result: mcap::McapResult<T>) -> Result<T> {
        result.map_err(|err| {
            self.abandon();
            err.into()
        })
    }

    fn abandon(&mut self) {
        self.failed = true;
        if let Some(writer) = self.writer.take() {
            // mcap's Drop retries finish() and unwraps the same I/O error
            std::mem::forget(writer);
        }
    }
}

impl<W: Write + Seek> Drop for McapSink<W> {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            match writer.finish() {
                Ok(()) => drop(writer),
                Err(err) => {
                    log::error!("Failed to finalize MCAP output: {}", err);
                    std::mem::forget(writer);
                }
            }
        }
    }
}

impl<W: Write + Seek> ContainerSink for McapSink<W> {
    fn write_schema(&mut self, name: &str, encoding: &str, data: &[u8]) -> Result<u16> {
        let result = self.writer()?.add_schema(name, encoding, data);
        self.check(result)
    }

    fn write_channel(
        &mut self,
        channel_id: u16,
        schema_id: u16,
        message_encoding: &str,
        info: &ChannelInfo,
    ) -> Result<()> {
        let metadata = info.metadata();
        let result = self
            .writer()?
            .add_channel(schema_id, &info.topic, message_encoding, &metadata);
        let mcap_id = self.check(result)?;
        self.channels.insert(channel_id, mcap_id);
        Ok(())
    }

    fn write_message(
        &mut self,
        channel_id: u16,
        sequence: u32,
        log_time: u64,
        data: &[u8],
    ) -> Result<()> {
        let mcap_id = *self.channels.get(&channel_id).ok_or_else(|| {
            DecoderError::ChannelWriteFailure(format!("channel {} was never written", channel_id))
        })?;

        let header = MessageHeader {
            channel_id: mcap_id,
            sequence,
            log_time,
            publish_time: log_time,
        };
        let result = self.writer()?.write_to_known_channel(&header, data);
        self.check(result)
    }

    fn finish(&mut self) -> Result<()> {
        let result = self.writer()?.finish();
        self.check(result)?;
        self.writer = None;
        Ok(())
    }
}
