//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The Decoder struct is the entry point for loading signal definitions,
//! decoding frames and converting a capture into a container.

use crate::message_decoder::MessageDecoder;
use crate::output::{ContainerSink, ContainerWriter};
use crate::signals::{MessageDefinition, SignalDatabase};
use crate::types::{CanFrame, DecodedSignal, DecoderError, Result, Timestamp};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

// Re-export DatabaseStats for public API
pub use crate::signals::DatabaseStats;

/// The main decoder struct - entry point for all decoding operations
pub struct Decoder {
    /// Internal signal database (loaded from DBC files)
    signal_db: SignalDatabase,
}

impl Decoder {
    /// Create a new decoder instance
    pub fn new() -> Self {
        Self {
            signal_db: SignalDatabase::new(),
        }
    }

    /// Load a DBC file and add its definitions to the signal database
    ///
    /// # Example
    /// ```no_run
    /// use can_mcap_decoder::Decoder;
    /// use std::path::Path;
    ///
    /// let mut decoder = Decoder::new();
    /// decoder.add_dbc(Path::new("powertrain.dbc")).unwrap();
    /// ```
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);

        let messages = crate::signals::dbc::parse_dbc_file(path)?;
        let count = messages.len();
        for message in messages {
            self.signal_db.add_message(message)?;
        }

        log::info!("DBC file loaded: {:?} ({} messages)", path, count);
        Ok(())
    }

    /// Add a single message definition built in code
    pub fn add_message(&mut self, message: MessageDefinition) -> Result<()> {
        self.signal_db.add_message(message)
    }

    /// Read-only view of the loaded definitions
    pub fn database(&self) -> &SignalDatabase {
        &self.signal_db
    }

    /// Get statistics about the loaded signal database
    pub fn database_stats(&self) -> DatabaseStats {
        self.signal_db.stats()
    }

    /// Decode one frame.
    ///
    /// Fails with `UnknownMessage` when no definition exists for the frame's
    /// ID and with `ShapeMismatch` when the frame disagrees with it.
    pub fn decode_frame(&self, frame: &CanFrame) -> Result<Vec<DecodedSignal>> {
        let message_def = self
            .signal_db
            .get_message(frame.can_id)
            .ok_or(DecoderError::UnknownMessage(frame.can_id))?;

        MessageDecoder::decode_frame(frame, message_def)
    }

    /// Decode every frame from `frames` and append the signals to `writer`.
    ///
    /// Unknown IDs and shape mismatches are counted and skipped. Any other
    /// error (capture read failure, write failure) stops the conversion.
    /// `cancel` is checked before each frame is pulled; a cancelled run
    /// returns the statistics gathered so far. The writer is left open.
    pub fn convert<I, S>(
        &self,
        frames: I,
        writer: &ContainerWriter<S>,
        cancel: &AtomicBool,
    ) -> Result<ConversionStats>
    where
        I: IntoIterator<Item = Result<CanFrame>>,
        S: ContainerSink,
    {
        self.convert_with(frames, writer, cancel, |_| {})
    }

    /// Like [`Decoder::convert`], calling `on_signal` after each signal is
    /// written.
    pub fn convert_with<I, S, F>(
        &self,
        frames: I,
        writer: &ContainerWriter<S>,
        cancel: &AtomicBool,
        mut on_signal: F,
    ) -> Result<ConversionStats>
    where
        I: IntoIterator<Item = Result<CanFrame>>,
        S: ContainerSink,
        F: FnMut(&DecodedSignal),
    {
        let mut stats = ConversionStats::default();
        let mut frames = frames.into_iter();

        loop {
            if cancel.load(Ordering::Relaxed) {
                log::info!("Conversion cancelled after {} frames", stats.frames_read);
                stats.cancelled = true;
                break;
            }

            let frame = match frames.next() {
                Some(frame) => frame?,
                None => break,
            };
            stats.record_frame(&frame);

            match self.decode_frame(&frame) {
                Ok(signals) => {
                    stats.frames_decoded += 1;
                    for signal in &signals {
                        if let Some(physical) = signal.physical {
                            if !signal.signal.in_range(physical) {
                                stats.out_of_range += 1;
                            }
                        }
                        writer.append(signal)?;
                        stats.signals_written += 1;
                        on_signal(signal);
                    }
                }
                Err(e) if e.is_frame_error() => {
                    log::trace!("Skipping frame: {}", e);
                    stats.record_skip(&e);
                }
                Err(e) => return Err(e),
            }
        }

        stats.channels_created = writer.channel_count();
        log::info!(
            "Converted {} of {} frames into {} signals on {} channels",
            stats.frames_decoded,
            stats.frames_read,
            stats.signals_written,
            stats.channels_created
        );
        Ok(stats)
    }

    /// Open a capture file and convert it, see [`Decoder::convert`]
    pub fn convert_file<S: ContainerSink>(
        &self,
        capture: &Path,
        writer: &ContainerWriter<S>,
        cancel: &AtomicBool,
    ) -> Result<ConversionStats> {
        log::info!("Converting capture: {:?}", capture);
        let mut source = crate::formats::open_capture(capture)?;
        let stats = self.convert(&mut source, writer, cancel)?;
        log::debug!(
            "Capture packets: {} read, {} without a CAN frame",
            source.packets_read(),
            source.packets_skipped()
        );
        Ok(stats)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters gathered by [`Decoder::convert`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionStats {
    /// Frames pulled from the source
    pub frames_read: u64,
    /// Frames that produced signals
    pub frames_decoded: u64,
    /// Frames skipped because no definition exists for their ID
    pub unknown_frames: u64,
    /// Frames skipped because they disagree with their definition
    pub shape_mismatches: u64,
    /// Message records appended
    pub signals_written: u64,
    /// Physical values outside the declared [min, max]
    pub out_of_range: u64,
    /// Channels registered in the writer
    pub channels_created: usize,
    pub first_timestamp_ns: Option<u64>,
    pub last_timestamp_ns: Option<u64>,
    /// The run stopped on the cancellation flag
    pub cancelled: bool,
}

impl ConversionStats {
    fn record_frame(&mut self, frame: &CanFrame) {
        self.frames_read += 1;
        if self.first_timestamp_ns.is_none() {
            self.first_timestamp_ns = Some(frame.timestamp_ns);
        }
        self.last_timestamp_ns = Some(frame.timestamp_ns);
    }

    fn record_skip(&mut self, err: &DecoderError) {
        match err {
            DecoderError::UnknownMessage(_) => self.unknown_frames += 1,
            _ => self.shape_mismatches += 1,
        }
    }

    /// Frames that were read but not decoded
    pub fn frames_skipped(&self) -> u64 {
        self.unknown_frames + self.shape_mismatches
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.first_timestamp_ns.map(crate::types::timestamp_from_ns)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp_ns.map(crate::types::timestamp_from_ns)
    }

    /// Capture span between the first and last frame, in seconds
    pub fn duration_secs(&self) -> f64 {
        match (self.first_timestamp_ns, self.last_timestamp_ns) {
            (Some(first), Some(last)) => last.saturating_sub(first) as f64 / 1e9,
            _ => 0.0,
        }
    }
}
