//! Container writer
//!
//! Owns the channel registry and the sink. `append` may be called from several
//! threads; channel creation goes through the registry and every sink call
//! happens under the writer's own lock. Lock order is always registry first,
//! then sink.

use super::record::{self, MESSAGE_ENCODING, SCHEMA_ENCODING};
use super::registry::{ChannelHandle, ChannelRegistry};
use super::ContainerSink;
use crate::config::WriterConfig;
use crate::types::{DecodedSignal, DecoderError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

struct WriterState<S> {
    /// `None` once closed
    sink: Option<S>,
    sequences: HashMap<u16, u32>,
    records_written: u64,
}

/// Writes decoded signals to a container, one channel per signal stream
pub struct ContainerWriter<S: ContainerSink> {
    registry: ChannelRegistry,
    schema_id: u16,
    state: Mutex<WriterState<S>>,
}

impl<S: ContainerSink> ContainerWriter<S> {
    /// Write the shared schema to `sink` and wrap it in an open writer
    pub fn new(mut sink: S, config: &WriterConfig) -> Result<Self> {
        let schema = record::schema_bytes(&config.schema_name)?;
        let schema_id = sink.write_schema(&config.schema_name, SCHEMA_ENCODING, &schema)?;

        Ok(Self {
            registry: ChannelRegistry::new(config.normalized_prefix()),
            schema_id,
            state: Mutex::new(WriterState {
                sink: Some(sink),
                sequences: HashMap::new(),
                records_written: 0,
            }),
        })
    }

    /// Append one decoded signal, creating its channel on first use.
    ///
    /// The record's log time and publish time are the signal's capture
    /// timestamp.
    pub fn append(&self, signal: &DecodedSignal) -> Result<()> {
        let handle = self.registry.resolve(
            signal.can_id,
            &signal.name,
            &signal.message_name,
            &signal.signal.unit,
            signal.is_extended,
            |id, info| {
                let mut state = self.lock_state()?;
                let sink = state.sink.as_mut().ok_or(DecoderError::WriterClosed)?;
                sink.write_channel(id, self.schema_id, MESSAGE_ENCODING, info)
            },
        )?;

        let data = record::encode(signal)?;

        let mut guard = self.lock_state()?;
        let state = &mut *guard;
        let sink = state.sink.as_mut().ok_or(DecoderError::WriterClosed)?;
        let sequence = state.sequences.entry(handle.id()).or_insert(0);

        sink.write_message(handle.id(), *sequence, signal.timestamp_ns, &data)?;
        *sequence = sequence.wrapping_add(1);
        state.records_written += 1;
        Ok(())
    }

    /// Flush and finalize the container.
    ///
    /// Closing an already closed writer is a no-op.
    pub fn close(&self) -> Result<()> {
        // Registry before state, as in append
        let channel_count = self.registry.len();
        let mut state = self.lock_state()?;
        match state.sink.take() {
            Some(mut sink) => {
                sink.finish()?;
                log::info!(
                    "Closed container: {} channels, {} records",
                    channel_count,
                    state.records_written
                );
                Ok(())
            }
            None => {
                log::debug!("Container already closed");
                Ok(())
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().map(|s| s.sink.is_none()).unwrap_or(true)
    }

    /// Number of channels created so far
    pub fn channel_count(&self) -> usize {
        self.registry.len()
    }

    /// Channels created so far, ordered by ID
    pub fn channels(&self) -> Vec<ChannelHandle> {
        self.registry.handles()
    }

    /// Number of message records written
    pub fn records_written(&self) -> u64 {
        self.lock_state().map(|s| s.records_written).unwrap_or(0)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, WriterState<S>>> {
        self.state.lock().map_err(|_| {
            DecoderError::ChannelWriteFailure("container writer lock poisoned".to_string())
        })
    }
}
