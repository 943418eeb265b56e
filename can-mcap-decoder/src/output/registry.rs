//! Channel registry
//!
//! Maps each (CAN ID, signal name) pair to exactly one output channel. The
//! first resolution of a key allocates the next channel ID and emits the
//! channel's metadata; later resolutions return the stored handle. Lookup,
//! allocation and emission form one critical section.

use crate::types::{DecoderError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Format a CAN ID the way channel keys and metadata carry it: `0x` + uppercase hex
pub fn format_can_id(can_id: u32) -> String {
    format!("0x{:X}", can_id)
}

/// Registration key: one channel per distinct (CAN ID, signal) stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub can_id: String,
    pub signal: String,
}

impl ChannelKey {
    pub fn new(can_id: u32, signal: &str) -> Self {
        Self {
            can_id: format_can_id(can_id),
            signal: signal.to_string(),
        }
    }
}

/// Metadata written once per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// `/<prefix>/<message>/<signal>`
    pub topic: String,
    pub can_id: u32,
    pub message_name: String,
    pub signal_name: String,
    /// Empty when the signal has no unit
    pub unit: String,
    pub is_extended: bool,
}

impl ChannelInfo {
    /// Channel metadata map; `unit` is omitted when empty
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        metadata.insert("can_id".to_string(), format_can_id(self.can_id));
        metadata.insert("message".to_string(), self.message_name.clone());
        metadata.insert("signal".to_string(), self.signal_name.clone());
        metadata.insert("is_extended".to_string(), self.is_extended.to_string());
        if !self.unit.is_empty() {
            metadata.insert("unit".to_string(), self.unit.clone());
        }
        metadata
    }
}

/// Handle to a registered channel. IDs start at 1 and are never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHandle {
    id: u16,
    info: Arc<ChannelInfo>,
}

impl ChannelHandle {
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn info(&self) -> &ChannelInfo {
        &self.info
    }
}

struct RegistryState {
    channels: HashMap<ChannelKey, ChannelHandle>,
    next_id: u16,
}

/// Registry of output channels, owned by one container writer
pub struct ChannelRegistry {
    prefix: String,
    state: Mutex<RegistryState>,
}

impl ChannelRegistry {
    /// Create a registry whose topics start with `/<prefix>/`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            state: Mutex::new(RegistryState {
                channels: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Resolve the channel for (CAN ID, signal), creating it on first use.
    ///
    /// On creation `emit` receives the new ID and metadata while the registry
    /// lock is held, so concurrent callers for the same new key see exactly one
    /// emission. If `emit` fails nothing is registered and the ID is not
    /// consumed.
    pub fn resolve<F>(
        &self,
        can_id: u32,
        signal_name: &str,
        message_name: &str,
        unit: &str,
        is_extended: bool,
        emit: F,
    ) -> Result<ChannelHandle>
    where
        F: FnOnce(u16, &ChannelInfo) -> Result<()>,
    {
        let key = ChannelKey::new(can_id, signal_name);
        let mut state = self.lock()?;

        if let Some(handle) = state.channels.get(&key) {
            return Ok(handle.clone());
        }

        let id = state.next_id;
        let next_id = id.checked_add(1).ok_or_else(|| {
            DecoderError::ChannelWriteFailure("channel ID space exhausted".to_string())
        })?;

        let info = ChannelInfo {
            topic: format!("/{}/{}/{}", self.prefix, message_name, signal_name),
            can_id,
            message_name: message_name.to_string(),
            signal_name: signal_name.to_string(),
            unit: unit.to_string(),
            is_extended,
        };
        emit(id, &info)?;

        let handle = ChannelHandle {
            id,
            info: Arc::new(info),
        };
        let previous = state.channels.insert(key, handle.clone());
        debug_assert!(previous.is_none(), "two channel handles allocated for one key");
        state.next_id = next_id;

        log::debug!("Created channel {} -> {}", handle.id, handle.info.topic);
        Ok(handle)
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.lock().map(|state| state.channels.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered channels, ordered by ID
    pub fn handles(&self) -> Vec<ChannelHandle> {
        let mut handles: Vec<ChannelHandle> = match self.lock() {
            Ok(state) => state.channels.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        handles.sort_unstable_by_key(|h| h.id);
        handles
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| {
            DecoderError::ChannelWriteFailure("channel registry lock poisoned".to_string())
        })
    }
}
